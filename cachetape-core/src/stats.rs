//! Observable counters for tests and tuning (`spec.md` §6).

/// Accumulated counters exposed by [`crate::Cursor::statistics`].
///
/// Every field is monotonically non-decreasing for the life of one
/// [`crate::ElementCache`] (`compaction_runs`/`removed_blocks` included —
/// compaction only ever removes blocks, it does not "undo" a prior run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stats {
    /// Heap blocks allocated by the backing `BlockChain` over its lifetime.
    pub heap_allocations: usize,
    /// Number of completed drop-leading runs (step 4 of the heuristic in
    /// `spec.md` §4.3 actually executing a `remove_front_n`).
    pub leading_drop_runs: usize,
    /// Total leading elements dropped across every drop-leading run.
    pub dropped_elements: usize,
    /// Number of `compact()` invocations that actually removed a block.
    /// Stays `0` under the default [`crate::CompactionPolicy::Never`].
    pub compaction_runs: usize,
    /// Total heap blocks removed across every compaction run.
    pub removed_blocks: usize,
}

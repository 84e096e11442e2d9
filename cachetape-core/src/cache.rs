//! Pull-on-demand materializer and the `Cursor`s sharing it.
//!
//! The element cache backing every [`Cursor`] pulls from an underlying
//! `Iterator` into a [`BlockChain`] only as far as the furthest-behind
//! live cursor demands, then lets every cursor before that point read
//! already-materialized elements without touching the producer again.
//! `front` is semantically read-only to callers but must be able to pull
//! from the producer, so the cache lives behind `Rc<RefCell<_>>` — the
//! "owned-cell wrapper" `spec.md` §9 calls for, rather than a bare shared
//! reference.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::chain::BlockChain;
use crate::error::CursorOverrunSnafu;
use crate::stats::Stats;

/// When a [`Cursor::pop_front`]'s drop-leading heuristic should also
/// reclaim empty heap blocks via [`BlockChain::compact`].
///
/// `spec.md` §4.3 step 5 and §9 are explicit that speculative compaction
/// is usually a net loss, so [`CompactionPolicy::Never`] (the default)
/// never calls `compact`. [`CompactionPolicy::WhenSparse`] offers the one
/// policy the spec names as plausible: compact once occupancy falls below
/// a quarter, and only once at least `min_total_blocks` heap blocks exist
/// (so a handful of blocks churning near-empty doesn't thrash).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionPolicy {
    /// Never compact automatically. `compact()` is still callable by hand.
    Never,
    /// Compact when occupied heap blocks fall under `total / 4`, once at
    /// least `min_total_blocks` heap blocks exist.
    WhenSparse {
        /// Minimum heap block count before sparsity is even considered.
        min_total_blocks: usize,
    },
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        CompactionPolicy::Never
    }
}

struct CacheInner<T, P> {
    producer: P,
    exhausted: bool,
    chain: BlockChain<T>,
    /// `O[0..n]` from `spec.md` §3: one read offset per live cursor, or
    /// `None` for a vacant (reusable) slot.
    slots: Vec<Option<usize>>,
    live: usize,
    attempts: usize,
    min_drop: usize,
    compaction_policy: CompactionPolicy,
    stats: Stats,
}

impl<T, P> CacheInner<T, P>
where
    P: Iterator<Item = T>,
{
    fn new(producer: P, chain: BlockChain<T>) -> Self {
        let min_drop = chain.heap_block_hint();
        CacheInner {
            producer,
            exhausted: false,
            chain,
            slots: Vec::new(),
            live: 0,
            attempts: 0,
            min_drop,
            compaction_policy: CompactionPolicy::default(),
            stats: Stats::default(),
        }
    }

    /// `makeSlice(offset)` from `spec.md` §4.3: reuse a vacant slot if one
    /// exists, otherwise append a new one.
    fn allocate_slot(&mut self, offset: usize) -> usize {
        let slot = match self.slots.iter().position(Option::is_none) {
            Some(ix) => {
                self.slots[ix] = Some(offset);
                ix
            }
            None => {
                self.slots.push(Some(offset));
                self.slots.len() - 1
            }
        };
        self.live += 1;
        slot
    }

    fn slot_offset(&self, slot: usize) -> usize {
        self.slots[slot].expect("cachetape: cursor slot already vacant")
    }

    fn set_slot_offset(&mut self, slot: usize, offset: usize) {
        self.slots[slot] = Some(offset);
    }

    /// Pulls from the producer into the chain until `needed` elements are
    /// available past `offset`, or the producer is exhausted. Returns
    /// whether any element was actually pulled.
    fn expand_as_needed(&mut self, offset: usize, needed: usize) -> bool {
        let mut expanded = false;
        while self.chain.len().saturating_sub(offset) < needed {
            match self.producer.next() {
                Some(value) => {
                    self.chain.push(value);
                    expanded = true;
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        expanded
    }

    /// The heuristic from `spec.md` §4.3: called on every `pop_front` once
    /// the popping cursor's new offset reaches `min_drop`.
    fn maybe_drop_leading(&mut self, offset: usize) {
        if offset < self.min_drop {
            return;
        }
        self.attempts += 1;
        if self.attempts < self.live {
            return;
        }
        self.attempts = 0;

        let m = match self.slots.iter().flatten().copied().min() {
            Some(m) if m > 0 => m,
            _ => return,
        };

        self.chain.remove_front_n(m);
        for slot in self.slots.iter_mut().flatten() {
            *slot -= m;
        }
        self.stats.leading_drop_runs += 1;
        self.stats.dropped_elements += m;

        tracing::debug!(dropped = m, "cachetape: drop-leading run");

        self.maybe_compact();
    }

    fn maybe_compact(&mut self) {
        if let CompactionPolicy::WhenSparse { min_total_blocks } = self.compaction_policy {
            let (total, occupied) = self.chain.heap_block_occupancy();
            if total >= min_total_blocks && occupied * 4 < total {
                let removed = self.chain.compact();
                if removed > 0 {
                    self.stats.compaction_runs += 1;
                    self.stats.removed_blocks += removed;
                }
            }
        }
        self.stats.heap_allocations = self.chain.heap_allocations();
    }
}

/// A move-only, reference-counted view onto a cached producer sequence,
/// with its own read offset (`spec.md` §3 "Cursor").
///
/// Duplication is only via [`Cursor::save`] — `Cursor` deliberately does
/// not implement `Clone`: an implicit copy would silently corrupt the
/// slot table, since two cursors would believe they each owned the same
/// slot (`spec.md` §9 "Non-copyable cursors").
pub struct Cursor<T, P> {
    cache: Rc<RefCell<CacheInner<T, P>>>,
    slot: usize,
}

impl<T, P> Cursor<T, P>
where
    P: Iterator<Item = T>,
{
    /// Builds a cache backed entirely by heap blocks of `heap_block_hint`
    /// elements, and returns its first cursor. A `0` hint is coerced up to
    /// `1` (`spec.md` §8 "Zero-hint heap-block capacity coerces to a
    /// positive default").
    pub fn new(producer: P, heap_block_hint: usize) -> Self {
        let chain = BlockChain::with_heap_hint(heap_block_hint.max(1));
        Self::from_inner(CacheInner::new(producer, chain))
    }

    /// Builds a cache seeded with one or more caller-owned buffers,
    /// installed as the chain's initial blocks, and returns its first
    /// cursor. Heap blocks are only allocated once elements outlive the
    /// buffers' joint capacity.
    pub fn with_buffers(producer: P, buffers: Vec<&'static mut [u8]>) -> Self {
        let chain = BlockChain::with_buffers(buffers);
        Self::from_inner(CacheInner::new(producer, chain))
    }

    fn from_inner(mut inner: CacheInner<T, P>) -> Self {
        let slot = inner.allocate_slot(0);
        Cursor { cache: Rc::new(RefCell::new(inner)), slot }
    }

    /// Overrides the automatic-compaction policy. `Never` (the default) is
    /// appropriate for almost every workload; see [`CompactionPolicy`].
    pub fn with_compaction_policy(self, policy: CompactionPolicy) -> Self {
        self.cache.borrow_mut().compaction_policy = policy;
        self
    }

    /// Whether there is no element at this cursor's current offset. May
    /// pull exactly one element from the producer to find out (`spec.md`
    /// §9's documented `empty()`-pulls-one-element asymmetry: it is the
    /// only way to answer "is there a next element for *this* cursor").
    pub fn empty(&self) -> bool {
        let mut inner = self.cache.borrow_mut();
        let offset = inner.slot_offset(self.slot);
        if offset < inner.chain.len() {
            return false;
        }
        if inner.exhausted {
            return true;
        }
        !inner.expand_as_needed(offset, 1)
    }

    /// The element at this cursor's current offset. Panics (a precondition
    /// violation) if the producer is exhausted before one becomes
    /// available — `pop_front` never fails, but reading past exhaustion
    /// does.
    pub fn front(&self) -> Ref<'_, T> {
        self.index(0)
    }

    /// The element `i` positions ahead of this cursor's current offset.
    /// Panics under the same conditions as [`Cursor::front`].
    pub fn index(&self, i: usize) -> Ref<'_, T> {
        {
            let mut inner = self.cache.borrow_mut();
            let offset = inner.slot_offset(self.slot);
            inner.expand_as_needed(offset, i + 1);
        }
        let inner = self.cache.borrow();
        let offset = inner.slot_offset(self.slot);
        if offset + i >= inner.chain.len() {
            CursorOverrunSnafu { offset: offset + i }.build().raise();
        }
        Ref::map(inner, |c| c.chain.get(offset + i))
    }

    /// Advances this cursor by one element, then (once the new offset
    /// reaches the drop-leading threshold) may shrink the front of the
    /// shared chain. Never panics: there is no upper bound on how far a
    /// cursor may advance past the materialized elements — a subsequent
    /// `front`/`index` is what fails if that turns out to be past the end
    /// of an exhausted producer.
    pub fn pop_front(&self) {
        let mut inner = self.cache.borrow_mut();
        let offset = inner.slot_offset(self.slot) + 1;
        inner.set_slot_offset(self.slot, offset);
        inner.maybe_drop_leading(offset);
    }

    /// Creates a new cursor sharing this cache, starting at this cursor's
    /// current offset. The only sanctioned way to duplicate a `Cursor`.
    pub fn save(&self) -> Self {
        let mut inner = self.cache.borrow_mut();
        let offset = inner.slot_offset(self.slot);
        let slot = inner.allocate_slot(offset);
        drop(inner);
        Cursor { cache: Rc::clone(&self.cache), slot }
    }

    /// A snapshot of the cache's accumulated counters (`spec.md` §6).
    pub fn statistics(&self) -> Stats {
        self.cache.borrow().stats
    }

    /// Internal iteration over every remaining element, stopping early if
    /// `f` returns `false`. Exists because a move-only `Cursor` cannot be
    /// adapted into a `for`-loop's `IntoIterator` without being consumed
    /// (`spec.md` §4.3 "Stream of foreach-style iteration").
    pub fn for_each_until(&self, mut f: impl FnMut(&T) -> bool) {
        while !self.empty() {
            let keep_going = f(&self.front());
            if !keep_going {
                break;
            }
            self.pop_front();
        }
    }

    /// As [`Cursor::for_each_until`], but also passes the number of
    /// elements already visited in this call.
    pub fn for_each_indexed_until(&self, mut f: impl FnMut(usize, &T) -> bool) {
        let mut seen = 0usize;
        while !self.empty() {
            let keep_going = f(seen, &self.front());
            if !keep_going {
                break;
            }
            self.pop_front();
            seen += 1;
        }
    }
}

impl<T, P> Cursor<T, P>
where
    P: ExactSizeIterator<Item = T>,
{
    /// The number of elements remaining ahead of this cursor: whatever the
    /// producer still has left, plus whatever is already materialized
    /// beyond this cursor's offset. Only available when the producer
    /// reports its own length.
    pub fn length(&self) -> usize {
        let inner = self.cache.borrow();
        let offset = inner.slot_offset(self.slot);
        inner.producer.len() + inner.chain.len() - offset
    }
}

impl<T, P> Drop for Cursor<T, P> {
    fn drop(&mut self) {
        let mut inner = self.cache.borrow_mut();
        inner.slots[self.slot] = None;
        inner.live -= 1;
        // When `inner.live` reaches 0 this is also the last strong
        // reference to `self.cache` (every live cursor holds exactly one),
        // so the `Rc` drops the `CacheInner` — and with it the
        // `BlockChain` — right after this method returns.
    }
}

// `Cursor` holds an `Rc<RefCell<_>>` and is deliberately not `Send`/`Sync`;
// see `spec.md` §1's concurrency non-goal, documented in DESIGN.md.

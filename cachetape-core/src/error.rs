//! Precondition violations.
//!
//! Every failure this crate can report is a broken precondition in the
//! calling code (an out-of-range index, an over-large `remove_front_n`, a
//! cursor read past an exhausted producer) rather than a recoverable
//! runtime condition. `spec.md` calls for "idiomatic error reporting" in
//! place of the source's allocation-free error object; the idiomatic Rust
//! answer for a broken data-structure precondition is a panic carrying a
//! descriptive message, the way `Vec`/`VecDeque` panic on an out-of-bounds
//! index. [`Violation`] exists to keep those messages structured and
//! consistent; it is never returned to a caller to `match` on.

use snafu::Snafu;

/// A broken precondition inside [`crate::Block`] or [`crate::BlockChain`].
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Violation {
    /// `Block::get`/`get_mut` with an index at or past the live range.
    #[snafu(display("index {index} out of bounds for block of length {len}"))]
    IndexOutOfBounds {
        /// The index that was requested.
        index: usize,
        /// The number of live elements in the block at the time.
        len: usize,
    },

    /// `Block::push` with no free capacity left.
    #[snafu(display("block is full (capacity {capacity})"))]
    BlockFull {
        /// The block's fixed capacity.
        capacity: usize,
    },

    /// `BlockChain::remove_front_n` asked to drop more elements than exist.
    #[snafu(display("remove_front_n({requested}) exceeds chain length {len}"))]
    RemoveExceedsLength {
        /// The number of elements the caller asked to remove.
        requested: usize,
        /// The chain's length at the time of the call.
        len: usize,
    },

    /// A cursor was read (`front`/`index`) past the point its producer is
    /// exhausted. This is the asymmetric case `spec.md` §9 documents:
    /// `pop_front` never fails, but the next `front`/`index` on an
    /// over-advanced cursor does.
    #[snafu(display(
        "cursor read past the end of an exhausted producer (offset {offset})"
    ))]
    CursorOverrun {
        /// The cursor's logical offset at the time of the read.
        offset: usize,
    },
}

impl Violation {
    /// Panics with this violation's message.
    ///
    /// Kept as a named method (rather than calling `panic!` inline at every
    /// call site) so every precondition failure in the crate goes through
    /// one formatting path.
    #[track_caller]
    #[cold]
    pub(crate) fn raise(self) -> ! {
        panic!("cachetape: {self}");
    }
}

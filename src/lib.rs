//! A lazy, shared, caching adaptor over a single-pass producer.
//!
//! Wrap any `Iterator` with [`cached`] (or [`cached_with_buffers`], to seed
//! the cache with caller-owned memory instead of the heap) and get back a
//! [`Cursor`]: a cheap, `save`-able handle that materializes each element
//! of the wrapped iterator **at most once**, no matter how many cursors
//! revisit it or in what order. This is the hazard a plain `Iterator`
//! cannot handle on its own — once consumed, it's gone — and the one a
//! naive `.collect::<Vec<_>>()` overpays for when only a few cursors ever
//! run ahead of the rest.
//!
//! ```
//! use cachetape::cached;
//!
//! let first = cached((0..5).map(|i| i * i), 16);
//! let second = first.save();
//!
//! assert_eq!(*first.front(), 0);
//! first.pop_front();
//! assert_eq!(*first.front(), 1);
//!
//! // `second` still observes the full sequence from its own offset.
//! assert_eq!(*second.front(), 0);
//! ```

pub use cachetape_core::{Block, BlockChain, CompactionPolicy, Cursor, Stats, Violation};

/// Wraps `producer` in a cache backed entirely by heap blocks of
/// `heap_block_capacity` elements, returning its first cursor. A `0`
/// capacity is coerced up to a working default.
pub fn cached<T, P>(producer: P, heap_block_capacity: usize) -> Cursor<T, P>
where
    P: Iterator<Item = T>,
{
    Cursor::new(producer, heap_block_capacity)
}

/// Wraps `producer` in a cache seeded with one or more caller-owned byte
/// buffers, returning its first cursor. The buffers become the chain's
/// initial blocks and are never freed; heap blocks are only allocated once
/// cached elements outlive the buffers' joint capacity, sized to match the
/// largest buffer supplied.
pub fn cached_with_buffers<T, P>(producer: P, buffers: Vec<&'static mut [u8]>) -> Cursor<T, P>
where
    P: Iterator<Item = T>,
{
    Cursor::with_buffers(producer, buffers)
}

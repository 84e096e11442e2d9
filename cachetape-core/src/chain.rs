//! An expanding, block-of-blocks circular store.
//!
//! A [`BlockChain`] is an ordered list of [`Block`]s that behaves like one
//! logical buffer: appends always land in the current tail block (rolling
//! over to the next, or allocating a fresh heap block, when it fills), and
//! dropping elements from the front recycles whichever blocks that drains
//! by rotating them to the back instead of freeing and reallocating them.
//! The growth-by-appending-a-new-node-when-the-current-one-is-full shape
//! mirrors `ChainAllocator` in the pack (`alloc/src/chain.rs`); the
//! circular reuse-via-rotation on drain is this crate's own addition,
//! required by `spec.md` §4.2.

use crate::block::Block;
use crate::error::RemoveExceedsLengthSnafu;

/// An ordered sequence of [`Block`]s, some possibly caller-owned, acting as
/// one logical append/drop-front buffer.
///
/// Identity of the caller-owned blocks ("user-block base pointers" in
/// `spec.md` §4.2) is tracked per-`Block` (`Block::is_external`/`base_ptr`)
/// rather than duplicated in a side set here — `is_external` already
/// answers every question the chain needs to ask ("may I free this?",
/// "may `compact` remove this?").
pub struct BlockChain<T> {
    blocks: Vec<Block<T>>,
    tail_block_ix: usize,
    length: usize,
    capacity: usize,
    heap_block_hint: usize,
    heap_allocations: usize,
}

impl<T> BlockChain<T> {
    /// An empty chain that allocates heap blocks of `heap_block_hint`
    /// elements on first use.
    pub fn with_heap_hint(heap_block_hint: usize) -> Self {
        BlockChain {
            blocks: Vec::new(),
            tail_block_ix: 0,
            length: 0,
            capacity: 0,
            heap_block_hint: heap_block_hint.max(1),
            heap_allocations: 0,
        }
    }

    /// A chain seeded with one or more caller-owned buffers, installed as
    /// the initial blocks. The heap-block hint becomes the realized
    /// capacity of the largest buffer, so later heap growth matches the
    /// scale the caller picked.
    pub fn with_buffers(buffers: Vec<&'static mut [u8]>) -> Self {
        let mut blocks = Vec::with_capacity(buffers.len());
        let mut capacity = 0usize;
        let mut largest = 1usize;

        for buf in buffers {
            let block = Block::<T>::from_external_bytes(buf);
            capacity += block.capacity();
            largest = largest.max(block.capacity());
            blocks.push(block);
        }

        let tail_block_ix = blocks.iter().position(|b| b.free_capacity() > 0).unwrap_or(blocks.len());

        BlockChain {
            blocks,
            tail_block_ix,
            length: 0,
            capacity,
            heap_block_hint: largest.max(1),
            heap_allocations: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The heap-block capacity hint, used by `ElementCache` to seed its
    /// drop-leading threshold.
    pub fn heap_block_hint(&self) -> usize {
        self.heap_block_hint
    }

    pub fn heap_allocations(&self) -> usize {
        self.heap_allocations
    }

    fn allocate_heap_block(&mut self) {
        tracing::trace!(
            capacity = self.heap_block_hint,
            total_blocks = self.blocks.len() + 1,
            "cachetape: allocating heap block"
        );
        self.blocks.push(Block::new_heap(self.heap_block_hint));
        self.capacity += self.heap_block_hint;
        self.heap_allocations += 1;
    }

    /// Appends `value`, growing the chain (by advancing to the next block,
    /// or allocating a new heap block) if the current tail block is full.
    pub fn push(&mut self, value: T) {
        if self.blocks.is_empty() || self.tail_block_ix >= self.blocks.len() {
            self.allocate_heap_block();
            self.tail_block_ix = self.blocks.len() - 1;
        } else if self.blocks[self.tail_block_ix].free_capacity() == 0 {
            self.tail_block_ix += 1;
            if self.tail_block_ix >= self.blocks.len() {
                self.allocate_heap_block();
            }
        }
        self.blocks[self.tail_block_ix].push(value);
        self.length += 1;
    }

    /// Locates `(block_ix, local_ix)` for logical index `i` by walking
    /// blocks and subtracting lengths — blocks can differ in length (the
    /// head block may be partially drained), so dividing by a nominal
    /// block size would be wrong.
    fn locate(&self, i: usize) -> (usize, usize) {
        let mut remaining = i;
        for (ix, block) in self.blocks.iter().enumerate() {
            let len = block.len();
            if remaining < len {
                return (ix, remaining);
            }
            remaining -= len;
        }
        unreachable!("cachetape: index {i} out of range for chain of length {}", self.length)
    }

    pub fn get(&self, i: usize) -> &T {
        if i >= self.length {
            crate::error::IndexOutOfBoundsSnafu { index: i, len: self.length }.build().raise();
        }
        let (block_ix, local_ix) = self.locate(i);
        self.blocks[block_ix].get(local_ix)
    }

    pub fn get_mut(&mut self, i: usize) -> &mut T {
        if i >= self.length {
            crate::error::IndexOutOfBoundsSnafu { index: i, len: self.length }.build().raise();
        }
        let (block_ix, local_ix) = self.locate(i);
        self.blocks[block_ix].get_mut(local_ix)
    }

    /// Drops the first `n` elements, recycling any block that becomes
    /// fully empty by rotating it to the back (stably, preserving the
    /// relative order of the remaining live blocks) rather than freeing
    /// and reallocating it — the "circular" half of `BlockChain`.
    pub fn remove_front_n(&mut self, n: usize) {
        if n > self.length {
            RemoveExceedsLengthSnafu { requested: n, len: self.length }.build().raise();
        }
        if n == 0 {
            return;
        }

        let mut remaining = n;
        let mut drop_count = 0usize;
        for block in &self.blocks {
            let len = block.len();
            if remaining >= len {
                remaining -= len;
                drop_count += 1;
            } else {
                break;
            }
        }

        if remaining > 0 {
            self.blocks[drop_count].remove_front_n(remaining);
        }

        self.tail_block_ix = self.tail_block_ix.saturating_sub(drop_count);

        for block in self.blocks[..drop_count].iter_mut().rev() {
            let len = block.len();
            if len > 0 {
                block.remove_front_n(len);
            }
        }

        self.blocks.rotate_left(drop_count);
        self.length -= n;
    }

    /// `(total heap blocks, occupied heap blocks)` — caller-provided
    /// blocks are never counted, even when they happen to be empty.
    pub fn heap_block_occupancy(&self) -> (usize, usize) {
        let mut total = 0usize;
        let mut occupied = 0usize;
        for block in &self.blocks {
            if block.is_external() {
                continue;
            }
            total += 1;
            if !block.is_empty() {
                occupied += 1;
            }
        }
        (total, occupied)
    }

    /// Removes empty heap blocks from the chain, never touching
    /// caller-provided blocks even if they are empty. Because
    /// `remove_front_n` rotates every emptied block to the back, all empty
    /// blocks are already trailing the live ones, so an unordered
    /// `retain` cannot reorder any live block. Returns the number removed.
    /// Off by default; see `CompactionPolicy`.
    pub fn compact(&mut self) -> usize {
        let before = self.blocks.len();
        let mut kept = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.drain(..) {
            if !block.is_external() && block.is_empty() {
                drop(block);
            } else {
                kept.push(block);
            }
        }
        self.blocks = kept;
        // Re-point at the first block with room to receive the next
        // append; compaction may have removed the previous tail block
        // (if it happened to be an empty heap block).
        self.tail_block_ix = self
            .blocks
            .iter()
            .position(|b| b.free_capacity() > 0)
            .unwrap_or(self.blocks.len());
        let removed = before - self.blocks.len();
        if removed > 0 {
            self.capacity = self.blocks.iter().map(Block::capacity).sum();
            tracing::debug!(removed, "cachetape: compacted empty heap blocks");
        }
        removed
    }
}

impl<T> Drop for BlockChain<T> {
    fn drop(&mut self) {
        // Destroy blocks back-to-front so the overall destruction order of
        // cached elements is LIFO (each block itself destroys its own live
        // elements in reverse order — see `Block::drop`).
        while let Some(block) = self.blocks.pop() {
            drop(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaked_bytes(n: usize) -> &'static mut [u8] {
        Box::leak(vec![0u8; n].into_boxed_slice())
    }

    fn collect<T: Copy>(chain: &BlockChain<T>) -> Vec<T> {
        (0..chain.len()).map(|i| *chain.get(i)).collect()
    }

    #[test]
    fn push_past_one_block_allocates_the_next() {
        let mut chain = BlockChain::<u32>::with_heap_hint(2);
        for i in 0..5 {
            chain.push(i);
        }
        assert_eq!(chain.len(), 5);
        assert_eq!(chain.heap_allocations(), 3);
        assert_eq!(collect(&chain), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn index_and_iterate_agree_after_mixed_append_and_drop() {
        let mut chain = BlockChain::<u32>::with_heap_hint(3);
        for i in 0..10 {
            chain.push(i);
        }
        chain.remove_front_n(4);
        chain.push(10);
        chain.push(11);

        let expected: Vec<u32> = (4..12).collect();
        assert_eq!(chain.len(), expected.len());
        for (i, value) in expected.iter().enumerate() {
            assert_eq!(chain.get(i), value);
        }
        assert_eq!(collect(&chain), expected);
    }

    #[test]
    fn remove_front_n_recycles_blocks_without_new_allocations() {
        let mut chain = BlockChain::<u32>::with_heap_hint(4);
        for i in 0..8 {
            chain.push(i);
        }
        assert_eq!(chain.heap_allocations(), 2);

        chain.remove_front_n(8);
        for i in 0..8 {
            chain.push(100 + i);
        }

        // Both blocks were fully emptied and rotated to the back, so
        // refilling reuses them instead of growing the chain.
        assert_eq!(chain.heap_allocations(), 2);
        assert_eq!(collect(&chain), (100..108).collect::<Vec<_>>());
    }

    #[test]
    fn sliding_window_over_external_buffers_never_allocates_heap() {
        let bufs = vec![leaked_bytes(64), leaked_bytes(64)];
        let mut chain = BlockChain::<u32>::with_buffers(bufs);
        let capacity = chain.capacity();

        for i in 0..(capacity / 2) {
            chain.push(i as u32);
        }
        for round in 0..117u32 {
            let window = chain.len();
            chain.remove_front_n(window);
            for i in 0..window {
                chain.push(round * 1000 + i as u32);
            }
        }

        assert_eq!(chain.heap_allocations(), 0);
        let (total, _) = chain.heap_block_occupancy();
        assert_eq!(total, 0);
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn remove_front_n_past_length_panics() {
        let mut chain = BlockChain::<u32>::with_heap_hint(4);
        chain.push(1);
        chain.remove_front_n(2);
    }

    #[test]
    fn compact_removes_only_empty_heap_blocks() {
        let mut chain = BlockChain::<u32>::with_heap_hint(2);
        for i in 0..6 {
            chain.push(i);
        }
        chain.remove_front_n(4);
        let (total_before, _) = chain.heap_block_occupancy();
        assert_eq!(total_before, 3);

        let removed = chain.compact();
        assert_eq!(removed, 2);
        let (total_after, occupied_after) = chain.heap_block_occupancy();
        assert_eq!(total_after, 1);
        assert_eq!(occupied_after, 1);
        assert_eq!(collect(&chain), vec![4, 5]);
    }

    #[test]
    fn compact_is_idempotent() {
        let mut chain = BlockChain::<u32>::with_heap_hint(2);
        for i in 0..4 {
            chain.push(i);
        }
        chain.remove_front_n(4);
        assert!(chain.compact() > 0);
        assert_eq!(chain.compact(), 0);
    }

    #[test]
    fn external_buffers_are_never_removed_by_compact_even_when_empty() {
        let bufs = vec![leaked_bytes(64)];
        let mut chain = BlockChain::<u32>::with_buffers(bufs);
        assert_eq!(chain.compact(), 0);
        let (total, _) = chain.heap_block_occupancy();
        assert_eq!(total, 0);
    }

    #[test]
    fn push_onto_all_external_buffers_already_full_allocates_heap() {
        // A single-byte buffer can't fit even one u32, so it's immediately
        // "full" (capacity 0) and push must fall through to a heap block
        // instead of indexing past the end of `blocks`.
        let bufs = vec![leaked_bytes(1)];
        let mut chain = BlockChain::<u32>::with_buffers(bufs);
        chain.push(42);
        assert_eq!(chain.len(), 1);
        assert_eq!(*chain.get(0), 42);
        assert_eq!(chain.heap_allocations(), 1);
    }
}

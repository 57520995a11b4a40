//! `CommandAllocator` (spec §4.1), redesigned per spec §9's note on the
//! original's placement-new byte arena: commands here are values of the
//! tagged [`Command`] enum rather than bytes written in place, so there is
//! nothing to align or placement-construct. What survives the port is the
//! *shape* of the arena — growable blocks handed out by a doubling policy,
//! recycled across encoder finishes instead of freed — since that's what
//! keeps a GPU app's steady-state command recording allocation-free.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rhi_hal::Backend;

use super::Command;

/// One arena block. A `VecDeque` rather than a `Vec` so the iterator can
/// `pop_front` in recording order without shifting the remainder.
pub(crate) type Block<B> = VecDeque<Command<B>>;

/// Spec §4.1: "initial block 2048 bytes". Blocks now hold typed commands
/// instead of bytes, so this is reinterpreted as a command count.
const INITIAL_BLOCK_CAPACITY: usize = 256;
/// Spec §4.1: "min(previous*2, 16384)", reinterpreted the same way.
const MAX_BLOCK_CAPACITY: usize = 2048;

/// A shared pool of emptied blocks, handed between allocators so a new
/// encoder doesn't pay for a fresh allocation every time (spec §4.1:
/// "blocks retained in a recycle pool across encoder finishes"). Owned by
/// whatever creates encoders — typically the `Device`.
pub type BlockPool<B> = Arc<Mutex<Vec<Block<B>>>>;

pub fn new_block_pool<B: Backend>() -> BlockPool<B> {
    Arc::new(Mutex::new(Vec::new()))
}

pub struct CommandAllocator<B: Backend> {
    blocks: Vec<Block<B>>,
    last_allocation_size: usize,
    pool: BlockPool<B>,
}

impl<B: Backend> CommandAllocator<B> {
    pub fn new(pool: BlockPool<B>) -> Self {
        let mut allocator = Self {
            blocks: Vec::new(),
            last_allocation_size: INITIAL_BLOCK_CAPACITY,
            pool,
        };
        allocator.push_block(INITIAL_BLOCK_CAPACITY);
        allocator
    }

    /// Spec §9: the source's block-pool recycling reads past the end of the
    /// pool (`mBlocks = std::move(*mBlocksPool.end())`); the intended
    /// behavior is to pop one stashed block off the pool when it isn't
    /// empty, falling back to a fresh allocation otherwise.
    fn take_block(&mut self, capacity: usize) -> Block<B> {
        let mut pool = self.pool.lock();
        pool.pop().unwrap_or_else(|| VecDeque::with_capacity(capacity))
    }

    fn push_block(&mut self, capacity: usize) {
        let block = self.take_block(capacity);
        self.last_allocation_size = capacity.max(block.capacity()).max(1);
        self.blocks.push(block);
    }

    fn current_is_full(&self) -> bool {
        match self.blocks.last() {
            Some(block) => block.len() >= block.capacity().max(1),
            None => true,
        }
    }

    /// Spec §4.1 `Allocate<Cmd>`: append one command, spilling into a new
    /// block sized `max(needed, min(previous*2, MAX_BLOCK_CAPACITY))` first
    /// if the current block is full.
    pub fn allocate(&mut self, command: Command<B>) {
        if self.current_is_full() {
            let capacity = self.last_allocation_size.saturating_mul(2).min(MAX_BLOCK_CAPACITY).max(1);
            self.push_block(capacity);
        }
        self.blocks
            .last_mut()
            .expect("push_block always leaves a current block")
            .push_back(command);
    }

    /// Spec §4.1 finalization: hand every recorded block to a
    /// `CommandIterator`, then re-arm this allocator for the next
    /// recording. Spec §9: the source's `Clear()` is missing a `return`
    /// that would otherwise skip re-seeding `mLastAllocationSize` — here
    /// that re-seed always happens, by construction.
    pub fn finish(&mut self) -> CommandIterator<B> {
        let blocks = std::mem::take(&mut self.blocks);
        self.last_allocation_size = INITIAL_BLOCK_CAPACITY;
        self.push_block(INITIAL_BLOCK_CAPACITY);
        CommandIterator::new(blocks, self.pool.clone())
    }
}

/// Spec §4.1 `CommandIterator`: forward-only, consuming the blocks handed
/// to it by `CommandAllocator::finish`. Its "destruction walks the stream"
/// clause becomes ordinary `Drop`: any commands never iterated are simply
/// dropped in place (their resource `Arc`s still release correctly), and
/// every block is cleared and returned to the pool either way.
pub struct CommandIterator<B: Backend> {
    blocks: VecDeque<Block<B>>,
    pool: BlockPool<B>,
}

impl<B: Backend> CommandIterator<B> {
    fn new(blocks: Vec<Block<B>>, pool: BlockPool<B>) -> Self {
        Self {
            blocks: blocks.into(),
            pool,
        }
    }
}

impl<B: Backend> Iterator for CommandIterator<B> {
    type Item = Command<B>;

    fn next(&mut self) -> Option<Command<B>> {
        loop {
            let front = self.blocks.front_mut()?;
            if let Some(command) = front.pop_front() {
                return Some(command);
            }
            let mut drained = self.blocks.pop_front().expect("front_mut just succeeded");
            drained.clear();
            self.pool.lock().push(drained);
        }
    }
}

impl<B: Backend> Drop for CommandIterator<B> {
    fn drop(&mut self) {
        while let Some(mut block) = self.blocks.pop_front() {
            block.clear();
            self.pool.lock().push(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhi_hal::null::NullBackend;

    fn dummy_command() -> Command<NullBackend> {
        Command::EndDebugLabel
    }

    #[test]
    fn record_then_iterate_preserves_order() {
        let mut allocator = CommandAllocator::<NullBackend>::new(new_block_pool());
        for _ in 0..3 {
            allocator.allocate(dummy_command());
        }
        let iterated: Vec<_> = allocator.finish().collect();
        assert_eq!(iterated.len(), 3);
    }

    #[test]
    fn empty_encoder_yields_nothing() {
        let mut allocator = CommandAllocator::<NullBackend>::new(new_block_pool());
        let iterated: Vec<_> = allocator.finish().collect();
        assert!(iterated.is_empty());
    }

    #[test]
    fn blocks_are_recycled_through_the_pool() {
        let pool = new_block_pool::<NullBackend>();
        let mut allocator = CommandAllocator::new(pool.clone());
        for _ in 0..(INITIAL_BLOCK_CAPACITY + 1) {
            allocator.allocate(dummy_command());
        }
        assert!(pool.lock().is_empty(), "blocks only return on drop/finish iteration");
        let iterator = allocator.finish();
        drop(iterator);
        assert!(
            !pool.lock().is_empty(),
            "finishing and dropping the iterator returns blocks to the pool"
        );
    }

    #[test]
    fn spilling_into_a_second_block_does_not_lose_or_reorder_commands() {
        let mut allocator = CommandAllocator::<NullBackend>::new(new_block_pool());
        let count = INITIAL_BLOCK_CAPACITY * 2 + 5;
        for _ in 0..count {
            allocator.allocate(dummy_command());
        }
        let iterated: Vec<_> = allocator.finish().collect();
        assert_eq!(iterated.len(), count);
    }
}

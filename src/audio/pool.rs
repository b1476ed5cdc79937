// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Fixed ring of audio blocks shared between the generation thread and the
//! device completion path.
//!
//! Every block moves Free -> Filling -> Submitted -> Free. Only the generation
//! thread moves a block out of Free, and only a completion (or a failed submit)
//! moves it back.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::warn;

use super::error::StartupError;

const DEFAULT_BLOCK_COUNT: usize = 8;
const DEFAULT_BLOCK_SAMPLES: usize = 512;

/// Number and size of the blocks in a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    /// Number of blocks in the ring.
    pub block_count: usize,
    /// Samples per block.
    pub block_samples: usize,
}

impl BlockLayout {
    pub fn new(block_count: usize, block_samples: usize) -> BlockLayout {
        BlockLayout {
            block_count,
            block_samples,
        }
    }

    /// How long one block plays for at the given sample rate.
    pub fn block_duration(&self, sample_rate: u32) -> Duration {
        Duration::from_secs_f64(self.block_samples as f64 / sample_rate as f64)
    }
}

impl Default for BlockLayout {
    fn default() -> Self {
        BlockLayout::new(DEFAULT_BLOCK_COUNT, DEFAULT_BLOCK_SAMPLES)
    }
}

/// Lifecycle state of a single block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Free,
    Filling,
    Submitted,
}

/// Identifies one submission of one block. Releasing the same ticket twice is
/// ignored, as is a ticket from an earlier trip around the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedBlock {
    index: usize,
    generation: u64,
}

impl SubmittedBlock {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Block {
    samples: Box<[i32]>,
    state: BlockState,
    /// Bumped every time the block is acquired.
    generation: u64,
}

struct Ring {
    free: usize,
    cursor: usize,
}

/// A block held exclusively by the generation thread while it is written.
pub struct FillingBlock<'a> {
    index: usize,
    block: MutexGuard<'a, Block>,
}

impl FillingBlock<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn samples_mut(&mut self) -> &mut [i32] {
        &mut self.block.samples
    }
}

/// The block ring. Allocated once when the engine starts; nothing is allocated
/// during playback.
pub struct BlockPool {
    blocks: Vec<Mutex<Block>>,
    block_samples: usize,
    ring: Mutex<Ring>,
    block_freed: Condvar,
}

impl BlockPool {
    /// Allocates every block up front, zero filled and free.
    pub fn allocate(layout: BlockLayout) -> Result<BlockPool, StartupError> {
        if layout.block_count == 0 || layout.block_samples == 0 {
            return Err(StartupError::Allocation(format!(
                "invalid block layout {}x{}",
                layout.block_count, layout.block_samples
            )));
        }

        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(layout.block_count)
            .map_err(|e| StartupError::Allocation(e.to_string()))?;
        for _ in 0..layout.block_count {
            let mut samples = Vec::new();
            samples
                .try_reserve_exact(layout.block_samples)
                .map_err(|e| StartupError::Allocation(e.to_string()))?;
            samples.resize(layout.block_samples, 0i32);
            blocks.push(Mutex::new(Block {
                samples: samples.into_boxed_slice(),
                state: BlockState::Free,
                generation: 0,
            }));
        }

        Ok(BlockPool {
            blocks,
            block_samples: layout.block_samples,
            ring: Mutex::new(Ring {
                free: layout.block_count,
                cursor: 0,
            }),
            block_freed: Condvar::new(),
        })
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn layout(&self) -> BlockLayout {
        BlockLayout::new(self.blocks.len(), self.block_samples)
    }

    pub fn block_samples(&self) -> usize {
        self.block_samples
    }

    /// Blocks currently free for writing.
    pub fn free_blocks(&self) -> usize {
        self.ring.lock().free
    }

    /// Index of the next block to fill.
    pub fn cursor(&self) -> usize {
        self.ring.lock().cursor
    }

    pub fn block_state(&self, index: usize) -> Option<BlockState> {
        self.blocks.get(index).map(|block| block.lock().state)
    }

    /// Waits until a block is free or `running` is cleared. Returns true if a
    /// block can be acquired.
    pub fn wait_for_free(&self, running: &AtomicBool) -> bool {
        let mut ring = self.ring.lock();
        self.block_freed.wait_while(&mut ring, |ring| {
            ring.free == 0 && running.load(Ordering::Acquire)
        });
        ring.free > 0
    }

    /// Wakes anything blocked in `wait_for_free` so it can re-check its flag.
    pub fn notify_all(&self) {
        let _ring = self.ring.lock();
        self.block_freed.notify_all();
    }

    /// Takes the block under the cursor for writing.
    ///
    /// # Panics
    ///
    /// Panics if no block is free or the cursor block is still in use.
    pub fn acquire_next(&self) -> FillingBlock<'_> {
        let index = {
            let mut ring = self.ring.lock();
            assert!(ring.free > 0, "acquired a block while none were free");
            ring.free -= 1;
            ring.cursor
        };

        let mut block = self.blocks[index].lock();
        assert_eq!(
            block.state,
            BlockState::Free,
            "block {} acquired out of ring order",
            index
        );
        block.state = BlockState::Filling;
        block.generation += 1;

        FillingBlock { index, block }
    }

    /// Ends writing of a block and advances the cursor. The block stays
    /// read-only until it is released and acquired again.
    pub fn mark_submitted(&self, filling: FillingBlock<'_>) -> SubmittedBlock {
        let FillingBlock { index, mut block } = filling;
        block.state = BlockState::Submitted;
        let ticket = SubmittedBlock {
            index,
            generation: block.generation,
        };
        drop(block);

        let mut ring = self.ring.lock();
        ring.cursor = (ring.cursor + 1) % self.blocks.len();
        ticket
    }

    /// Reads a submitted block. Returns None for a stale or unknown ticket.
    pub fn read_submitted<R>(
        &self,
        ticket: SubmittedBlock,
        read: impl FnOnce(&[i32]) -> R,
    ) -> Option<R> {
        let block = self.blocks.get(ticket.index)?.lock();
        if block.state != BlockState::Submitted || block.generation != ticket.generation {
            return None;
        }
        Some(read(&block.samples))
    }

    /// Returns a played block to the pool and wakes the generation thread.
    /// Only updates bookkeeping, so it is safe to call from a device callback.
    pub fn release(&self, ticket: SubmittedBlock) -> bool {
        {
            let Some(block) = self.blocks.get(ticket.index) else {
                warn!(block = ticket.index, "Ignoring completion for unknown block");
                return false;
            };
            let mut block = block.lock();
            if block.state != BlockState::Submitted || block.generation != ticket.generation {
                warn!(
                    block = ticket.index,
                    generation = ticket.generation,
                    "Ignoring duplicate block completion"
                );
                return false;
            }
            block.state = BlockState::Free;
        }

        let mut ring = self.ring.lock();
        ring.free += 1;
        assert!(
            ring.free <= self.blocks.len(),
            "free block count exceeded pool size"
        );
        self.block_freed.notify_one();
        true
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    fn submit_next(pool: &BlockPool, value: i32) -> SubmittedBlock {
        let mut filling = pool.acquire_next();
        filling.samples_mut().fill(value);
        pool.mark_submitted(filling)
    }

    #[test]
    fn test_allocate() {
        let pool = BlockPool::allocate(BlockLayout::new(4, 16)).unwrap();
        assert_eq!(pool.block_count(), 4);
        assert_eq!(pool.block_samples(), 16);
        assert_eq!(pool.free_blocks(), 4);
        assert_eq!(pool.cursor(), 0);
        for i in 0..4 {
            assert_eq!(pool.block_state(i), Some(BlockState::Free));
        }
        assert_eq!(pool.block_state(4), None);
    }

    #[test]
    fn test_allocate_invalid_layout() {
        assert!(matches!(
            BlockPool::allocate(BlockLayout::new(0, 512)),
            Err(StartupError::Allocation(_))
        ));
        assert!(BlockPool::allocate(BlockLayout::new(8, 0)).is_err());
    }

    #[test]
    fn test_default_layout() {
        let layout = BlockLayout::default();
        assert_eq!(layout.block_count, 8);
        assert_eq!(layout.block_samples, 512);
        let millis = layout.block_duration(44100).as_secs_f64() * 1000.0;
        assert!((millis - 11.61).abs() < 0.01);
    }

    #[test]
    fn test_ring_order() {
        let pool = BlockPool::allocate(BlockLayout::new(3, 4)).unwrap();

        let filling = pool.acquire_next();
        assert_eq!(filling.index(), 0);
        assert_eq!(pool.free_blocks(), 2);
        // The cursor only moves once the block is submitted.
        assert_eq!(pool.cursor(), 0);
        assert_eq!(pool.block_state(1), Some(BlockState::Free));
        let first = pool.mark_submitted(filling);
        assert_eq!(pool.cursor(), 1);
        assert_eq!(pool.block_state(0), Some(BlockState::Submitted));

        let second = submit_next(&pool, 2);
        let third = submit_next(&pool, 3);
        assert_eq!((second.index(), third.index()), (1, 2));
        assert_eq!(pool.cursor(), 0);
        assert_eq!(pool.free_blocks(), 0);

        assert!(pool.release(first));
        assert_eq!(pool.free_blocks(), 1);
        let again = submit_next(&pool, 4);
        assert_eq!(again.index(), 0);
        assert_eq!(again.generation(), first.generation() + 1);
    }

    #[test]
    fn test_read_submitted() {
        let pool = BlockPool::allocate(BlockLayout::new(2, 4)).unwrap();
        let ticket = submit_next(&pool, 7);
        assert_eq!(
            pool.read_submitted(ticket, |samples| samples.to_vec()),
            Some(vec![7, 7, 7, 7])
        );

        assert!(pool.release(ticket));
        assert_eq!(pool.read_submitted(ticket, |samples| samples.len()), None);
    }

    #[test]
    fn test_duplicate_release_is_ignored() {
        let pool = BlockPool::allocate(BlockLayout::new(2, 4)).unwrap();
        let ticket = submit_next(&pool, 1);
        assert_eq!(pool.free_blocks(), 1);

        assert!(pool.release(ticket));
        assert!(!pool.release(ticket));
        assert_eq!(pool.free_blocks(), 2);
    }

    #[test]
    fn test_stale_release_is_ignored() {
        let pool = BlockPool::allocate(BlockLayout::new(1, 4)).unwrap();
        let old = submit_next(&pool, 1);
        assert!(pool.release(old));
        let current = submit_next(&pool, 2);
        assert_eq!(old.index(), current.index());

        // A late duplicate of the first trip must not free the second.
        assert!(!pool.release(old));
        assert_eq!(pool.free_blocks(), 0);
        assert_eq!(pool.block_state(0), Some(BlockState::Submitted));
        assert!(pool.release(current));
    }

    #[test]
    fn test_free_count_stays_in_range() {
        let pool = BlockPool::allocate(BlockLayout::new(4, 2)).unwrap();
        let mut pending = Vec::new();
        for round in 0..20 {
            while pool.free_blocks() > 0 {
                pending.push(submit_next(&pool, round));
            }
            assert_eq!(pool.free_blocks(), 0);
            // Complete roughly half of the outstanding blocks each round, oldest first.
            let completed = (pending.len() + 1) / 2;
            for ticket in pending.drain(..completed) {
                assert!(pool.release(ticket));
                assert!(pool.free_blocks() <= pool.block_count());
            }
        }
    }

    #[test]
    #[should_panic(expected = "none were free")]
    fn test_acquire_with_no_free_block() {
        let pool = BlockPool::allocate(BlockLayout::new(1, 4)).unwrap();
        let _ticket = submit_next(&pool, 1);
        let _ = pool.acquire_next();
    }

    #[test]
    fn test_wait_for_free_returns_when_stopped() {
        let pool = BlockPool::allocate(BlockLayout::new(1, 4)).unwrap();
        let _ticket = submit_next(&pool, 1);
        let running = AtomicBool::new(false);
        assert!(!pool.wait_for_free(&running));
    }

    #[test]
    fn test_wait_for_free_wakes_on_release() {
        let pool = Arc::new(BlockPool::allocate(BlockLayout::new(1, 4)).unwrap());
        let ticket = submit_next(&pool, 1);

        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.wait_for_free(&AtomicBool::new(true)))
        };

        thread::sleep(Duration::from_millis(20));
        assert!(pool.release(ticket));
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_wait_for_free_wakes_on_shutdown() {
        let pool = Arc::new(BlockPool::allocate(BlockLayout::new(1, 4)).unwrap());
        let _ticket = submit_next(&pool, 1);
        let running = Arc::new(AtomicBool::new(true));

        let waiter = {
            let pool = pool.clone();
            let running = running.clone();
            thread::spawn(move || pool.wait_for_free(&running))
        };

        thread::sleep(Duration::from_millis(20));
        running.store(false, Ordering::Release);
        pool.notify_all();
        assert!(!waiter.join().unwrap());
    }
}

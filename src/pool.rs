//! Fixed-capacity ring buffer of planning blocks.
//!
//! Represented as a fixed-size array with integer indices and
//! `prev(i)`/`next(i) = (i ± 1) mod POOL_SIZE` helpers rather than a
//! doubly linked structure with circular `prev`/`next` pointers, avoiding
//! any pointer aliasing concerns while expressing the same three-cursor
//! protocol.

use crate::block::{Block, BlockKind, BlockState, MoveState};
use crate::log;

/// A fixed-capacity ring of [`Block`]s with three single-writer cursors:
/// `write` (main loop), `queue` (main loop), `run` (executor).
pub struct BufferPool<const AXES: usize, const POOL_SIZE: usize> {
    blocks: [Block<AXES>; POOL_SIZE],
    write: usize,
    queue: usize,
    run: usize,
}

impl<const AXES: usize, const POOL_SIZE: usize> BufferPool<AXES, POOL_SIZE> {
    pub fn new() -> Self {
        assert!(POOL_SIZE > 0, "pool must have at least one slot");
        Self {
            blocks: core::array::from_fn(|_| Block::empty()),
            write: 0,
            queue: 0,
            run: 0,
        }
    }

    #[inline]
    pub fn next_index(i: usize) -> usize {
        (i + 1) % POOL_SIZE
    }

    #[inline]
    pub fn prev_index(i: usize) -> usize {
        (i + POOL_SIZE - 1) % POOL_SIZE
    }

    #[inline]
    pub fn block(&self, idx: usize) -> &Block<AXES> {
        &self.blocks[idx]
    }

    #[inline]
    pub fn block_mut(&mut self, idx: usize) -> &mut Block<AXES> {
        &mut self.blocks[idx]
    }

    #[inline]
    pub fn write_index(&self) -> usize {
        self.write
    }

    #[inline]
    pub fn queue_index(&self) -> usize {
        self.queue
    }

    #[inline]
    pub fn run_index(&self) -> usize {
        self.run
    }

    /// True if the ring has no block awaiting execution: the run slot itself
    /// is `Empty`. Checking `run == write` instead is wrong once `write` has
    /// wrapped all the way back around to `run` with a full queue behind it.
    pub fn is_empty(&self) -> bool {
        self.blocks[self.run].state == BlockState::Empty
    }

    /// Whether at least one more slot could be acquired right now. Upstream
    /// callers are required to gate submission on this.
    pub fn has_space(&self) -> bool {
        self.blocks[self.write].state == BlockState::Empty
    }

    /// If the slot at `write` is `Empty`, zero it, mark `Loading`, advance
    /// `write`, and return its index. Otherwise `None`.
    pub fn try_acquire_write(&mut self) -> Option<usize> {
        let idx = self.write;
        if self.blocks[idx].state != BlockState::Empty {
            return None;
        }
        self.blocks[idx].reset();
        self.blocks[idx].state = BlockState::Loading;
        self.write = Self::next_index(self.write);
        Some(idx)
    }

    /// Relinquish the most recently acquired, not-yet-committed `Loading`
    /// slot: rewind `write` by one and reset it to `Empty`.
    pub fn release_write(&mut self) {
        self.write = Self::prev_index(self.write);
        let idx = self.write;
        self.blocks[idx].reset();
        self.blocks[idx].state = BlockState::Empty;
    }

    /// Stamp `kind`, mark `move_state = New`, promote the slot to `Queued`,
    /// advance `queue`.
    pub fn commit(&mut self, idx: usize, kind: BlockKind) {
        let block = &mut self.blocks[idx];
        block.kind = Some(kind);
        block.move_state = MoveState::New;
        block.state = BlockState::Queued;
        self.queue = Self::next_index(self.queue);
        log::trace!("pool: committed slot");
    }

    /// If the slot at `run` is `Queued` or `Pending`, promote it to
    /// `Running` and return its index; if already `Running`, return it
    /// unchanged (idempotent); otherwise `None`.
    pub fn current_run(&mut self) -> Option<usize> {
        let idx = self.run;
        match self.blocks[idx].state {
            BlockState::Queued | BlockState::Pending => {
                self.blocks[idx].state = BlockState::Running;
                Some(idx)
            }
            BlockState::Running => Some(idx),
            _ => None,
        }
    }

    /// Clear the `Running` slot to `Empty`, advance `run`, and promote the
    /// new `run` slot from `Queued` to `Pending` if applicable.
    pub fn finalise_run(&mut self) {
        let idx = self.run;
        self.blocks[idx].reset();
        self.blocks[idx].state = BlockState::Empty;
        self.run = Self::next_index(self.run);
        let next = self.run;
        if self.blocks[next].state == BlockState::Queued {
            self.blocks[next].state = BlockState::Pending;
        }
    }

    /// `first` = `current_run`; does not mutate the run cursor.
    pub fn first_index(&self) -> Option<usize> {
        let idx = self.run;
        match self.blocks[idx].state {
            BlockState::Queued | BlockState::Pending | BlockState::Running => Some(idx),
            _ => None,
        }
    }

    /// Walk forward from `first_index` while `move_state != Off`, returning
    /// the last non-`Off` block's index.
    pub fn last_index(&self) -> Option<usize> {
        let first = self.first_index()?;
        let mut idx = first;
        loop {
            let next = Self::next_index(idx);
            if next == self.write || self.blocks[next].move_state == MoveState::Off {
                return Some(idx);
            }
            idx = next;
        }
    }

    /// Clears every `Queued`/`Pending` slot (not the `Running` one, if any)
    /// back to `Empty`, and rewinds `write`/`queue` to sit just after the
    /// `run` cursor.
    pub fn flush(&mut self) {
        let mut idx = self.run;
        loop {
            idx = Self::next_index(idx);
            if idx == self.write {
                break;
            }
            if self.blocks[idx].state != BlockState::Running {
                self.blocks[idx].reset();
                self.blocks[idx].state = BlockState::Empty;
            }
        }
        let after_run = if self.blocks[self.run].state == BlockState::Running {
            Self::next_index(self.run)
        } else {
            self.run
        };
        self.write = after_run;
        self.queue = after_run;
        log::debug!("pool: flushed");
    }
}

impl<const AXES: usize, const POOL_SIZE: usize> Default for BufferPool<AXES, POOL_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_commit_run_finalise_roundtrip() {
        let mut pool: BufferPool<6, 4> = BufferPool::new();
        assert!(pool.is_empty());
        let idx = pool.try_acquire_write().unwrap();
        pool.commit(idx, BlockKind::Line);
        assert_eq!(pool.current_run(), Some(idx));
        assert_eq!(pool.current_run(), Some(idx)); // idempotent
        pool.finalise_run();
        assert!(pool.is_empty());
    }

    #[test]
    fn release_write_frees_the_slot() {
        let mut pool: BufferPool<6, 4> = BufferPool::new();
        let idx = pool.try_acquire_write().unwrap();
        assert_eq!(idx, 0);
        pool.release_write();
        assert!(pool.has_space());
        let idx2 = pool.try_acquire_write().unwrap();
        assert_eq!(idx2, 0);
    }

    #[test]
    fn pool_saturates_at_capacity() {
        let mut pool: BufferPool<6, 4> = BufferPool::new();
        for _ in 0..4 {
            let idx = pool.try_acquire_write().expect("slot available");
            pool.commit(idx, BlockKind::Line);
        }
        assert!(pool.try_acquire_write().is_none());
        assert!(!pool.has_space());
    }

    #[test]
    fn flush_clears_queued_but_not_running() {
        let mut pool: BufferPool<6, 4> = BufferPool::new();
        for _ in 0..3 {
            let idx = pool.try_acquire_write().unwrap();
            pool.commit(idx, BlockKind::Line);
        }
        let running_idx = pool.current_run().unwrap();
        pool.flush();
        assert_eq!(pool.block(running_idx).state, BlockState::Running);
        assert!(pool.has_space());
    }
}

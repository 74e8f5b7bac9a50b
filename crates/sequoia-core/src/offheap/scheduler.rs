//! Time-indexed ring of deferred note-offs.

use super::pool::{NodeId, OffHeap};
use sequoia_midi::{EventBatch, MidiEvent};

/// Defers note-offs by a frame count without allocating.
///
/// The ring has one slot per frame over `horizon + max_block` frames. Each
/// slot heads a singly-linked list of pool nodes due on that frame; new
/// entries go at the tail so release order follows scheduling order.
///
/// Each block is bracketed by [`begin_block`](Self::begin_block), which
/// releases everything due in the block before any new note is produced, and
/// [`end_block`](Self::end_block). Note-offs scheduled in between that fall
/// inside the same block skip the ring and go straight to the batch.
#[derive(Debug)]
pub struct NoteOffScheduler {
    pool: OffHeap,
    heads: Vec<Option<NodeId>>,
    tails: Vec<Option<NodeId>>,
    cursor: usize,
    horizon: usize,
    block: u32,
}

impl NoteOffScheduler {
    pub fn new(horizon: usize, max_block: usize, capacity: usize) -> Self {
        let len = horizon.max(1) + max_block.max(1);
        Self {
            pool: OffHeap::new(capacity),
            heads: vec![None; len],
            tails: vec![None; len],
            cursor: 0,
            horizon: horizon.max(1),
            block: 0,
        }
    }

    /// Moves every note-off due in the next `nframes` frames into `out`,
    /// stamped with its block offset.
    pub fn begin_block(&mut self, nframes: u32, out: &mut EventBatch) {
        for offset in 0..nframes {
            self.drain_frame(offset, out);
        }
        self.block = nframes;
    }

    /// Advances past the block opened by [`begin_block`](Self::begin_block).
    pub fn end_block(&mut self) {
        self.cursor = (self.cursor + self.block as usize) % self.heads.len();
        self.block = 0;
    }

    /// Schedules `event` to be released `delay` frames after block offset
    /// `offset`. Delays past the horizon are shortened to it.
    ///
    /// Returns `false` if the pool or `out` is exhausted.
    pub fn schedule(
        &mut self,
        offset: u32,
        delay: u32,
        event: MidiEvent,
        out: &mut EventBatch,
    ) -> bool {
        let mut delay = delay as usize;
        if delay > self.horizon {
            tracing::warn!(
                "Note-off delay {} exceeds horizon {}, clamping",
                delay,
                self.horizon
            );
            delay = self.horizon;
        }
        let due = offset as usize + delay;
        if due < self.block as usize {
            // this block's slots are already drained
            return out.push(event.with_frame_offset(due as u32));
        }

        let Some(id) = self.pool.alloc() else {
            return false;
        };
        self.pool.get_mut(id).event = event;

        let slot = (self.cursor + due) % self.heads.len();
        match self.tails[slot] {
            Some(tail) => self.pool.get_mut(tail).next = Some(id),
            None => self.heads[slot] = Some(id),
        }
        self.tails[slot] = Some(id);
        true
    }

    fn drain_frame(&mut self, offset: u32, out: &mut EventBatch) {
        let slot = (self.cursor + offset as usize) % self.heads.len();
        let mut next = self.heads[slot].take();
        self.tails[slot] = None;
        while let Some(id) = next {
            let node = *self.pool.get(id);
            out.push(node.event.with_frame_offset(offset));
            next = node.next;
            self.pool.free(id);
        }
    }

    /// Note-offs waiting in the ring.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pool.capacity() - self.pool.available()
    }

    #[inline]
    pub fn horizon(&self) -> usize {
        self.horizon
    }
}

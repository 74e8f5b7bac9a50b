//! Per-block event collection with a stable, allocation-free sort.

use crate::event::MidiEvent;

/// Fixed-capacity list of events gathered during one audio callback.
///
/// Both the event storage and the merge scratch space are allocated up front,
/// so `push`, `sort` and `clear` never touch the allocator.
#[derive(Debug)]
pub struct EventBatch {
    events: Vec<MidiEvent>,
    scratch: Vec<MidiEvent>,
    capacity: usize,
    dropped: usize,
}

impl EventBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            scratch: vec![MidiEvent::NULL; capacity],
            capacity,
            dropped: 0,
        }
    }

    /// Appends an event. Returns `false` and drops the event when full.
    #[inline]
    pub fn push(&mut self, event: MidiEvent) -> bool {
        if self.events.len() >= self.capacity {
            self.dropped += 1;
            tracing::warn!(
                "Event batch full ({} events), dropping event at frame {}",
                self.capacity,
                event.frame_offset
            );
            return false;
        }
        self.events.push(event);
        true
    }

    /// Stable merge sort by `frame_offset`.
    ///
    /// Events with equal offsets keep their insertion order, so a note-off
    /// pushed before a note-on at the same frame is dispatched first.
    pub fn sort(&mut self) {
        let len = self.events.len();
        let mut width = 1;
        let mut in_scratch = false;
        while width < len {
            {
                let (src, dst) = if in_scratch {
                    (&self.scratch[..len], &mut self.events[..len])
                } else {
                    (&self.events[..len], &mut self.scratch[..len])
                };
                let mut start = 0;
                while start < len {
                    let mid = (start + width).min(len);
                    let end = (start + 2 * width).min(len);
                    merge(&src[start..mid], &src[mid..end], &mut dst[start..end]);
                    start = end;
                }
            }
            in_scratch = !in_scratch;
            width *= 2;
        }
        if in_scratch {
            self.events.copy_from_slice(&self.scratch[..len]);
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, MidiEvent> {
        self.events.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[MidiEvent] {
        &self.events
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events rejected because the batch was full.
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<'a> IntoIterator for &'a EventBatch {
    type Item = &'a MidiEvent;
    type IntoIter = std::slice::Iter<'a, MidiEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// Ties take from the left run.
fn merge(left: &[MidiEvent], right: &[MidiEvent], out: &mut [MidiEvent]) {
    let (mut l, mut r) = (0, 0);
    for slot in out.iter_mut() {
        let take_left = r >= right.len()
            || (l < left.len() && left[l].frame_offset <= right[r].frame_offset);
        if take_left {
            *slot = left[l];
            l += 1;
        } else {
            *slot = right[r];
            r += 1;
        }
    }
}

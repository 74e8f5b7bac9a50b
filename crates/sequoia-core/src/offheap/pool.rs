//! Fixed-capacity node arena with a circular free queue.

use sequoia_midi::MidiEvent;

/// Index of a node in an [`OffHeap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum NodeState {
    Free,
    Scheduled,
}

#[derive(Debug, Clone, Copy)]
pub struct OffNode {
    pub event: MidiEvent,
    pub next: Option<NodeId>,
}

/// Preallocated pool of list nodes.
///
/// Free indices sit in a circular queue; `alloc` pops from the read end and
/// `free` pushes at the write end, so neither touches the allocator.
#[derive(Debug)]
pub struct OffHeap {
    nodes: Vec<OffNode>,
    states: Vec<NodeState>,
    avail: Vec<u32>,
    read: usize,
    write: usize,
    len: usize,
}

impl OffHeap {
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: vec![
                OffNode {
                    event: MidiEvent::NULL,
                    next: None,
                };
                capacity
            ],
            states: vec![NodeState::Free; capacity],
            avail: (0..capacity as u32).collect(),
            read: 0,
            write: 0,
            len: capacity,
        }
    }

    /// Takes a free node, or `None` when the pool is exhausted.
    pub fn alloc(&mut self) -> Option<NodeId> {
        if self.len == 0 {
            tracing::warn!("Off-heap pool exhausted ({} nodes)", self.nodes.len());
            return None;
        }
        let id = NodeId(self.avail[self.read]);
        self.read = (self.read + 1) % self.avail.len();
        self.len -= 1;
        self.states[id.index()] = NodeState::Scheduled;
        self.nodes[id.index()].next = None;
        Some(id)
    }

    /// Returns a node to the pool. Rejects ids that are not currently
    /// allocated, which would otherwise corrupt the free queue.
    pub fn free(&mut self, id: NodeId) -> bool {
        let capacity = self.avail.len();
        if id.index() >= capacity {
            tracing::error!("Off-heap free of unknown node {}", id.0);
            return false;
        }
        if self.len == capacity || self.states[id.index()] == NodeState::Free {
            tracing::error!("Off-heap double free of node {}", id.0);
            return false;
        }
        self.states[id.index()] = NodeState::Free;
        self.nodes[id.index()].next = None;
        self.avail[self.write] = id.0;
        self.write = (self.write + 1) % capacity;
        self.len += 1;
        true
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> &OffNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> &mut OffNode {
        &mut self.nodes[id.index()]
    }

    /// Free nodes.
    #[inline]
    pub fn available(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.avail.len()
    }
}

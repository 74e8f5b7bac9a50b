//! Backend port buffers handed to the scheduler once per callback.

use crate::event::RawMidiEvent;

/// Per-callback view of the backend's MIDI port buffers.
///
/// Port indices are the ids handed out at registration time. Implementations
/// must not allocate or block.
pub trait MidiPortBuffers {
    /// Empties an output buffer before the block is written.
    fn clear_output(&mut self, port: usize);

    /// Reserves space at `frame_offset` and copies `bytes` in.
    ///
    /// Returns `false` if the buffer is full, the port is unknown or the
    /// write would be out of order.
    fn write_output(&mut self, port: usize, frame_offset: u32, bytes: [u8; 3]) -> bool;

    /// Events received on an input port during this block.
    fn input_events(&self, port: usize) -> &[RawMidiEvent];
}

/// Fixed-capacity MIDI buffer for a single port.
#[derive(Debug, Clone)]
pub struct MidiBuffer {
    events: Vec<RawMidiEvent>,
    capacity: usize,
}

impl MidiBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an event. Frames must be non-decreasing.
    pub fn reserve(&mut self, frame_offset: u32, bytes: &[u8]) -> bool {
        if self.events.len() >= self.capacity {
            return false;
        }
        if let Some(last) = self.events.last() {
            if frame_offset < last.frame_offset {
                return false;
            }
        }
        self.events.push(RawMidiEvent::new(frame_offset, bytes));
        true
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[inline]
    pub fn events(&self) -> &[RawMidiEvent] {
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
}

/// In-memory set of input and output buffers.
///
/// Used for offline rendering and tests; a backend binding would implement
/// [`MidiPortBuffers`] over its own buffers instead.
#[derive(Debug, Clone)]
pub struct MidiBufferSet {
    inputs: Vec<MidiBuffer>,
    outputs: Vec<MidiBuffer>,
}

impl MidiBufferSet {
    pub fn new(num_inputs: usize, num_outputs: usize, capacity: usize) -> Self {
        Self {
            inputs: (0..num_inputs)
                .map(|_| MidiBuffer::with_capacity(capacity))
                .collect(),
            outputs: (0..num_outputs)
                .map(|_| MidiBuffer::with_capacity(capacity))
                .collect(),
        }
    }

    pub fn input_mut(&mut self, port: usize) -> Option<&mut MidiBuffer> {
        self.inputs.get_mut(port)
    }

    pub fn output(&self, port: usize) -> Option<&MidiBuffer> {
        self.outputs.get(port)
    }

    /// Queues an incoming event for the next block.
    pub fn push_input(&mut self, port: usize, event: RawMidiEvent) -> bool {
        match self.inputs.get_mut(port) {
            Some(buf) => buf.reserve(event.frame_offset, event.bytes()),
            None => false,
        }
    }

    pub fn clear_inputs(&mut self) {
        for buf in &mut self.inputs {
            buf.clear();
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }
}

impl MidiPortBuffers for MidiBufferSet {
    fn clear_output(&mut self, port: usize) {
        if let Some(buf) = self.outputs.get_mut(port) {
            buf.clear();
        }
    }

    fn write_output(&mut self, port: usize, frame_offset: u32, bytes: [u8; 3]) -> bool {
        match self.outputs.get_mut(port) {
            Some(buf) => buf.reserve(frame_offset, &bytes),
            None => false,
        }
    }

    fn input_events(&self, port: usize) -> &[RawMidiEvent] {
        self.inputs.get(port).map(MidiBuffer::events).unwrap_or(&[])
    }
}

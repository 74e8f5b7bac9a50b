//! Offline rendering of a session engine into timestamped events.

use sequoia_core::{Session, SessionEngine};
use sequoia_midi::{MidiBufferSet, RawMidiEvent};

/// Event written to an output port, stamped with its absolute frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderedEvent {
    pub frame: u64,
    pub port: usize,
    pub bytes: [u8; 3],
}

impl RenderedEvent {
    #[inline]
    pub fn status(&self) -> u8 {
        self.bytes[0]
    }
}

/// Drives an engine block by block against in-memory port buffers.
///
/// Port counts are taken from the session when the renderer is created.
pub struct OfflineRenderer {
    buffers: MidiBufferSet,
    block: u32,
    frame: u64,
}

impl OfflineRenderer {
    pub fn new(session: &Session, block: u32) -> Self {
        let capacity = session.config().event_capacity;
        Self {
            buffers: MidiBufferSet::new(session.inport_count(), session.outport_count(), capacity),
            block: block.clamp(1, session.config().max_block_frames as u32),
            frame: 0,
        }
    }

    /// Queues an event on an input port for the next block.
    pub fn push_input(&mut self, port: usize, event: RawMidiEvent) -> bool {
        self.buffers.push_input(port, event)
    }

    /// Renders `nframes` frames and returns everything written, in order.
    pub fn render(&mut self, engine: &mut SessionEngine, nframes: u64) -> Vec<RenderedEvent> {
        let mut rendered = Vec::new();
        let mut remaining = nframes;
        while remaining > 0 {
            let len = remaining.min(self.block as u64) as u32;
            engine.process(len, &mut self.buffers);
            self.buffers.clear_inputs();

            let start = rendered.len();
            for port in 0..self.buffers.num_outputs() {
                if let Some(out) = self.buffers.output(port) {
                    rendered.extend(out.events().iter().map(|ev| RenderedEvent {
                        frame: self.frame + ev.frame_offset as u64,
                        port,
                        bytes: ev.data,
                    }));
                }
            }
            rendered[start..].sort_by_key(|ev| ev.frame);

            self.frame += len as u64;
            remaining -= len as u64;
        }
        rendered
    }

    /// Frames rendered so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

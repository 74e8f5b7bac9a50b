//! MIDI types for the sequoia step sequencer.
//!
//! - **Events**: [`MidiEvent`] produced by the scheduler, [`RawMidiEvent`] read from backends
//! - **Batches**: [`EventBatch`], a fixed-capacity per-block list with a stable sort
//! - **Port buffers**: the [`MidiPortBuffers`] backend boundary and an in-memory [`MidiBufferSet`]

pub mod batch;
pub mod buffer;
pub mod event;

pub use batch::EventBatch;
pub use buffer::{MidiBuffer, MidiBufferSet, MidiPortBuffers};
pub use event::{MidiEvent, MidiEventKind, RawMidiEvent, CONTROL_CHANGE, NOTE_OFF, NOTE_ON};

/// Re-export of the underlying message parser types.
pub use midi_msg;

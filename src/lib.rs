//! # Sequoia - Real-time Step Sequencer
//!
//! Umbrella crate over the sequencer subsystems:
//! - **sequoia-core** - Triggers, sequences, sessions and the real-time engine
//! - **sequoia-midi** - MIDI events, per-block batches and port buffers
//!
//! ## Quick Start
//!
//! ```ignore
//! use sequoia::prelude::*;
//!
//! let mut session = Session::builder().name("demo").bpm(120.0).build()?;
//! let out = session.register_outport("synth")?;
//!
//! let mut kick = Sequence::with_name("kick", 16, session.tps())?;
//! kick.set_trig(0, Trigger::note(36))?;
//! kick.set_outport(Some(out))?;
//! session.add_sequence(kick)?;
//! session.start()?;
//!
//! // Offline: render two bars
//! let mut engine = session.activate()?;
//! let mut renderer = OfflineRenderer::new(&session, 512);
//! let events = renderer.render(&mut engine, 2 * 16 * 6000);
//! ```

/// Re-export of sequoia-core for direct access
pub use sequoia_core as core;
/// Re-export of sequoia-midi for direct access
pub use sequoia_midi as midi;

pub use sequoia_core::{
    Error, InPortId, InPortKind, OutPortId, Result, Sequence, SequenceControl, SequenceHandle,
    SequenceId, SequenceMut, SequenceRecord, Session, SessionBuilder, SessionConfig,
    SessionEngine, SessionRecord, Trigger, TriggerKind, DEFAULT_BPM, MAX_INPORT_SEQUENCES, MAX_STEPS,
    STEPS_PER_BEAT,
};
pub use sequoia_midi::{
    EventBatch, MidiBufferSet, MidiEvent, MidiEventKind, MidiPortBuffers, RawMidiEvent,
};

mod render;
pub use render::{OfflineRenderer, RenderedEvent};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::render::{OfflineRenderer, RenderedEvent};
    pub use sequoia_core::prelude::*;
    pub use sequoia_midi::{MidiBufferSet, MidiPortBuffers, RawMidiEvent};
}

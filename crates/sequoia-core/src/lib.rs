//! Real-time step-sequencer scheduling core.
//!
//! Sequences of [`Trigger`]s are clocked by a [`Session`] and rendered
//! sample-accurately into MIDI port buffers by its [`SessionEngine`]. The
//! control thread edits sequences and sessions through lock-free queues; the
//! audio thread applies those edits at block boundaries and never allocates.
//!
//! # Example
//!
//! ```ignore
//! use sequoia_core::prelude::*;
//! use sequoia_midi::MidiBufferSet;
//!
//! let mut session = Session::builder().name("demo").build()?;
//! let out = session.register_outport("synth")?;
//!
//! let mut seq = Sequence::new(16, session.tps())?;
//! for step in (0..16).step_by(4) {
//!     seq.set_trig(step, Trigger::note(36))?;
//! }
//! seq.set_outport(Some(out))?;
//! session.add_sequence(seq)?;
//! session.start()?;
//!
//! let mut engine = session.activate()?;
//! let mut buffers = MidiBufferSet::new(0, 1, 256);
//! engine.process(512, &mut buffers);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub mod control;
pub(crate) mod lockfree;
pub mod offheap;
pub mod port;
pub mod record;
pub mod sequence;
pub mod session;
pub mod trigger;

pub use config::{SessionConfig, DEFAULT_BPM, MAX_INPORT_SEQUENCES, MAX_STEPS, STEPS_PER_BEAT};
pub use offheap::{NoteOffScheduler, OffHeap};
pub use port::{InPortId, InPortKind, OutPortId};
pub use record::{InPortRecord, SequenceRecord, SessionRecord};
pub use sequence::{
    Sequence, SequenceCommand, SequenceControl, SequenceHandle, SequenceId, SequenceMut,
    SequenceState,
};
pub use session::{Session, SessionBuilder, SessionEngine};
pub use trigger::{Trigger, TriggerKind, TriggerRecord};

/// Common imports for building and driving sessions.
pub mod prelude {
    pub use crate::{
        InPortKind, OutPortId, Sequence, SequenceControl, SequenceId, Session, SessionConfig,
        SessionEngine, Trigger, TriggerKind,
    };
}

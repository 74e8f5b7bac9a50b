//! Step sequences.
//!
//! A [`Sequence`] is built and edited on the control thread, then handed to a
//! [`Session`](crate::Session). From then on it is addressed by
//! [`SequenceId`] and edited through [`SequenceMut`], which queues changes
//! for the audio thread while the session engine is running.

mod engine;
mod handle;
mod state;

pub(crate) use engine::{SequenceEngine, StepWindow};
pub use handle::{SequenceHandle, SequenceMut};
pub use state::SequenceState;

use crate::config::{truncate_name, MAX_STEPS, SEQUENCE_QUEUE_DEPTH};
use crate::control::{control_channel, ControlSender};
use crate::port::OutPortId;
use crate::trigger::Trigger;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SEQUENCE_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique sequence identifier. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SequenceId(pub(crate) u64);

impl SequenceId {
    fn next() -> Self {
        Self(NEXT_SEQUENCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Parameter change carried to a sequence's engine state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SequenceCommand {
    SetTrig(usize, Trigger),
    ClearTrig(usize),
    SetTranspose(i32),
    SetPlayhead(i32),
    SetFirst(i32),
    SetLast(i32),
    SetClockdivide(i32),
    SetMute(bool),
    SetOutport(Option<OutPortId>),
}

/// Editing and inspection shared by detached and attached sequences.
///
/// Mutators validate what they can against the sequence's fixed shape, then
/// either apply the change immediately or queue it, depending on who owns
/// the engine state.
pub trait SequenceControl {
    /// Applies or queues one command.
    fn dispatch(&mut self, cmd: SequenceCommand) -> Result<()>;

    fn state(&self) -> &SequenceState;

    fn set_trig(&mut self, idx: usize, trig: Trigger) -> Result<()> {
        check_step(self.state(), "step", idx as i64)?;
        self.dispatch(SequenceCommand::SetTrig(idx, trig))
    }

    fn clear_trig(&mut self, idx: usize) -> Result<()> {
        check_step(self.state(), "step", idx as i64)?;
        self.dispatch(SequenceCommand::ClearTrig(idx))
    }

    fn set_transpose(&mut self, transpose: i32) -> Result<()> {
        self.dispatch(SequenceCommand::SetTranspose(transpose))
    }

    fn set_playhead(&mut self, playhead: i32) -> Result<()> {
        check_step(self.state(), "playhead", playhead as i64)?;
        self.dispatch(SequenceCommand::SetPlayhead(playhead))
    }

    fn set_first(&mut self, first: i32) -> Result<()> {
        check_step(self.state(), "first", first as i64)?;
        self.dispatch(SequenceCommand::SetFirst(first))
    }

    fn set_last(&mut self, last: i32) -> Result<()> {
        check_step(self.state(), "last", last as i64)?;
        self.dispatch(SequenceCommand::SetLast(last))
    }

    fn set_clockdivide(&mut self, divide: i32) -> Result<()> {
        if divide < 1 {
            return Err(Error::InvalidClockDivide(divide));
        }
        self.dispatch(SequenceCommand::SetClockdivide(divide))
    }

    fn set_mute(&mut self, mute: bool) -> Result<()> {
        self.dispatch(SequenceCommand::SetMute(mute))
    }

    fn set_outport(&mut self, port: Option<OutPortId>) -> Result<()> {
        self.dispatch(SequenceCommand::SetOutport(port))
    }

    fn set_notifications(&self, enabled: bool) {
        self.state().set_notifications(enabled);
    }

    fn nsteps(&self) -> usize {
        self.state().nsteps()
    }

    fn tps(&self) -> u32 {
        self.state().tps()
    }

    fn transpose(&self) -> i32 {
        self.state().transpose()
    }

    fn playhead(&self) -> i32 {
        self.state().playhead()
    }

    fn first(&self) -> i32 {
        self.state().first()
    }

    fn last(&self) -> i32 {
        self.state().last()
    }

    fn clockdivide(&self) -> i32 {
        self.state().clockdivide()
    }

    fn mute(&self) -> bool {
        self.state().mute()
    }

    fn outport(&self) -> Option<OutPortId> {
        self.state().outport()
    }
}

fn check_step(state: &SequenceState, what: &'static str, value: i64) -> Result<()> {
    if value < 0 || value as usize >= state.nsteps() {
        return Err(Error::OutOfRange {
            what,
            value,
            bound: state.nsteps(),
        });
    }
    Ok(())
}

/// A sequence not attached to any session. Edits apply immediately.
pub struct Sequence {
    name: String,
    engine: Box<SequenceEngine>,
    sender: ControlSender<SequenceCommand>,
    state: Arc<SequenceState>,
}

impl Sequence {
    pub fn new(nsteps: usize, tps: u32) -> Result<Self> {
        Self::with_name("", nsteps, tps)
    }

    pub fn with_name(name: &str, nsteps: usize, tps: u32) -> Result<Self> {
        if nsteps == 0 || nsteps > MAX_STEPS {
            return Err(Error::OutOfRange {
                what: "nsteps",
                value: nsteps as i64,
                bound: MAX_STEPS + 1,
            });
        }
        if tps == 0 {
            return Err(Error::InvalidConfig("tps must be at least 1".into()));
        }
        let (sender, receiver) = control_channel("sequence", SEQUENCE_QUEUE_DEPTH);
        let state = Arc::new(SequenceState::new(nsteps, tps));
        let engine = SequenceEngine::new(SequenceId::next(), state.clone(), receiver);
        Ok(Self {
            name: truncate_name(name),
            engine: Box::new(engine),
            sender,
            state,
        })
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        String,
        Box<SequenceEngine>,
        ControlSender<SequenceCommand>,
        Arc<SequenceState>,
    ) {
        (self.name, self.engine, self.sender, self.state)
    }

    pub(crate) fn from_parts(
        name: String,
        engine: Box<SequenceEngine>,
        sender: ControlSender<SequenceCommand>,
        state: Arc<SequenceState>,
    ) -> Self {
        Self {
            name,
            engine,
            sender,
            state,
        }
    }

    #[inline]
    pub fn id(&self) -> SequenceId {
        self.engine.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = truncate_name(name);
    }

    pub fn trigger(&self, idx: usize) -> Option<Trigger> {
        self.engine.steps().get(idx).copied()
    }

    pub fn triggers(&self) -> &[Trigger] {
        self.engine.steps()
    }

    /// Seeds the probability draw, for reproducible renders.
    pub fn set_seed(&mut self, seed: u64) {
        self.engine.seed(seed);
    }

    /// Changes queued while attached but not yet applied are applied now.
    pub(crate) fn settle(&mut self) {
        self.engine.drain_commands();
    }
}

impl SequenceControl for Sequence {
    fn dispatch(&mut self, cmd: SequenceCommand) -> Result<()> {
        self.engine.apply(cmd)
    }

    fn state(&self) -> &SequenceState {
        &self.state
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("name", &self.name)
            .field("engine", &self.engine)
            .finish()
    }
}

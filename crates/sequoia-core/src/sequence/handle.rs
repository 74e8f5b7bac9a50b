use super::engine::SequenceEngine;
use super::state::SequenceState;
use super::{SequenceCommand, SequenceControl, SequenceId};
use crate::config::truncate_name;
use crate::control::ControlSender;
use crate::trigger::Trigger;
use crate::{Error, Result};
use std::sync::Arc;

/// Control-side view of a sequence owned by a session.
///
/// Scalars come from the published [`SequenceState`]. Triggers are mirrored
/// here as they are sent, since the audio thread never changes them.
pub struct SequenceHandle {
    id: SequenceId,
    name: String,
    sender: ControlSender<SequenceCommand>,
    state: Arc<SequenceState>,
    steps: Vec<Trigger>,
}

impl SequenceHandle {
    pub(crate) fn new(
        id: SequenceId,
        name: String,
        sender: ControlSender<SequenceCommand>,
        state: Arc<SequenceState>,
        steps: Vec<Trigger>,
    ) -> Self {
        Self {
            id,
            name,
            sender,
            state,
            steps,
        }
    }

    pub(crate) fn into_parts(self) -> (String, ControlSender<SequenceCommand>, Arc<SequenceState>) {
        (self.name, self.sender, self.state)
    }

    #[inline]
    pub fn id(&self) -> SequenceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &SequenceState {
        &self.state
    }

    pub fn trigger(&self, idx: usize) -> Option<Trigger> {
        self.steps.get(idx).copied()
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.steps
    }

    fn mirror(&mut self, cmd: &SequenceCommand) {
        match *cmd {
            SequenceCommand::SetTrig(idx, trig) => self.steps[idx] = trig,
            SequenceCommand::ClearTrig(idx) => self.steps[idx] = Trigger::default(),
            _ => {}
        }
    }
}

impl std::fmt::Debug for SequenceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Mutable access to a session's sequence.
///
/// Holds the engine state directly while the session engine is parked on
/// the control thread; otherwise every edit goes through the sequence's
/// control queue.
pub struct SequenceMut<'a> {
    handle: &'a mut SequenceHandle,
    engine: Option<&'a mut SequenceEngine>,
    outports: usize,
}

impl<'a> SequenceMut<'a> {
    pub(crate) fn new(
        handle: &'a mut SequenceHandle,
        engine: Option<&'a mut SequenceEngine>,
        outports: usize,
    ) -> Self {
        Self {
            handle,
            engine,
            outports,
        }
    }

    pub fn id(&self) -> SequenceId {
        self.handle.id
    }

    pub fn name(&self) -> &str {
        &self.handle.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.handle.name = truncate_name(name);
    }

    pub fn trigger(&self, idx: usize) -> Option<Trigger> {
        self.handle.trigger(idx)
    }
}

impl SequenceControl for SequenceMut<'_> {
    fn dispatch(&mut self, cmd: SequenceCommand) -> Result<()> {
        if let SequenceCommand::SetOutport(Some(port)) = cmd {
            if port.index() >= self.outports {
                return Err(Error::UnknownPort(format!("output #{}", port.index())));
            }
        }
        match self.engine.as_deref_mut() {
            Some(engine) => engine.apply(cmd)?,
            None => self.handle.sender.send(cmd)?,
        }
        self.handle.mirror(&cmd);
        Ok(())
    }

    fn state(&self) -> &SequenceState {
        &self.handle.state
    }
}

//! Step engine state for one sequence.
//!
//! Owned by exactly one thread at a time: the control thread while the
//! sequence is detached or its session is inactive, the audio thread
//! otherwise. Mutation happens only through the `_now` methods.

use super::state::SequenceState;
use super::{SequenceCommand, SequenceId};
use crate::control::ControlReceiver;
use crate::offheap::NoteOffScheduler;
use crate::port::{InputAction, OutPortId};
use crate::trigger::{Trigger, TriggerKind};
use crate::{Error, Result};
use sequoia_midi::{EventBatch, MidiEvent};
use std::sync::Arc;

/// Slice of the current step covered by one `process` call.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StepWindow {
    /// Frames per step.
    pub fps: u32,
    /// First in-step frame of the slice.
    pub start: u32,
    pub len: u32,
    /// Block offset of `start`.
    pub offset: u32,
}

pub(crate) struct SequenceEngine {
    id: SequenceId,
    steps: Vec<Trigger>,
    transpose: i32,
    clockdivide: i32,
    counter: i32,
    mute: bool,
    first: usize,
    last: usize,
    playhead: usize,
    /// The current step's trigger has been evaluated.
    evaluated: bool,
    outport: Option<OutPortId>,
    commands: ControlReceiver<SequenceCommand>,
    state: Arc<SequenceState>,
    rng: fastrand::Rng,
}

impl SequenceEngine {
    pub(crate) fn new(
        id: SequenceId,
        state: Arc<SequenceState>,
        commands: ControlReceiver<SequenceCommand>,
    ) -> Self {
        let nsteps = state.nsteps();
        Self {
            id,
            steps: vec![Trigger::default(); nsteps],
            transpose: 0,
            clockdivide: 1,
            counter: 0,
            mute: false,
            first: 0,
            last: nsteps - 1,
            playhead: 0,
            evaluated: false,
            outport: None,
            commands,
            state,
            rng: fastrand::Rng::new(),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> SequenceId {
        self.id
    }

    #[inline]
    pub(crate) fn nsteps(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub(crate) fn steps(&self) -> &[Trigger] {
        &self.steps
    }

    #[inline]
    pub(crate) fn outport(&self) -> Option<OutPortId> {
        self.outport
    }

    pub(crate) fn seed(&mut self, seed: u64) {
        self.rng.seed(seed);
    }

    /// Applies everything queued by the control thread, logging rejections.
    pub(crate) fn drain_commands(&mut self) {
        while let Some(cmd) = self.commands.pop() {
            if let Err(e) = self.apply(cmd) {
                tracing::warn!("Sequence {:?}: {}", self.id, e);
            }
        }
    }

    pub(crate) fn apply(&mut self, cmd: SequenceCommand) -> Result<()> {
        match cmd {
            SequenceCommand::SetTrig(idx, trig) => self.set_trig_now(idx, trig),
            SequenceCommand::ClearTrig(idx) => self.clear_trig_now(idx),
            SequenceCommand::SetTranspose(t) => {
                self.set_transpose_now(t);
                Ok(())
            }
            SequenceCommand::SetPlayhead(p) => self.set_playhead_now(p),
            SequenceCommand::SetFirst(f) => self.set_first_now(f),
            SequenceCommand::SetLast(l) => self.set_last_now(l),
            SequenceCommand::SetClockdivide(d) => self.set_clockdivide_now(d),
            SequenceCommand::SetMute(m) => {
                self.set_mute_now(m);
                Ok(())
            }
            SequenceCommand::SetOutport(port) => {
                self.set_outport_now(port);
                Ok(())
            }
        }
    }

    pub(crate) fn apply_input(&mut self, action: InputAction) {
        let result = match action {
            InputAction::Transpose(t) => {
                self.set_transpose_now(t);
                Ok(())
            }
            InputAction::Playhead(p) => self.set_playhead_now(p),
            InputAction::First(f) => self.set_first_now(f),
            InputAction::Last(l) => self.set_last_now(l),
            InputAction::Clockdivide(d) => self.set_clockdivide_now(d),
            InputAction::Mute(m) => {
                self.set_mute_now(m);
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::debug!("Sequence {:?} ignored input: {}", self.id, e);
        }
    }

    fn check_index(&self, what: &'static str, value: i64) -> Result<usize> {
        if value < 0 || value as usize >= self.steps.len() {
            return Err(Error::OutOfRange {
                what,
                value,
                bound: self.steps.len(),
            });
        }
        Ok(value as usize)
    }

    pub(crate) fn set_trig_now(&mut self, idx: usize, trig: Trigger) -> Result<()> {
        let idx = self.check_index("step", idx as i64)?;
        self.steps[idx] = trig;
        Ok(())
    }

    pub(crate) fn clear_trig_now(&mut self, idx: usize) -> Result<()> {
        let idx = self.check_index("step", idx as i64)?;
        self.steps[idx] = Trigger::default();
        Ok(())
    }

    pub(crate) fn set_transpose_now(&mut self, transpose: i32) {
        self.transpose = transpose;
        self.state.publish_transpose(transpose);
    }

    /// The playhead must stay inside the loop.
    pub(crate) fn set_playhead_now(&mut self, playhead: i32) -> Result<()> {
        let playhead = self.check_index("playhead", playhead as i64)?;
        if playhead < self.first || playhead > self.last {
            return Err(Error::OutOfRange {
                what: "playhead outside loop",
                value: playhead as i64,
                bound: self.last + 1,
            });
        }
        self.playhead = playhead;
        self.state.publish_playhead(playhead);
        Ok(())
    }

    pub(crate) fn set_first_now(&mut self, first: i32) -> Result<()> {
        let first = self.check_index("first", first as i64)?;
        if first > self.last {
            return Err(Error::InvalidLoopRange {
                first: first as i32,
                last: self.last as i32,
            });
        }
        self.first = first;
        self.state.publish_first(first);
        if self.playhead < first {
            self.playhead = first;
            self.state.publish_playhead(first);
        }
        Ok(())
    }

    pub(crate) fn set_last_now(&mut self, last: i32) -> Result<()> {
        let last = self.check_index("last", last as i64)?;
        if last < self.first {
            return Err(Error::InvalidLoopRange {
                first: self.first as i32,
                last: last as i32,
            });
        }
        self.last = last;
        self.state.publish_last(last);
        if self.playhead > last {
            self.playhead = self.first;
            self.state.publish_playhead(self.first);
        }
        Ok(())
    }

    pub(crate) fn set_clockdivide_now(&mut self, divide: i32) -> Result<()> {
        if divide < 1 {
            return Err(Error::InvalidClockDivide(divide));
        }
        self.clockdivide = divide;
        if self.counter >= divide {
            self.counter = 0;
        }
        self.state.publish_clockdivide(divide);
        Ok(())
    }

    pub(crate) fn set_mute_now(&mut self, mute: bool) {
        self.mute = mute;
        self.state.publish_mute(mute);
    }

    pub(crate) fn set_outport_now(&mut self, port: Option<OutPortId>) {
        self.outport = port;
        self.state.publish_outport(port);
    }

    /// Back to the top of the loop with a fresh clock-divide count.
    pub(crate) fn reset(&mut self) {
        self.counter = 0;
        self.evaluated = false;
        self.playhead = self.first;
        self.state.publish_playhead(self.first);
    }

    /// Called once per step boundary.
    pub(crate) fn step(&mut self) {
        self.evaluated = false;
        self.counter += 1;
        if self.counter < self.clockdivide {
            return;
        }
        self.counter = 0;
        self.playhead = if self.playhead >= self.last {
            self.first
        } else {
            self.playhead + 1
        };
        self.state.publish_playhead(self.playhead);
    }

    /// Emits this step's trigger if its fire frame falls inside `window`.
    ///
    /// A trigger is evaluated at most once per step, even if a tempo change
    /// moves its fire frame past the current position.
    pub(crate) fn process(
        &mut self,
        window: StepWindow,
        batch: &mut EventBatch,
        offs: &mut NoteOffScheduler,
    ) {
        self.drain_commands();

        if window.start + window.len > window.fps {
            tracing::error!(
                "Sequence {:?}: window {}+{} crosses step of {} frames",
                self.id,
                window.start,
                window.len,
                window.fps
            );
            return;
        }
        if self.mute || self.counter != 0 {
            return;
        }
        let Some(port) = self.outport else {
            return;
        };
        let trig = self.steps[self.playhead];
        if trig.is_null() {
            return;
        }

        let frame = trig.fire_frame(window.fps);
        if frame < window.start || frame >= window.start + window.len || self.evaluated {
            return;
        }
        self.evaluated = true;
        if self.rng.f32() >= trig.probability() {
            return;
        }

        let offset = window.offset + (frame - window.start);
        match trig.kind() {
            TriggerKind::Note {
                note,
                velocity,
                length,
            } => {
                let note = (note as i32 + self.transpose).clamp(0, 127) as u8;
                let frames = (length * window.fps as f32).round() as u32;
                let on =
                    MidiEvent::note_on(port.index(), offset, trig.channel(), note, velocity, frames);
                if batch.push(on) {
                    offs.schedule(offset, frames, on.release(), batch);
                }
            }
            TriggerKind::ControlChange { number, value } => {
                batch.push(MidiEvent::control_change(
                    port.index(),
                    offset,
                    trig.channel(),
                    number,
                    value,
                ));
            }
            TriggerKind::Null => {}
        }
    }
}

impl std::fmt::Debug for SequenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceEngine")
            .field("id", &self.id)
            .field("nsteps", &self.steps.len())
            .field("playhead", &self.playhead)
            .field("first", &self.first)
            .field("last", &self.last)
            .field("clockdivide", &self.clockdivide)
            .field("mute", &self.mute)
            .finish()
    }
}

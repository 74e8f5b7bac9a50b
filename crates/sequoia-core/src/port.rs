//! Output and input port identifiers and input port routing.

use crate::config::MAX_INPORT_SEQUENCES;
use crate::sequence::SequenceId;
use serde::{Deserialize, Serialize};

/// Index of a registered output port, in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutPortId(pub(crate) usize);

impl OutPortId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a registered input port, in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InPortId(pub(crate) usize);

impl InPortId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Which sequence parameter an input port drives.
///
/// Incoming channel-1 note-ons are mapped relative to middle C (note 60).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InPortKind {
    #[default]
    None,
    /// Transpose by `note - 60`.
    Transpose,
    /// Jump the playhead to `(note - 60) mod nsteps`.
    Playhead,
    /// Divide the clock by `1 + |note - 60|`.
    Clockdivide,
    /// Even notes mute, odd notes unmute.
    Mute,
    First,
    Last,
}

/// Audio-thread routing for one input port.
#[derive(Debug, Clone)]
pub(crate) struct InPort {
    pub(crate) kind: InPortKind,
    pub(crate) targets: Vec<SequenceId>,
}

impl InPort {
    pub(crate) fn new(kind: InPortKind) -> Self {
        Self {
            kind,
            targets: Vec::with_capacity(MAX_INPORT_SEQUENCES),
        }
    }

    /// Returns `false` if the port already drives the maximum number of
    /// sequences or already drives this one.
    pub(crate) fn add_target(&mut self, id: SequenceId) -> bool {
        if self.targets.contains(&id) {
            return false;
        }
        if self.targets.len() >= MAX_INPORT_SEQUENCES {
            tracing::warn!(
                "Input port already drives {} sequences",
                MAX_INPORT_SEQUENCES
            );
            return false;
        }
        self.targets.push(id);
        true
    }

    pub(crate) fn remove_target(&mut self, id: SequenceId) {
        self.targets.retain(|t| *t != id);
    }
}

/// Value an input note maps to for a port kind, given the target's length.
pub(crate) enum InputAction {
    Transpose(i32),
    Playhead(i32),
    First(i32),
    Last(i32),
    Clockdivide(i32),
    Mute(bool),
}

pub(crate) fn map_input_note(kind: InPortKind, note: u8, nsteps: usize) -> Option<InputAction> {
    let rel = note as i32 - 60;
    let wrapped = rel.rem_euclid(nsteps as i32);
    match kind {
        InPortKind::None => None,
        InPortKind::Transpose => Some(InputAction::Transpose(rel)),
        InPortKind::Playhead => Some(InputAction::Playhead(wrapped)),
        InPortKind::First => Some(InputAction::First(wrapped)),
        InPortKind::Last => Some(InputAction::Last(wrapped)),
        InPortKind::Clockdivide => Some(InputAction::Clockdivide(1 + rel.abs())),
        InPortKind::Mute => Some(InputAction::Mute(note % 2 == 0)),
    }
}

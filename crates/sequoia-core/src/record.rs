//! Serializable snapshots of sessions and sequences.

use crate::port::InPortKind;
use crate::sequence::{Sequence, SequenceControl, SequenceState};
use crate::trigger::{Trigger, TriggerRecord};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub name: String,
    pub bpm: f32,
    pub tps: u32,
    #[serde(default)]
    pub outports: Vec<String>,
    #[serde(default)]
    pub inports: Vec<InPortRecord>,
    #[serde(default)]
    pub sequences: Vec<SequenceRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InPortRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InPortKind,
    /// Names of the driven sequences.
    #[serde(default)]
    pub sequences: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub name: String,
    pub nsteps: usize,
    pub tps: u32,
    pub mute: bool,
    pub transpose: i32,
    pub clockdivide: i32,
    pub first: i32,
    pub last: i32,
    /// Output port name, if routed.
    #[serde(default)]
    pub outport: Option<String>,
    pub triggers: Vec<TriggerRecord>,
}

impl SequenceRecord {
    pub(crate) fn capture(
        name: &str,
        state: &SequenceState,
        triggers: &[Trigger],
        outport: Option<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            nsteps: state.nsteps(),
            tps: state.tps(),
            mute: state.mute(),
            transpose: state.transpose(),
            clockdivide: state.clockdivide(),
            first: state.first(),
            last: state.last(),
            outport,
            triggers: triggers.iter().map(Trigger::to_record).collect(),
        }
    }
}

impl Sequence {
    /// Output routing is session-level and is left out here.
    pub fn to_record(&self) -> SequenceRecord {
        SequenceRecord::capture(self.name(), self.state(), self.triggers(), None)
    }

    pub fn from_record(record: &SequenceRecord) -> Result<Sequence> {
        let mut seq = Sequence::with_name(&record.name, record.nsteps, record.tps)?;
        if record.triggers.len() > record.nsteps {
            return Err(Error::OutOfRange {
                what: "trigger count",
                value: record.triggers.len() as i64,
                bound: record.nsteps + 1,
            });
        }
        for (idx, trig) in record.triggers.iter().enumerate() {
            seq.set_trig(idx, Trigger::from_record(trig))?;
        }
        // last first, so the loop never passes through first > last
        seq.set_last(record.last)?;
        seq.set_first(record.first)?;
        seq.set_transpose(record.transpose)?;
        seq.set_clockdivide(record.clockdivide)?;
        seq.set_mute(record.mute)?;
        Ok(seq)
    }
}

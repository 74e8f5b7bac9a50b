//! Pattern step values.

use serde::{Deserialize, Serialize};

pub const DEFAULT_NOTE: u8 = 60;
pub const DEFAULT_VELOCITY: u8 = 100;
pub const DEFAULT_LENGTH: f32 = 0.5;

/// Largest f32 strictly below 0.5.
pub const MICROTIME_MAX: f32 = 0.499_999_97;
pub const MICROTIME_MIN: f32 = -0.5;

/// Highest controller number a trigger may send (120-127 are channel mode messages).
pub const MAX_CC_NUMBER: u8 = 119;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum TriggerKind {
    #[default]
    Null,
    /// `length` is in steps.
    Note { note: u8, velocity: u8, length: f32 },
    ControlChange { number: u8, value: u8 },
}

/// One pattern step.
///
/// `microtime` shifts the firing point within the step, as a fraction of a
/// step around its centre. `probability` is the chance the step fires each
/// time the playhead lands on it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trigger {
    kind: TriggerKind,
    channel: u8,
    microtime: f32,
    probability: f32,
}

impl Default for Trigger {
    fn default() -> Self {
        Self {
            kind: TriggerKind::Null,
            channel: 1,
            microtime: 0.0,
            probability: 1.0,
        }
    }
}

impl Trigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note trigger with default velocity and length.
    pub fn note(note: u8) -> Self {
        let mut trig = Self::default();
        trig.set_note(note, DEFAULT_VELOCITY, DEFAULT_LENGTH);
        trig
    }

    pub fn cc(number: u8, value: u8) -> Self {
        let mut trig = Self::default();
        trig.set_cc(number, value);
        trig
    }

    pub fn set_null(&mut self) {
        self.kind = TriggerKind::Null;
    }

    /// Negative or non-finite lengths become 0.
    pub fn set_note(&mut self, note: u8, velocity: u8, length: f32) {
        let length = if length.is_finite() { length.max(0.0) } else { 0.0 };
        self.kind = TriggerKind::Note {
            note: note.min(127),
            velocity: velocity.min(127),
            length,
        };
    }

    pub fn set_cc(&mut self, number: u8, value: u8) {
        self.kind = TriggerKind::ControlChange {
            number: number.min(MAX_CC_NUMBER),
            value: value.min(127),
        };
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel.clamp(1, 16);
    }

    pub fn set_microtime(&mut self, microtime: f32) {
        self.microtime = if microtime.is_nan() {
            0.0
        } else {
            microtime.clamp(MICROTIME_MIN, MICROTIME_MAX)
        };
    }

    pub fn set_probability(&mut self, probability: f32) {
        self.probability = if probability.is_nan() {
            1.0
        } else {
            probability.clamp(0.0, 1.0)
        };
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.set_channel(channel);
        self
    }

    pub fn with_microtime(mut self, microtime: f32) -> Self {
        self.set_microtime(microtime);
        self
    }

    pub fn with_probability(mut self, probability: f32) -> Self {
        self.set_probability(probability);
        self
    }

    #[inline]
    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.kind == TriggerKind::Null
    }

    #[inline]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    #[inline]
    pub fn microtime(&self) -> f32 {
        self.microtime
    }

    #[inline]
    pub fn probability(&self) -> f32 {
        self.probability
    }

    /// Frame within a step of `fps` frames at which this trigger fires.
    #[inline]
    pub fn fire_frame(&self, fps: u32) -> u32 {
        let frame = (fps as f32 * (0.5 + self.microtime)).round() as u32;
        frame.min(fps.saturating_sub(1))
    }
}

/// Serialized trigger type tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Null,
    Note,
    Cc,
}

/// Persisted form of a [`Trigger`]. Fields of the inactive kind are kept at
/// their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
    #[serde(rename = "type")]
    pub kind: TriggerType,
    pub channel: u8,
    pub microtime: f32,
    pub note: u8,
    pub velocity: u8,
    pub length: f32,
    pub cc_number: u8,
    pub cc_value: u8,
    pub probability: f32,
}

impl Trigger {
    pub fn to_record(&self) -> TriggerRecord {
        let mut record = TriggerRecord {
            kind: TriggerType::Null,
            channel: self.channel,
            microtime: self.microtime,
            note: DEFAULT_NOTE,
            velocity: DEFAULT_VELOCITY,
            length: DEFAULT_LENGTH,
            cc_number: 0,
            cc_value: 0,
            probability: self.probability,
        };
        match self.kind {
            TriggerKind::Null => {}
            TriggerKind::Note {
                note,
                velocity,
                length,
            } => {
                record.kind = TriggerType::Note;
                record.note = note;
                record.velocity = velocity;
                record.length = length;
            }
            TriggerKind::ControlChange { number, value } => {
                record.kind = TriggerType::Cc;
                record.cc_number = number;
                record.cc_value = value;
            }
        }
        record
    }

    /// Out-of-range fields are clamped the same way the setters clamp them.
    pub fn from_record(record: &TriggerRecord) -> Self {
        let mut trig = Trigger::default();
        match record.kind {
            TriggerType::Null => {}
            TriggerType::Note => trig.set_note(record.note, record.velocity, record.length),
            TriggerType::Cc => trig.set_cc(record.cc_number, record.cc_value),
        }
        trig.set_channel(record.channel);
        trig.set_microtime(record.microtime);
        trig.set_probability(record.probability);
        trig
    }
}

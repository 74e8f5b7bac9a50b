//! Session configuration.
//!
//! Everything here sizes a preallocated structure, so it is fixed once a
//! session is built.

use crate::{Error, Result};

pub const DEFAULT_BPM: f32 = 120.0;
pub const STEPS_PER_BEAT: u32 = 4;
pub const SECONDS_PER_MINUTE: f64 = 60.0;

/// Upper bound on steps in one sequence.
pub const MAX_STEPS: usize = 4096;
/// Sequences a single input port can drive.
pub const MAX_INPORT_SEQUENCES: usize = 16;
/// Names longer than this are truncated.
pub const MAX_NAME_LENGTH: usize = 255;
/// Depth of each sequence's control queue.
pub const SEQUENCE_QUEUE_DEPTH: usize = 256;

/// Configuration for a session and its real-time engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub sample_rate: f64,
    /// Ticks per step. Every sequence in the session must match.
    pub tps: u32,
    pub max_sequences: usize,
    pub max_outports: usize,
    pub max_inports: usize,
    /// Note-offs that can be pending at once.
    pub max_note_offs: usize,
    /// Depth of the session control queue.
    pub queue_depth: usize,
    /// Events collected per callback before dropping.
    pub event_capacity: usize,
    /// Largest block the backend will ask for.
    pub max_block_frames: usize,
    /// Longest note, in seconds, the note-off ring can defer.
    pub max_trigger_seconds: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            tps: 24,
            max_sequences: 256,
            max_outports: 16,
            max_inports: 16,
            max_note_offs: 1024,
            queue_depth: 256,
            event_capacity: 1024,
            max_block_frames: 8192,
            max_trigger_seconds: 8.0,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate < 8000.0 || self.sample_rate > 384000.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate {} out of range (8000-384000 Hz)",
                self.sample_rate
            )));
        }
        if self.tps == 0 {
            return Err(Error::InvalidConfig("tps must be at least 1".into()));
        }
        let sizes = [
            ("max_sequences", self.max_sequences),
            ("max_outports", self.max_outports),
            ("max_inports", self.max_inports),
            ("max_note_offs", self.max_note_offs),
            ("queue_depth", self.queue_depth),
            ("event_capacity", self.event_capacity),
            ("max_block_frames", self.max_block_frames),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be non-zero")));
            }
        }
        if !(self.max_trigger_seconds > 0.0 && self.max_trigger_seconds <= 60.0) {
            return Err(Error::InvalidConfig(format!(
                "max_trigger_seconds {} out of range (0-60 s]",
                self.max_trigger_seconds
            )));
        }
        Ok(())
    }

    /// Frames the note-off ring can defer a release by.
    pub fn note_off_horizon(&self) -> usize {
        (self.sample_rate * self.max_trigger_seconds).ceil() as usize
    }

    /// Frames per step at `bpm`, never less than one.
    pub fn frames_per_step(&self, bpm: f32) -> u32 {
        let fps = self.sample_rate * SECONDS_PER_MINUTE / (bpm as f64 * STEPS_PER_BEAT as f64);
        (fps.round() as u32).max(1)
    }
}

pub(crate) fn truncate_name(name: &str) -> String {
    match name.char_indices().nth(MAX_NAME_LENGTH) {
        Some((idx, _)) => name[..idx].to_string(),
        None => name.to_string(),
    }
}

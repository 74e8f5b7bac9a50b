//! Builder for configuring and constructing a [`Session`].

use super::Session;
use crate::config::{SessionConfig, DEFAULT_BPM};
use crate::Result;

/// Fixed sizes (queue depths, pool and batch capacities) are taken from the
/// config at build time and cannot change afterwards.
///
/// # Example
///
/// ```ignore
/// use sequoia_core::prelude::*;
///
/// let session = Session::builder()
///     .name("live")
///     .sample_rate(44100.0)
///     .tps(96)
///     .bpm(132.0)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    name: String,
    config: SessionConfig,
    bpm: f32,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            name: String::new(),
            config: SessionConfig::default(),
            bpm: DEFAULT_BPM,
        }
    }
}

impl SessionBuilder {
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Replaces every configured value.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 48000
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 24
    pub fn tps(mut self, tps: u32) -> Self {
        self.config.tps = tps;
        self
    }

    /// Default: 120
    pub fn bpm(mut self, bpm: f32) -> Self {
        self.bpm = bpm;
        self
    }

    pub fn max_sequences(mut self, max: usize) -> Self {
        self.config.max_sequences = max;
        self
    }

    pub fn max_ports(mut self, outputs: usize, inputs: usize) -> Self {
        self.config.max_outports = outputs;
        self.config.max_inports = inputs;
        self
    }

    pub fn max_note_offs(mut self, max: usize) -> Self {
        self.config.max_note_offs = max;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn max_block_frames(mut self, frames: usize) -> Self {
        self.config.max_block_frames = frames;
        self
    }

    pub fn max_trigger_seconds(mut self, seconds: f64) -> Self {
        self.config.max_trigger_seconds = seconds;
        self
    }

    pub fn build(self) -> Result<Session> {
        Session::with_bpm(&self.name, self.config, self.bpm)
    }
}

//! Integration test modules for sequoia
//!
//! - scheduling: sample-accurate output of the session engine
//! - control: cross-thread edits, input ports, notifications
//! - persistence: records and save/load

pub mod control;
pub mod scheduling;

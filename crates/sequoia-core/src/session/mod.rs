//! Sessions: sequences, ports, tempo and the real-time engine.
//!
//! A [`Session`] lives on the control thread. Its [`SessionEngine`] is either
//! parked inside it, in which case every edit applies immediately, or handed
//! to the audio thread with [`Session::activate`], in which case edits are
//! queued and applied at the start of the next block.
//!
//! # Example
//!
//! ```ignore
//! use sequoia_core::prelude::*;
//!
//! let mut session = Session::builder().name("live").build()?;
//! let out = session.register_outport("synth")?;
//!
//! let mut seq = Sequence::with_name("kick", 16, session.tps())?;
//! seq.set_trig(0, Trigger::note(36))?;
//! seq.set_outport(Some(out))?;
//! let kick = session.add_sequence(seq)?;
//!
//! session.start()?;
//! let mut engine = session.activate()?;
//! // audio thread: engine.process(nframes, &mut buffers);
//! session.sequence_mut(kick).unwrap().set_transpose(2)?;
//! ```

mod builder;
mod engine;

pub use builder::SessionBuilder;
pub use engine::SessionEngine;

use crate::config::{truncate_name, SessionConfig, MAX_INPORT_SEQUENCES};
use crate::control::{control_channel, ControlSender};
use crate::lockfree::{AtomicFlag, AtomicFloat, AtomicInt};
use crate::port::{InPort, InPortId, InPortKind, OutPortId};
use crate::record::{InPortRecord, SequenceRecord, SessionRecord};
use crate::sequence::{
    Sequence, SequenceControl, SequenceEngine, SequenceHandle, SequenceId, SequenceMut,
};
use crate::{Error, Result};
use crossbeam_channel::Receiver;
use engine::SessionShared;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(0);

/// Change request carried to the session engine.
pub(crate) enum SessionCommand {
    Go(bool),
    SetBpm(f32),
    AddSequence(Box<SequenceEngine>),
    RemoveSequence(SequenceId),
    AddOutport,
    AddInport(InPort),
    SetInportKind(InPortId, InPortKind),
    InportAddSequence(InPortId, SequenceId),
    InportRemoveSequence(InPortId, SequenceId),
}

#[derive(Debug, Clone)]
struct InPortInfo {
    name: String,
    kind: InPortKind,
    targets: Vec<SequenceId>,
}

/// Control-thread owner of a set of sequences and ports.
pub struct Session {
    id: u64,
    name: String,
    config: SessionConfig,
    shared: Arc<SessionShared>,
    commands: ControlSender<SessionCommand>,
    retired: Receiver<Box<SequenceEngine>>,
    engine: Option<SessionEngine>,
    sequences: Vec<SequenceHandle>,
    removing: Vec<SequenceHandle>,
    outports: Vec<String>,
    inports: Vec<InPortInfo>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn new(name: &str, config: SessionConfig) -> Result<Self> {
        Self::with_bpm(name, config, crate::config::DEFAULT_BPM)
    }

    pub(crate) fn with_bpm(name: &str, config: SessionConfig, bpm: f32) -> Result<Self> {
        config.validate()?;
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(Error::InvalidTempo(bpm));
        }
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let (commands, receiver) = control_channel("session", config.queue_depth);
        let (retire_tx, retired) = crossbeam_channel::bounded(config.max_sequences);
        let shared = Arc::new(SessionShared {
            bpm: AtomicFloat::new(bpm),
            playing: AtomicFlag::new(false),
            frames_per_step: AtomicInt::new(0),
        });
        let engine = SessionEngine::new(id, config, bpm, receiver, retire_tx, shared.clone());

        tracing::debug!(
            "Created session '{}' ({} Hz, {} tps, {} BPM)",
            name,
            config.sample_rate,
            config.tps,
            bpm
        );

        Ok(Self {
            id,
            name: truncate_name(name),
            config,
            shared,
            commands,
            retired,
            engine: Some(engine),
            sequences: Vec::with_capacity(config.max_sequences),
            removing: Vec::new(),
            outports: Vec::with_capacity(config.max_outports),
            inports: Vec::with_capacity(config.max_inports),
        })
    }

    /// Applies `cmd` now if the engine is parked here, otherwise queues it.
    fn dispatch(&mut self, cmd: SessionCommand) -> Result<()> {
        match self.engine.as_mut() {
            Some(engine) => {
                engine.apply(cmd);
                Ok(())
            }
            None => self.commands.send(cmd),
        }
    }

    /// Fails early when a queued command would be dropped, so that owned
    /// payloads are never lost.
    fn ensure_room(&self) -> Result<()> {
        if self.engine.is_none() && !self.commands.has_room() {
            tracing::warn!("session control queue full");
            return Err(Error::QueueFull("session"));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = truncate_name(name);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[inline]
    pub fn tps(&self) -> u32 {
        self.config.tps
    }

    // --- Engine handoff ---

    /// Hands the real-time engine to the caller, normally the audio thread.
    pub fn activate(&mut self) -> Result<SessionEngine> {
        let engine = self.engine.take().ok_or(Error::AlreadyActive)?;
        tracing::debug!("Session '{}' engine activated", self.name);
        Ok(engine)
    }

    /// Takes the engine back and applies anything still queued for it.
    pub fn deactivate(&mut self, mut engine: SessionEngine) -> Result<()> {
        if engine.session_id() != self.id {
            return Err(Error::ForeignEngine);
        }
        if self.engine.is_some() {
            return Err(Error::AlreadyActive);
        }
        engine.drain_commands();
        engine.settle_sequences();
        self.engine = Some(engine);
        tracing::debug!("Session '{}' engine deactivated", self.name);
        Ok(())
    }

    /// Whether the engine is currently handed out.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.engine.is_none()
    }

    // --- Transport ---

    pub fn start(&mut self) -> Result<()> {
        self.dispatch(SessionCommand::Go(true))
    }

    /// Stops playback and rewinds every sequence to its first step.
    pub fn stop(&mut self) -> Result<()> {
        self.dispatch(SessionCommand::Go(false))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.shared.playing.get()
    }

    pub fn set_bpm(&mut self, bpm: f32) -> Result<()> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(Error::InvalidTempo(bpm));
        }
        self.dispatch(SessionCommand::SetBpm(bpm))
    }

    /// Tempo last applied by the engine.
    #[inline]
    pub fn bpm(&self) -> f32 {
        self.shared.bpm.get()
    }

    #[inline]
    pub fn frames_per_step(&self) -> u32 {
        self.shared.frames_per_step.get() as u32
    }

    // --- Ports ---

    pub fn register_outport(&mut self, name: &str) -> Result<OutPortId> {
        if self.outports.len() >= self.config.max_outports {
            return Err(Error::CapacityExceeded {
                what: "output ports",
                max: self.config.max_outports,
            });
        }
        self.ensure_room()?;
        self.dispatch(SessionCommand::AddOutport)?;
        let id = OutPortId(self.outports.len());
        self.outports.push(truncate_name(name));
        tracing::debug!("Registered output port {}: {}", id.index(), name);
        Ok(id)
    }

    pub fn register_inport(&mut self, name: &str) -> Result<InPortId> {
        if self.inports.len() >= self.config.max_inports {
            return Err(Error::CapacityExceeded {
                what: "input ports",
                max: self.config.max_inports,
            });
        }
        self.ensure_room()?;
        self.dispatch(SessionCommand::AddInport(InPort::new(InPortKind::None)))?;
        let id = InPortId(self.inports.len());
        self.inports.push(InPortInfo {
            name: truncate_name(name),
            kind: InPortKind::None,
            targets: Vec::with_capacity(MAX_INPORT_SEQUENCES),
        });
        tracing::debug!("Registered input port {}: {}", id.index(), name);
        Ok(id)
    }

    pub fn set_inport_kind(&mut self, port: InPortId, kind: InPortKind) -> Result<()> {
        self.inport_info(port)?;
        self.dispatch(SessionCommand::SetInportKind(port, kind))?;
        self.inports[port.index()].kind = kind;
        Ok(())
    }

    /// Lets `port` drive `seq`. A port drives at most
    /// [`MAX_INPORT_SEQUENCES`] sequences.
    pub fn inport_add_sequence(&mut self, port: InPortId, seq: SequenceId) -> Result<()> {
        let info = self.inport_info(port)?;
        if info.targets.contains(&seq) {
            return Ok(());
        }
        if info.targets.len() >= MAX_INPORT_SEQUENCES {
            return Err(Error::CapacityExceeded {
                what: "input port sequences",
                max: MAX_INPORT_SEQUENCES,
            });
        }
        if self.sequence(seq).is_none() {
            return Err(Error::UnknownSequence(format!("{seq:?}")));
        }
        self.dispatch(SessionCommand::InportAddSequence(port, seq))?;
        self.inports[port.index()].targets.push(seq);
        Ok(())
    }

    pub fn inport_remove_sequence(&mut self, port: InPortId, seq: SequenceId) -> Result<()> {
        self.inport_info(port)?;
        self.dispatch(SessionCommand::InportRemoveSequence(port, seq))?;
        self.inports[port.index()].targets.retain(|t| *t != seq);
        Ok(())
    }

    fn inport_info(&self, port: InPortId) -> Result<&InPortInfo> {
        self.inports
            .get(port.index())
            .ok_or_else(|| Error::UnknownPort(format!("input #{}", port.index())))
    }

    pub fn outport_by_name(&self, name: &str) -> Option<OutPortId> {
        self.outports.iter().position(|n| n == name).map(OutPortId)
    }

    pub fn inport_by_name(&self, name: &str) -> Option<InPortId> {
        self.inports.iter().position(|p| p.name == name).map(InPortId)
    }

    pub fn outport_name(&self, port: OutPortId) -> Option<&str> {
        self.outports.get(port.index()).map(String::as_str)
    }

    pub fn inport_name(&self, port: InPortId) -> Option<&str> {
        self.inports.get(port.index()).map(|p| p.name.as_str())
    }

    pub fn inport_kind(&self, port: InPortId) -> Option<InPortKind> {
        self.inports.get(port.index()).map(|p| p.kind)
    }

    pub fn outport_count(&self) -> usize {
        self.outports.len()
    }

    pub fn inport_count(&self) -> usize {
        self.inports.len()
    }

    // --- Sequences ---

    /// Takes ownership of `seq`. Its tick rate must match the session's.
    pub fn add_sequence(&mut self, mut seq: Sequence) -> Result<SequenceId> {
        if seq.tps() != self.config.tps {
            return Err(Error::TickRateMismatch {
                session: self.config.tps,
                sequence: seq.tps(),
            });
        }
        if self.sequences.len() + self.removing.len() >= self.config.max_sequences {
            return Err(Error::CapacityExceeded {
                what: "sequences",
                max: self.config.max_sequences,
            });
        }
        self.ensure_room()?;
        if let Some(port) = seq.outport() {
            if port.index() >= self.outports.len() {
                tracing::warn!(
                    "Sequence '{}' routed to unknown output port {}, unrouting",
                    seq.name(),
                    port.index()
                );
                seq.set_outport(None)?;
            }
        }

        let id = seq.id();
        let steps = seq.triggers().to_vec();
        let (name, engine, sender, state) = seq.into_parts();
        tracing::debug!("Adding sequence '{}' ({:?})", name, id);
        self.dispatch(SessionCommand::AddSequence(engine))?;
        self.sequences
            .push(SequenceHandle::new(id, name, sender, state, steps));
        Ok(id)
    }

    /// Detaches a sequence. It becomes available from [`reclaim`](Self::reclaim)
    /// once the engine has let go of it.
    pub fn remove_sequence(&mut self, id: SequenceId) -> Result<()> {
        let pos = self
            .sequences
            .iter()
            .position(|h| h.id() == id)
            .ok_or_else(|| Error::UnknownSequence(format!("{id:?}")))?;
        self.ensure_room()?;
        self.dispatch(SessionCommand::RemoveSequence(id))?;
        let handle = self.sequences.remove(pos);
        for inport in self.inports.iter_mut() {
            inport.targets.retain(|t| *t != id);
        }
        self.removing.push(handle);
        Ok(())
    }

    /// Sequences the engine has released since the last call.
    pub fn reclaim(&mut self) -> Vec<Sequence> {
        let mut reclaimed = Vec::new();
        while let Ok(engine) = self.retired.try_recv() {
            let id = engine.id();
            let handle = if let Some(pos) = self.removing.iter().position(|h| h.id() == id) {
                self.removing.swap_remove(pos)
            } else if let Some(pos) = self.sequences.iter().position(|h| h.id() == id) {
                // the engine refused the add
                self.sequences.remove(pos)
            } else {
                tracing::error!("Retired sequence {:?} has no handle", id);
                continue;
            };
            let (name, sender, state) = handle.into_parts();
            let mut seq = Sequence::from_parts(name, engine, sender, state);
            seq.settle();
            reclaimed.push(seq);
        }
        reclaimed
    }

    /// Removals the engine has not confirmed yet.
    pub fn pending_removals(&self) -> usize {
        self.removing.len()
    }

    pub fn sequence(&self, id: SequenceId) -> Option<&SequenceHandle> {
        self.sequences.iter().find(|h| h.id() == id)
    }

    pub fn sequence_mut(&mut self, id: SequenceId) -> Option<SequenceMut<'_>> {
        let outports = self.outports.len();
        let handle = self.sequences.iter_mut().find(|h| h.id() == id)?;
        let engine = match self.engine.as_mut() {
            Some(engine) => Some(engine.sequence_mut(id)?),
            None => None,
        };
        Some(SequenceMut::new(handle, engine, outports))
    }

    pub fn sequence_by_name(&self, name: &str) -> Option<SequenceId> {
        self.sequences
            .iter()
            .find(|h| h.name() == name)
            .map(SequenceHandle::id)
    }

    pub fn sequences(&self) -> impl Iterator<Item = &SequenceHandle> {
        self.sequences.iter()
    }

    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    // --- Persistence ---

    /// Snapshot of the session.
    ///
    /// While the engine is active, triggers come from the control-side
    /// mirror and include queued edits, but scalar values (tempo, loop
    /// bounds, transpose and the like) are those applied by the last block
    /// processed. Process one block or deactivate first for a settled
    /// snapshot.
    pub fn to_record(&self) -> SessionRecord {
        let sequence_name = |id: &SequenceId| {
            self.sequence(*id).map(|h| h.name().to_string())
        };
        SessionRecord {
            name: self.name.clone(),
            bpm: self.bpm(),
            tps: self.config.tps,
            outports: self.outports.clone(),
            inports: self
                .inports
                .iter()
                .map(|p| InPortRecord {
                    name: p.name.clone(),
                    kind: p.kind,
                    sequences: p.targets.iter().filter_map(&sequence_name).collect(),
                })
                .collect(),
            sequences: self
                .sequences
                .iter()
                .map(|h| {
                    let outport = h
                        .state()
                        .outport()
                        .and_then(|p| self.outport_name(p))
                        .map(str::to_string);
                    SequenceRecord::capture(h.name(), h.state(), h.triggers(), outport)
                })
                .collect(),
        }
    }

    /// Builds an inactive session from a record. `config.tps` is replaced by
    /// the record's tick rate.
    pub fn from_record(record: &SessionRecord, config: SessionConfig) -> Result<Self> {
        let config = SessionConfig {
            tps: record.tps,
            ..config
        };
        let mut session = Session::with_bpm(&record.name, config, record.bpm)?;

        for name in &record.outports {
            session.register_outport(name)?;
        }
        for seq_record in &record.sequences {
            let mut seq = Sequence::from_record(seq_record)?;
            if let Some(port_name) = &seq_record.outport {
                let port = session
                    .outport_by_name(port_name)
                    .ok_or_else(|| Error::UnknownPort(port_name.clone()))?;
                seq.set_outport(Some(port))?;
            }
            session.add_sequence(seq)?;
        }
        for inport_record in &record.inports {
            let port = session.register_inport(&inport_record.name)?;
            session.set_inport_kind(port, inport_record.kind)?;
            for seq_name in &inport_record.sequences {
                let seq = session
                    .sequence_by_name(seq_name)
                    .ok_or_else(|| Error::UnknownSequence(seq_name.clone()))?;
                session.inport_add_sequence(port, seq)?;
            }
        }
        Ok(session)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.to_record())?;
        std::fs::write(path.as_ref(), json)?;
        tracing::debug!("Saved session '{}' to {}", self.name, path.as_ref().display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>, config: SessionConfig) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let record: SessionRecord = serde_json::from_str(&json)?;
        Self::from_record(&record, config)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .field("bpm", &self.bpm())
            .field("sequences", &self.sequences.len())
            .field("outports", &self.outports)
            .finish()
    }
}

//! Real-time half of a session.

use super::SessionCommand;
use crate::config::SessionConfig;
use crate::control::ControlReceiver;
use crate::lockfree::{AtomicFlag, AtomicFloat, AtomicInt};
use crate::offheap::NoteOffScheduler;
use crate::port::{map_input_note, InPort, InPortId, InPortKind};
use crate::sequence::{SequenceEngine, SequenceId, StepWindow};
use crossbeam_channel::Sender;
use sequoia_midi::midi_msg::{Channel, ChannelVoiceMsg, MidiMsg};
use sequoia_midi::{EventBatch, MidiPortBuffers};
use std::sync::Arc;

/// Session values published by whoever holds the engine.
#[derive(Debug)]
pub(crate) struct SessionShared {
    pub(crate) bpm: AtomicFloat,
    pub(crate) playing: AtomicFlag,
    pub(crate) frames_per_step: AtomicInt,
}

/// The per-callback scheduler.
///
/// Obtained from [`Session::activate`](super::Session::activate) and driven
/// by the audio thread through [`process`](Self::process). Nothing in here
/// allocates, locks or blocks after construction.
pub struct SessionEngine {
    session_id: u64,
    config: SessionConfig,
    bpm: f32,
    fps: u32,
    frame: u32,
    go: bool,
    sequences: Vec<Box<SequenceEngine>>,
    outports: usize,
    inports: Vec<InPort>,
    commands: ControlReceiver<SessionCommand>,
    retired: Sender<Box<SequenceEngine>>,
    offs: NoteOffScheduler,
    batch: EventBatch,
    shared: Arc<SessionShared>,
}

impl SessionEngine {
    pub(crate) fn new(
        session_id: u64,
        config: SessionConfig,
        bpm: f32,
        commands: ControlReceiver<SessionCommand>,
        retired: Sender<Box<SequenceEngine>>,
        shared: Arc<SessionShared>,
    ) -> Self {
        let fps = config.frames_per_step(bpm);
        shared.bpm.set(bpm);
        shared.frames_per_step.set(fps as i32);
        Self {
            session_id,
            config,
            bpm,
            fps,
            frame: 0,
            go: false,
            sequences: Vec::with_capacity(config.max_sequences),
            outports: 0,
            inports: Vec::with_capacity(config.max_inports),
            commands,
            retired,
            offs: NoteOffScheduler::new(
                config.note_off_horizon(),
                config.max_block_frames,
                config.max_note_offs,
            ),
            batch: EventBatch::with_capacity(config.event_capacity),
            shared,
        }
    }

    #[inline]
    pub(crate) fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Renders one block of `nframes` into `ports`.
    pub fn process<P: MidiPortBuffers + ?Sized>(&mut self, nframes: u32, ports: &mut P) {
        self.drain_commands();
        self.settle_sequences();
        self.serve_inports(ports);

        for port in 0..self.outports {
            ports.clear_output(port);
        }
        if nframes as usize > self.config.max_block_frames {
            tracing::error!(
                "Block of {} frames exceeds configured maximum {}",
                nframes,
                self.config.max_block_frames
            );
            return;
        }

        // note-offs already due go first, so a retrigger on the same frame
        // is not cut by its predecessor's release
        self.batch.clear();
        self.offs.begin_block(nframes, &mut self.batch);
        if self.go {
            self.schedule(nframes);
        }
        self.offs.end_block();
        self.batch.sort();

        for event in self.batch.iter() {
            if !ports.write_output(event.port, event.frame_offset, event.bytes()) {
                tracing::warn!(
                    "Output port {} rejected event at frame {}",
                    event.port,
                    event.frame_offset
                );
            }
        }
    }

    /// Walks the block in slices that never cross a step boundary.
    fn schedule(&mut self, nframes: u32) {
        let mut offset = 0;
        while offset < nframes {
            let len = (self.fps - self.frame).min(nframes - offset);
            let window = StepWindow {
                fps: self.fps,
                start: self.frame,
                len,
                offset,
            };
            for seq in self.sequences.iter_mut() {
                seq.process(window, &mut self.batch, &mut self.offs);
            }
            self.frame += len;
            offset += len;
            if self.frame >= self.fps {
                self.frame = 0;
                for seq in self.sequences.iter_mut() {
                    seq.step();
                }
            }
        }
    }

    fn serve_inports<P: MidiPortBuffers + ?Sized>(&mut self, ports: &P) {
        for (index, inport) in self.inports.iter().enumerate() {
            if inport.kind == InPortKind::None || inport.targets.is_empty() {
                continue;
            }
            for raw in ports.input_events(index) {
                let note = match raw.to_midi_msg() {
                    Ok(MidiMsg::ChannelVoice {
                        channel: Channel::Ch1,
                        msg: ChannelVoiceMsg::NoteOn { note, .. },
                    }) => note,
                    _ => continue,
                };
                for target in &inport.targets {
                    let Some(seq) = self.sequences.iter_mut().find(|s| s.id() == *target) else {
                        continue;
                    };
                    if let Some(action) = map_input_note(inport.kind, note, seq.nsteps()) {
                        seq.apply_input(action);
                    }
                }
            }
        }
    }

    pub(crate) fn drain_commands(&mut self) {
        while let Some(cmd) = self.commands.pop() {
            self.apply(cmd);
        }
    }

    pub(crate) fn apply(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Go(go) => self.set_go_now(go),
            SessionCommand::SetBpm(bpm) => self.set_bpm_now(bpm),
            SessionCommand::AddSequence(seq) => self.add_sequence_now(seq),
            SessionCommand::RemoveSequence(id) => self.remove_sequence_now(id),
            SessionCommand::AddOutport => {
                if self.outports < self.config.max_outports {
                    self.outports += 1;
                } else {
                    tracing::error!("Output port table full");
                }
            }
            SessionCommand::AddInport(inport) => {
                if self.inports.len() < self.config.max_inports {
                    self.inports.push(inport);
                } else {
                    tracing::error!("Input port table full");
                }
            }
            SessionCommand::SetInportKind(id, kind) => match self.inports.get_mut(id.index()) {
                Some(inport) => inport.kind = kind,
                None => tracing::error!("Unknown input port {}", id.index()),
            },
            SessionCommand::InportAddSequence(id, seq) => {
                if let Some(inport) = self.inport_mut(id) {
                    inport.add_target(seq);
                }
            }
            SessionCommand::InportRemoveSequence(id, seq) => {
                if let Some(inport) = self.inport_mut(id) {
                    inport.remove_target(seq);
                }
            }
        }
    }

    fn inport_mut(&mut self, id: InPortId) -> Option<&mut InPort> {
        let inport = self.inports.get_mut(id.index());
        if inport.is_none() {
            tracing::error!("Unknown input port {}", id.index());
        }
        inport
    }

    fn set_go_now(&mut self, go: bool) {
        if !go {
            self.frame = 0;
            for seq in self.sequences.iter_mut() {
                seq.reset();
            }
        }
        self.go = go;
        self.shared.playing.set(go);
    }

    fn set_bpm_now(&mut self, bpm: f32) {
        if !(bpm.is_finite() && bpm > 0.0) {
            tracing::warn!("Ignoring invalid tempo {}", bpm);
            return;
        }
        self.bpm = bpm;
        self.fps = self.config.frames_per_step(bpm);
        if self.frame >= self.fps {
            self.frame = 0;
        }
        self.shared.bpm.set(bpm);
        self.shared.frames_per_step.set(self.fps as i32);
    }

    fn add_sequence_now(&mut self, seq: Box<SequenceEngine>) {
        if self.sequences.len() >= self.config.max_sequences {
            tracing::error!("Sequence table full, returning {:?}", seq.id());
            self.retire(seq);
            return;
        }
        if let Some(port) = seq.outport() {
            if port.index() >= self.outports {
                tracing::warn!("Sequence {:?} routed to unknown output port", seq.id());
            }
        }
        self.sequences.push(seq);
    }

    fn remove_sequence_now(&mut self, id: SequenceId) {
        let Some(pos) = self.sequences.iter().position(|s| s.id() == id) else {
            tracing::error!("Remove of unknown sequence {:?}", id);
            return;
        };
        for inport in self.inports.iter_mut() {
            inport.remove_target(id);
        }
        let mut seq = self.sequences.remove(pos);
        seq.drain_commands();
        self.retire(seq);
    }

    fn retire(&mut self, seq: Box<SequenceEngine>) {
        if let Err(e) = self.retired.try_send(seq) {
            tracing::error!("Retire queue rejected {:?}", e.into_inner().id());
        }
    }

    pub(crate) fn sequence_mut(&mut self, id: SequenceId) -> Option<&mut SequenceEngine> {
        self.sequences
            .iter_mut()
            .find(|s| s.id() == id)
            .map(|s| s.as_mut())
    }

    /// Applies anything still queued on each sequence, playing or not.
    pub(crate) fn settle_sequences(&mut self) {
        for seq in self.sequences.iter_mut() {
            seq.drain_commands();
        }
    }

    #[inline]
    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    #[inline]
    pub fn frames_per_step(&self) -> u32 {
        self.fps
    }

    /// Frame within the current step.
    #[inline]
    pub fn frame(&self) -> u32 {
        self.frame
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.go
    }

    #[inline]
    pub fn sequence_count(&self) -> usize {
        self.sequences.len()
    }

    #[inline]
    pub fn pending_note_offs(&self) -> usize {
        self.offs.pending()
    }

    /// Events dropped because the per-block batch was full.
    #[inline]
    pub fn dropped_events(&self) -> usize {
        self.batch.dropped()
    }
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("bpm", &self.bpm)
            .field("fps", &self.fps)
            .field("frame", &self.frame)
            .field("go", &self.go)
            .field("sequences", &self.sequences.len())
            .finish()
    }
}

//! RT-safe MIDI event types with sample-accurate timing.

use midi_msg::{MidiMsg, ParseError};

/// Status byte base for note-off on channel 1.
pub const NOTE_OFF: u8 = 0x80;
/// Status byte base for note-on on channel 1.
pub const NOTE_ON: u8 = 0x90;
/// Status byte base for control change on channel 1.
pub const CONTROL_CHANGE: u8 = 0xB0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MidiEventKind {
    #[default]
    Null,
    NoteOn,
    NoteOff,
    ControlChange,
}

impl MidiEventKind {
    /// Status byte for this kind on channel 1, `None` for `Null`.
    #[inline]
    pub fn status_base(self) -> Option<u8> {
        match self {
            MidiEventKind::Null => None,
            MidiEventKind::NoteOn => Some(NOTE_ON),
            MidiEventKind::NoteOff => Some(NOTE_OFF),
            MidiEventKind::ControlChange => Some(CONTROL_CHANGE),
        }
    }
}

/// Scheduled MIDI event produced by the sequencer.
///
/// `frame_offset` is relative to the start of the block being rendered.
/// `length` is only meaningful for note-ons and holds the note duration in
/// frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MidiEvent {
    pub kind: MidiEventKind,
    /// Output port index.
    pub port: usize,
    pub frame_offset: u32,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
    pub length: u32,
}

impl MidiEvent {
    pub const NULL: MidiEvent = MidiEvent {
        kind: MidiEventKind::Null,
        port: 0,
        frame_offset: 0,
        status: 0,
        data1: 0,
        data2: 0,
        length: 0,
    };

    #[inline]
    fn status_for(base: u8, channel: u8) -> u8 {
        base + (channel.clamp(1, 16) - 1)
    }

    /// Channels are 1-based; out-of-range values are clamped into 1..=16.
    #[inline]
    pub fn note_on(
        port: usize,
        frame_offset: u32,
        channel: u8,
        note: u8,
        velocity: u8,
        length: u32,
    ) -> Self {
        Self {
            kind: MidiEventKind::NoteOn,
            port,
            frame_offset,
            status: Self::status_for(NOTE_ON, channel),
            data1: note.min(127),
            data2: velocity.min(127),
            length,
        }
    }

    #[inline]
    pub fn note_off(port: usize, frame_offset: u32, channel: u8, note: u8) -> Self {
        Self {
            kind: MidiEventKind::NoteOff,
            port,
            frame_offset,
            status: Self::status_for(NOTE_OFF, channel),
            data1: note.min(127),
            data2: 0,
            length: 0,
        }
    }

    #[inline]
    pub fn control_change(
        port: usize,
        frame_offset: u32,
        channel: u8,
        number: u8,
        value: u8,
    ) -> Self {
        Self {
            kind: MidiEventKind::ControlChange,
            port,
            frame_offset,
            status: Self::status_for(CONTROL_CHANGE, channel),
            data1: number.min(127),
            data2: value.min(127),
            length: 0,
        }
    }

    /// The note-off matching this note-on (same port, channel and note).
    #[inline]
    pub fn release(&self) -> Self {
        Self::note_off(self.port, self.frame_offset, self.channel(), self.data1)
    }

    #[inline]
    pub fn with_frame_offset(mut self, frame_offset: u32) -> Self {
        self.frame_offset = frame_offset;
        self
    }

    /// 1-based channel.
    #[inline]
    pub fn channel(&self) -> u8 {
        (self.status & 0x0F) + 1
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.kind == MidiEventKind::Null
    }

    #[inline]
    pub fn bytes(&self) -> [u8; 3] {
        [self.status, self.data1, self.data2]
    }

    pub fn to_midi_msg(&self) -> Result<MidiMsg, ParseError> {
        MidiMsg::from_midi(&self.bytes()).map(|(msg, _)| msg)
    }
}

impl Default for MidiEvent {
    fn default() -> Self {
        Self::NULL
    }
}

/// Raw 3-byte MIDI message as read from a backend input buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawMidiEvent {
    pub frame_offset: u32,
    pub data: [u8; 3],
    pub len: u8,
}

impl RawMidiEvent {
    /// Copies at most three bytes from `bytes`.
    pub fn new(frame_offset: u32, bytes: &[u8]) -> Self {
        let mut data = [0u8; 3];
        let len = bytes.len().min(3);
        data[..len].copy_from_slice(&bytes[..len]);
        Self {
            frame_offset,
            data,
            len: len as u8,
        }
    }

    #[inline]
    pub fn note_on(frame_offset: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(
            frame_offset,
            &[NOTE_ON + (channel.clamp(1, 16) - 1), note, velocity],
        )
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.data[0]
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn to_midi_msg(&self) -> Result<MidiMsg, ParseError> {
        MidiMsg::from_midi(self.bytes()).map(|(msg, _)| msg)
    }
}

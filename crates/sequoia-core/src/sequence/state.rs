//! Sequence values published by the audio thread for the control thread.

use crate::lockfree::{AtomicFlag, AtomicInt, Mailbox};
use crate::port::OutPortId;

#[derive(Debug, Default)]
struct Notifications {
    playhead: Mailbox,
    first: Mailbox,
    last: Mailbox,
    transpose: Mailbox,
    clockdivide: Mailbox,
    mute: Mailbox,
}

/// Read side of a sequence's parameters.
///
/// Every field has a single writer: the thread that currently owns the
/// sequence's engine state. Readers on any thread see the last applied value.
#[derive(Debug)]
pub struct SequenceState {
    nsteps: usize,
    tps: u32,
    playhead: AtomicInt,
    first: AtomicInt,
    last: AtomicInt,
    transpose: AtomicInt,
    clockdivide: AtomicInt,
    mute: AtomicFlag,
    outport: AtomicInt,
    notify: AtomicFlag,
    notifications: Notifications,
}

impl SequenceState {
    pub(crate) fn new(nsteps: usize, tps: u32) -> Self {
        Self {
            nsteps,
            tps,
            playhead: AtomicInt::new(0),
            first: AtomicInt::new(0),
            last: AtomicInt::new(nsteps as i32 - 1),
            transpose: AtomicInt::new(0),
            clockdivide: AtomicInt::new(1),
            mute: AtomicFlag::new(false),
            outport: AtomicInt::new(-1),
            notify: AtomicFlag::new(false),
            notifications: Notifications::default(),
        }
    }

    #[inline]
    pub fn nsteps(&self) -> usize {
        self.nsteps
    }

    #[inline]
    pub fn tps(&self) -> u32 {
        self.tps
    }

    #[inline]
    pub fn playhead(&self) -> i32 {
        self.playhead.get()
    }

    #[inline]
    pub fn first(&self) -> i32 {
        self.first.get()
    }

    #[inline]
    pub fn last(&self) -> i32 {
        self.last.get()
    }

    #[inline]
    pub fn transpose(&self) -> i32 {
        self.transpose.get()
    }

    #[inline]
    pub fn clockdivide(&self) -> i32 {
        self.clockdivide.get()
    }

    #[inline]
    pub fn mute(&self) -> bool {
        self.mute.get()
    }

    pub fn outport(&self) -> Option<OutPortId> {
        let raw = self.outport.get();
        (raw >= 0).then(|| OutPortId(raw as usize))
    }

    #[inline]
    pub fn notifications_enabled(&self) -> bool {
        self.notify.get()
    }

    /// Turns the change mailboxes on or off. Values changed while off are
    /// never posted.
    pub fn set_notifications(&self, enabled: bool) {
        self.notify.set(enabled);
    }

    pub fn read_new_playhead(&self) -> Option<i32> {
        self.notifications.playhead.take()
    }

    pub fn read_new_first(&self) -> Option<i32> {
        self.notifications.first.take()
    }

    pub fn read_new_last(&self) -> Option<i32> {
        self.notifications.last.take()
    }

    pub fn read_new_transpose(&self) -> Option<i32> {
        self.notifications.transpose.take()
    }

    pub fn read_new_clockdivide(&self) -> Option<i32> {
        self.notifications.clockdivide.take()
    }

    pub fn read_new_mute(&self) -> Option<bool> {
        self.notifications.mute.take().map(|v| v != 0)
    }

    pub(crate) fn publish_playhead(&self, value: usize) {
        self.playhead.set(value as i32);
        if self.notify.get() {
            self.notifications.playhead.post(value as i32);
        }
    }

    pub(crate) fn publish_first(&self, value: usize) {
        self.first.set(value as i32);
        if self.notify.get() {
            self.notifications.first.post(value as i32);
        }
    }

    pub(crate) fn publish_last(&self, value: usize) {
        self.last.set(value as i32);
        if self.notify.get() {
            self.notifications.last.post(value as i32);
        }
    }

    pub(crate) fn publish_transpose(&self, value: i32) {
        self.transpose.set(value);
        if self.notify.get() {
            self.notifications.transpose.post(value);
        }
    }

    pub(crate) fn publish_clockdivide(&self, value: i32) {
        self.clockdivide.set(value);
        if self.notify.get() {
            self.notifications.clockdivide.post(value);
        }
    }

    pub(crate) fn publish_mute(&self, value: bool) {
        self.mute.set(value);
        if self.notify.get() {
            self.notifications.mute.post(value as i32);
        }
    }

    pub(crate) fn publish_outport(&self, port: Option<OutPortId>) {
        self.outport.set(port.map_or(-1, |p| p.0 as i32));
    }
}

//! Lock-free primitives shared between the control and audio threads.

use atomic_float::AtomicF32;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Cache-line aligned atomic f32.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFloat {
    value: AtomicF32,
}

impl AtomicFloat {
    pub fn new(value: f32) -> Self {
        Self {
            value: AtomicF32::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.value.store(value, Ordering::Release);
    }
}

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Cache-line aligned atomic i32.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicInt {
    value: AtomicI32,
}

impl AtomicInt {
    pub fn new(value: i32) -> Self {
        Self {
            value: AtomicI32::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> i32 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: i32) {
        self.value.store(value, Ordering::Release);
    }
}

impl Default for AtomicInt {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Single-value mailbox written by the audio thread and polled by the
/// control thread. The latest value wins.
#[derive(Debug, Default)]
pub struct Mailbox {
    value: AtomicInt,
    fresh: AtomicFlag,
}

impl Mailbox {
    /// Stores the value before raising the flag, so a reader that sees the
    /// flag also sees this value or a newer one.
    #[inline]
    pub fn post(&self, value: i32) {
        self.value.set(value);
        self.fresh.set(true);
    }

    /// Returns the posted value once, clearing the flag.
    #[inline]
    pub fn take(&self) -> Option<i32> {
        if self.fresh.swap(false) {
            Some(self.value.get())
        } else {
            None
        }
    }
}

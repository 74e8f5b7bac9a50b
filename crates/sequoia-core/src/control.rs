//! Lock-free control queue from the control thread into the audio thread.
//!
//! A bounded SPSC ring. Sending never blocks: a full queue drops the message
//! and reports it. Draining applies messages in FIFO order.

use crate::{Error, Result};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

/// Producer half, owned by the control thread.
pub struct ControlSender<T> {
    producer: HeapProd<T>,
    label: &'static str,
}

impl<T> ControlSender<T> {
    /// Enqueue a message for the audio thread.
    pub fn send(&mut self, msg: T) -> Result<()> {
        if self.producer.try_push(msg).is_err() {
            tracing::warn!("{} control queue full, message dropped", self.label);
            return Err(Error::QueueFull(self.label));
        }
        Ok(())
    }

    /// Whether the next `send` will succeed. Only the consumer can change the
    /// answer, and only from `false` to `true`.
    #[inline]
    pub fn has_room(&self) -> bool {
        !self.producer.is_full()
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.producer.occupied_len()
    }
}

/// Consumer half, owned by whichever side holds the target state.
pub struct ControlReceiver<T> {
    consumer: HeapCons<T>,
}

impl<T> ControlReceiver<T> {
    /// Pops every queued message in order and hands it to `apply`.
    #[inline]
    pub fn drain(&mut self, mut apply: impl FnMut(T)) -> usize {
        let mut count = 0;
        while let Some(msg) = self.consumer.try_pop() {
            apply(msg);
            count += 1;
        }
        count
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.consumer.try_pop()
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.consumer.is_empty()
    }
}

/// Create a control queue holding at most `capacity` messages.
pub fn control_channel<T>(
    label: &'static str,
    capacity: usize,
) -> (ControlSender<T>, ControlReceiver<T>) {
    let rb = HeapRb::new(capacity);
    let (producer, consumer) = rb.split();
    (
        ControlSender { producer, label },
        ControlReceiver { consumer },
    )
}

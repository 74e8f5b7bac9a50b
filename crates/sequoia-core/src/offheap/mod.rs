//! Allocation-free deferred note-offs.

mod pool;
mod scheduler;

pub use pool::{NodeId, OffHeap, OffNode};
pub use scheduler::NoteOffScheduler;

//! Live list synchronization: the subscription owner and its state slot.

mod adapter;
mod state;

pub use adapter::{StartOutcome, SyncAdapter, SyncEvent};
pub use state::{Sections, SlotClosed, StateView};

use std::sync::Arc;

use tokio::sync::watch;

use crate::model::section::{self, Section};
use crate::model::{Item, ItemId};

/// Latest grouped list state as published by the sync adapter.
pub type Sections = Arc<Vec<Section>>;

/// Read-only, continuously updated view of the adapter's state slot.
///
/// Readers always observe a whole published value; intermediate values may
/// be skipped when several snapshots land between two reads.
#[derive(Debug, Clone)]
pub struct StateView {
    rx: watch::Receiver<Sections>,
}

/// The adapter that owns the slot has been dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("state slot owner dropped")]
pub struct SlotClosed;

impl StateView {
    pub(crate) const fn new(rx: watch::Receiver<Sections>) -> Self {
        Self { rx }
    }

    /// Current value, marking it seen.
    #[must_use]
    pub fn current(&mut self) -> Sections {
        self.rx.borrow_and_update().clone()
    }

    /// Current value without touching change tracking.
    #[must_use]
    pub fn peek(&self) -> Sections {
        self.rx.borrow().clone()
    }

    /// Wait until a value newer than the last one seen is published.
    pub async fn changed(&mut self) -> Result<Sections, SlotClosed> {
        self.rx.changed().await.map_err(|_| SlotClosed)?;
        Ok(self.current())
    }

    /// Wait until the published state satisfies `predicate`, checking the
    /// current value first.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&[Section]) -> bool,
    ) -> Result<Sections, SlotClosed> {
        let value = self
            .rx
            .wait_for(|sections| predicate(sections))
            .await
            .map_err(|_| SlotClosed)?;
        Ok(value.clone())
    }

    /// Copy of one item from the current state.
    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<Item> {
        section::find(&self.rx.borrow(), id).cloned()
    }

    /// Number of items across all sections of the current state.
    #[must_use]
    pub fn item_count(&self) -> usize {
        section::item_count(&self.rx.borrow())
    }
}

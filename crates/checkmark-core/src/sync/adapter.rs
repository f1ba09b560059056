//! Owner of the single live subscription to the signed-in user's items.
//!
//! # Single writer
//!
//! The state slot is a `watch` channel. Every write to it happens while the
//! listener lock is held and only after checking that the writer's
//! generation is still the live one. `stop_listening` takes the same lock to
//! retire the generation, so once it returns no delivery from the retired
//! subscription can reach the slot, even one that was already in flight.
//!
//! # Lifecycle
//!
//! ```text
//! start_listening ──► reserve generation ──► DocumentStore::listen
//!                                                  │
//!                              spawn pump ◄────────┘
//!                                  │ first snapshot decoded
//!                                  ▼
//!                  publish ──► StartOutcome::Started
//! ```
//!
//! A failed subscription is not retried. It stays registered, so the
//! caller stops and restarts it explicitly.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::state::{Sections, StateView};
use crate::backend::{AuthProvider, DocumentStore, LiveQuery, Snapshot, SnapshotStream};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::model::Item;
use crate::model::section::{self, Section};

/// Result of a `start_listening` call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new subscription delivered and published its first snapshot.
    Started,
    /// A subscription was already registered; nothing changed.
    AlreadyListening,
    /// Nobody is signed in; nothing was opened.
    NoUser,
    /// The subscription was stopped before its first snapshot arrived.
    Cancelled,
}

/// Notifications published alongside the state slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Started { generation: u64, items: usize },
    Stopped { generation: u64 },
    Failed { generation: u64, error: SyncError },
}

struct Registration {
    generation: u64,
    pump: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct ListenerSlot {
    next_generation: u64,
    active: Option<Registration>,
}

impl ListenerSlot {
    fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|reg| reg.generation == generation)
    }
}

struct Shared {
    listener: Mutex<ListenerSlot>,
    state: watch::Sender<Sections>,
    events: broadcast::Sender<SyncEvent>,
    header: String,
}

impl Shared {
    /// Replace the slot value if `generation` is still live.
    fn publish(&self, generation: u64, sections: Vec<Section>) -> bool {
        let slot = self.listener.lock();
        if !slot.is_current(generation) {
            debug!(generation, "discarding snapshot from retired subscription");
            return false;
        }
        let items = section::item_count(&sections);
        self.state.send_replace(Arc::new(sections));
        drop(slot);
        debug!(generation, items, "published snapshot");
        true
    }

    /// Report a failure of a live generation, optionally clearing the slot.
    fn fail(&self, generation: u64, error: SyncError, clear: bool) -> bool {
        let slot = self.listener.lock();
        if !slot.is_current(generation) {
            return false;
        }
        if clear {
            self.state.send_replace(Arc::new(Vec::new()));
        }
        drop(slot);
        warn!(generation, code = %error.code(), %error, "subscription failure");
        self.emit(SyncEvent::Failed { generation, error });
        true
    }

    /// Drop the registration of `generation` if it is still the live one.
    fn release(&self, generation: u64) {
        let mut slot = self.listener.lock();
        if slot.is_current(generation) {
            slot.active = None;
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No receivers is fine; the state slot is the primary output.
        let _ = self.events.send(event);
    }
}

/// Keeps at most one live query open and mirrors it into a state slot.
pub struct SyncAdapter {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn DocumentStore>,
    config: SyncConfig,
    shared: Arc<Shared>,
}

impl SyncAdapter {
    #[must_use]
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        config: SyncConfig,
    ) -> Self {
        let (state, _) = watch::channel(Arc::new(Vec::new()));
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let shared = Arc::new(Shared {
            listener: Mutex::new(ListenerSlot::default()),
            state,
            events,
            header: config.default_section_header.clone(),
        });
        Self {
            auth,
            store,
            config,
            shared,
        }
    }

    /// Open the live query for the signed-in user and wait for its first
    /// snapshot.
    ///
    /// Idempotent: while a subscription is registered, further calls return
    /// [`StartOutcome::AlreadyListening`] and leave it untouched. Without a
    /// signed-in user the call is a no-op returning [`StartOutcome::NoUser`].
    ///
    /// # Errors
    ///
    /// Fails when the query cannot be opened, when the first delivery is a
    /// listener error or an undecodable snapshot, or when the stream ends
    /// before delivering anything. The same failure is also published as
    /// [`SyncEvent::Failed`].
    pub async fn start_listening(&self) -> Result<StartOutcome, SyncError> {
        let Some(user) = self.auth.current_user_id() else {
            debug!("start_listening without a signed-in user");
            return Ok(StartOutcome::NoUser);
        };

        let generation = {
            let mut slot = self.shared.listener.lock();
            if slot.active.is_some() {
                return Ok(StartOutcome::AlreadyListening);
            }
            slot.next_generation += 1;
            let generation = slot.next_generation;
            slot.active = Some(Registration {
                generation,
                pump: None,
            });
            generation
        };

        // Released again if this future is dropped before a pump owns the slot.
        let mut reservation = Reservation {
            shared: &self.shared,
            generation,
            armed: true,
        };

        let query = LiveQuery::ordered(
            self.config.collection_for(&user),
            self.config.order_field.clone(),
        );
        info!(generation, path = %query.path, order_by = %query.order_by, "opening live query");

        let stream = match self.store.listen(query).await {
            Ok(stream) => stream,
            Err(err) => {
                let error = SyncError::from(err);
                self.shared.fail(generation, error.clone(), true);
                return Err(error);
            }
        };

        let (first_tx, first_rx) = oneshot::channel();
        {
            let mut slot = self.shared.listener.lock();
            match slot.active.as_mut() {
                Some(reg) if reg.generation == generation => {
                    let shared = Arc::clone(&self.shared);
                    reg.pump = Some(tokio::spawn(pump(shared, generation, stream, first_tx)));
                    reservation.armed = false;
                }
                _ => {
                    debug!(generation, "stopped while opening; dropping live query");
                    return Ok(StartOutcome::Cancelled);
                }
            }
        }

        match first_rx.await {
            Ok(Ok(items)) => {
                self.shared.emit(SyncEvent::Started { generation, items });
                Ok(StartOutcome::Started)
            }
            Ok(Err(error)) => Err(error),
            Err(_) => Ok(StartOutcome::Cancelled),
        }
    }

    /// Cancel the registered subscription, if any. Safe to call repeatedly.
    ///
    /// The state slot keeps its last value. Returns whether a subscription
    /// was registered.
    pub fn stop_listening(&self) -> bool {
        let registration = self.shared.listener.lock().active.take();
        let Some(reg) = registration else {
            return false;
        };
        if let Some(pump) = reg.pump {
            pump.abort();
        }
        info!(generation = reg.generation, "stopped live query");
        self.shared.emit(SyncEvent::Stopped {
            generation: reg.generation,
        });
        true
    }

    /// Reset the state slot to an empty list. Used when the user signs out.
    pub fn clear(&self) {
        let _slot = self.shared.listener.lock();
        self.shared.state.send_replace(Arc::new(Vec::new()));
    }

    /// Whether a subscription is currently registered.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.shared.listener.lock().active.is_some()
    }

    /// Read-only view of the grouped list state. Starts out empty.
    #[must_use]
    pub fn current_state(&self) -> StateView {
        StateView::new(self.shared.state.subscribe())
    }

    /// Subscribe to lifecycle and failure notifications.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }
}

/// A reserved generation with no pump yet.
struct Reservation<'a> {
    shared: &'a Shared,
    generation: u64,
    armed: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(generation = self.generation, "releasing unfinished start");
            self.shared.release(self.generation);
        }
    }
}

impl Drop for SyncAdapter {
    fn drop(&mut self) {
        if let Some(pump) = self.shared.listener.lock().active.take().and_then(|reg| reg.pump) {
            pump.abort();
        }
    }
}

/// Drive one live query until it fails, ends, or is aborted.
async fn pump(
    shared: Arc<Shared>,
    generation: u64,
    mut stream: SnapshotStream,
    first: oneshot::Sender<Result<usize, SyncError>>,
) {
    let mut first = Some(first);

    while let Some(delivery) = stream.next().await {
        match delivery {
            Ok(snapshot) => match decode(&snapshot, &shared.header) {
                Ok(sections) => {
                    let items = section::item_count(&sections);
                    if !shared.publish(generation, sections) {
                        return;
                    }
                    if let Some(tx) = first.take() {
                        let _ = tx.send(Ok(items));
                    }
                }
                Err(error) => {
                    // Previous state stays visible; later snapshots may decode.
                    if !shared.fail(generation, error.clone(), false) {
                        return;
                    }
                    if let Some(tx) = first.take() {
                        let _ = tx.send(Err(error));
                    }
                }
            },
            Err(err) => {
                let error = SyncError::from(err);
                shared.fail(generation, error.clone(), true);
                if let Some(tx) = first.take() {
                    let _ = tx.send(Err(error));
                }
                return;
            }
        }
    }

    debug!(generation, "live query stream ended");
    shared.fail(generation, SyncError::Closed, true);
    if let Some(tx) = first.take() {
        let _ = tx.send(Err(SyncError::Closed));
    }
}

fn decode(snapshot: &Snapshot, header: &str) -> Result<Vec<Section>, SyncError> {
    let items = snapshot
        .documents
        .iter()
        .map(Item::from_document)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(section::group(items, header))
}

//! In-memory document store with live queries and fault injection.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use checkmark_core::backend::{
    CollectionPath, Document, DocumentStore, Fields, LiveQuery, Snapshot, SnapshotStream,
    SortDirection, StoreError,
};
use futures::StreamExt;
use futures::channel::mpsc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::rng::DeterministicRng;

/// Fault injection configuration for the simulated service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultConfig {
    /// Seed for id assignment and fault decisions.
    pub seed: u64,
    /// Percentage of writes rejected with a transport error.
    pub write_failure_percent: u8,
    /// Delay before a write is applied and acknowledged.
    pub ack_delay_millis: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            write_failure_percent: 0,
            ack_delay_millis: 0,
        }
    }
}

type Delivery = Result<Snapshot, StoreError>;

struct Listener {
    query: LiveQuery,
    tx: mpsc::UnboundedSender<Delivery>,
}

struct Inner {
    collections: BTreeMap<CollectionPath, BTreeMap<String, Fields>>,
    listeners: Vec<Listener>,
    rng: DeterministicRng,
    fault: FaultConfig,
    forced_write_failures: u32,
    refuse_listen: Option<String>,
    acknowledged_writes: u64,
}

impl Inner {
    fn snapshot(&self, query: &LiveQuery) -> Snapshot {
        let Some(docs) = self.collections.get(&query.path) else {
            return Snapshot::default();
        };

        // Documents lacking the sort field are not part of the query.
        let mut documents: Vec<Document> = docs
            .iter()
            .filter(|(_, fields)| fields.contains_key(&query.order_by))
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect();

        documents.sort_by(|a, b| {
            let ord = compare_values(&a.fields[&query.order_by], &b.fields[&query.order_by])
                .then_with(|| a.id.cmp(&b.id));
            match query.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });

        Snapshot { documents }
    }

    fn notify(&mut self, path: &CollectionPath) {
        let mut listeners = std::mem::take(&mut self.listeners);
        listeners.retain(|listener| {
            if listener.tx.is_closed() {
                return false;
            }
            if &listener.query.path != path {
                return true;
            }
            let snapshot = self.snapshot(&listener.query);
            trace!(%path, documents = snapshot.len(), "delivering snapshot");
            listener.tx.unbounded_send(Ok(snapshot)).is_ok()
        });
        self.listeners = listeners;
    }

    /// Decide whether the next write fails, consuming a forced failure first.
    fn take_write_fault(&mut self) -> bool {
        if self.forced_write_failures > 0 {
            self.forced_write_failures -= 1;
            return true;
        }
        self.rng.chance(self.fault.write_failure_percent)
    }
}

/// Deterministic stand-in for the managed document database.
///
/// Each write notifies every live query on the written collection with a
/// full, freshly ordered snapshot. Dropping a returned stream removes its
/// listener.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(fault: FaultConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                collections: BTreeMap::new(),
                listeners: Vec::new(),
                rng: DeterministicRng::new(fault.seed),
                fault,
                forced_write_failures: 0,
                refuse_listen: None,
                acknowledged_writes: 0,
            }),
        }
    }

    /// Reject the next `count` writes with a transport error.
    pub fn fail_next_writes(&self, count: u32) {
        self.inner.lock().forced_write_failures = count;
    }

    /// Make the next `listen` call fail.
    pub fn refuse_next_listen(&self, reason: impl Into<String>) {
        self.inner.lock().refuse_listen = Some(reason.into());
    }

    /// Terminate every live query on `path` with a listener error.
    pub fn break_listeners(&self, path: &CollectionPath, reason: &str) {
        let mut inner = self.inner.lock();
        inner.listeners.retain(|listener| {
            if &listener.query.path != path {
                return true;
            }
            let _ = listener
                .tx
                .unbounded_send(Err(StoreError::Listener(reason.to_string())));
            false
        });
        debug!(%path, reason, "broke live queries");
    }

    /// Store raw fields under a chosen id, bypassing validation, and notify.
    pub fn insert_raw(&self, path: &CollectionPath, id: &str, fields: Fields) {
        let mut inner = self.inner.lock();
        inner
            .collections
            .entry(path.clone())
            .or_default()
            .insert(id.to_string(), fields);
        inner.notify(path);
    }

    /// Current documents of a collection in id order.
    #[must_use]
    pub fn documents(&self, path: &CollectionPath) -> Vec<Document> {
        self.inner
            .lock()
            .collections
            .get(path)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of live queries whose stream is still held by a consumer.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.listeners.retain(|listener| !listener.tx.is_closed());
        inner.listeners.len()
    }

    /// Number of writes applied and acknowledged so far.
    #[must_use]
    pub fn acknowledged_writes(&self) -> u64 {
        self.inner.lock().acknowledged_writes
    }

    async fn ack_delay(&self) {
        let millis = self.inner.lock().fault.ack_delay_millis;
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }

    /// Run one write under the fault plan and notify listeners on success.
    fn write<T>(
        &self,
        path: &CollectionPath,
        op: &str,
        apply: impl FnOnce(&mut Inner) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut inner = self.inner.lock();
        if inner.take_write_fault() {
            debug!(%path, op, "injected write failure");
            return Err(StoreError::Transport(format!("injected {op} failure")));
        }
        let value = apply(&mut inner)?;
        inner.acknowledged_writes += 1;
        inner.notify(path);
        Ok(value)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(FaultConfig::default())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn listen(&self, query: LiveQuery) -> Result<SnapshotStream, StoreError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = inner.refuse_listen.take() {
            return Err(StoreError::Listener(reason));
        }

        let (tx, rx) = mpsc::unbounded();
        let initial = inner.snapshot(&query);
        debug!(path = %query.path, documents = initial.len(), "opened live query");
        let _ = tx.unbounded_send(Ok(initial));
        inner.listeners.push(Listener { query, tx });
        Ok(rx.boxed())
    }

    async fn create(&self, path: &CollectionPath, fields: Fields) -> Result<String, StoreError> {
        self.ack_delay().await;
        self.write(path, "create", |inner| {
            let id = inner.rng.document_id();
            inner
                .collections
                .entry(path.clone())
                .or_default()
                .insert(id.clone(), fields);
            Ok(id)
        })
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.ack_delay().await;
        self.write(path, "update", |inner| {
            let doc = inner
                .collections
                .get_mut(path)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| StoreError::NotFound {
                    path: path.clone(),
                    id: id.to_string(),
                })?;
            doc.extend(fields);
            Ok(())
        })
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError> {
        self.ack_delay().await;
        self.write(path, "delete", |inner| {
            if let Some(docs) = inner.collections.get_mut(path) {
                docs.remove(id);
            }
            Ok(())
        })
    }
}

/// Total order over JSON scalars: null < bool < number < string < other.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    const fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

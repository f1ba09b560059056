use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::error::ErrorCode;

/// Field map of a single document, keyed by wire name.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Slash-separated path of a remote collection, e.g. `users/u1/items`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Root collection holding one document per user.
    pub const DEFAULT_ROOT: &'static str = "users";
    /// Per-user sub-collection holding the items.
    pub const DEFAULT_SEGMENT: &'static str = "items";

    /// The item collection of `user` under the default layout.
    #[must_use]
    pub fn for_user(user: &UserId) -> Self {
        Self::with_layout(Self::DEFAULT_ROOT, user, Self::DEFAULT_SEGMENT)
    }

    /// The item collection of `user` under a custom `root/{uid}/segment` layout.
    #[must_use]
    pub fn with_layout(root: &str, user: &UserId, segment: &str) -> Self {
        Self(format!("{root}/{user}/{segment}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Direction of the live query's sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// A live query over one collection, ordered by a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveQuery {
    pub path: CollectionPath,
    pub order_by: String,
    pub direction: SortDirection,
}

impl LiveQuery {
    /// Ascending query on `order_by`.
    #[must_use]
    pub fn ordered(path: CollectionPath, order_by: impl Into<String>) -> Self {
        Self {
            path,
            order_by: order_by.into(),
            direction: SortDirection::Ascending,
        }
    }
}

/// One stored document as delivered by a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Point-in-time delivery of every document matching a live query, already
/// in query order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub documents: Vec<Document>,
}

impl Snapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Errors reported by a [`DocumentStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The request never got a successful acknowledgement.
    #[error("remote request failed: {0}")]
    Transport(String),

    /// The addressed document does not exist.
    #[error("document {id} not found in {path}")]
    NotFound { path: CollectionPath, id: String },

    /// The live query was terminated by the service.
    #[error("live query failed: {0}")]
    Listener(String),
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) => ErrorCode::TransportFailed,
            Self::NotFound { .. } => ErrorCode::ItemNotFound,
            Self::Listener(_) => ErrorCode::ListenerFailed,
        }
    }
}

/// Stream of snapshots for one live query. Dropping it removes the listener.
pub type SnapshotStream = BoxStream<'static, Result<Snapshot, StoreError>>;

/// Managed document database capability.
///
/// Every write completes only once the service has acknowledged it. Reads
/// happen exclusively through [`DocumentStore::listen`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a live query. The first item of the stream is the current result
    /// set; every later item follows a change to the collection.
    async fn listen(&self, query: LiveQuery) -> Result<SnapshotStream, StoreError>;

    /// Create a document with a service-assigned id and return that id.
    async fn create(&self, path: &CollectionPath, fields: Fields) -> Result<String, StoreError>;

    /// Merge `fields` into an existing document.
    async fn update(&self, path: &CollectionPath, id: &str, fields: Fields)
    -> Result<(), StoreError>;

    /// Remove a document.
    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError>;
}

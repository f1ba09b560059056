//! Collaborator seams for the managed backend.
//!
//! The authentication provider and the document database are supplied from
//! outside this crate. Everything here is a trait or a plain value type so
//! that hosts can plug in a real SDK binding and tests can plug in the
//! in-memory doubles from `checkmark-sim`.

mod auth;
mod store;

pub use auth::{AuthError, AuthProvider, UserId};
pub use store::{
    CollectionPath, Document, DocumentStore, Fields, LiveQuery, Snapshot, SnapshotStream,
    SortDirection, StoreError,
};

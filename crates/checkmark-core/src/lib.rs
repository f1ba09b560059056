//! checkmark-core library.
//!
//! Real-time to-do lists over a managed document database. The
//! [`sync::SyncAdapter`] keeps one live query per session and republishes
//! every snapshot as grouped [`model::Section`]s; the
//! [`mutation::MutationGateway`] writes changes and relies on that same
//! query to observe them; the [`coordinator::Coordinator`] wires both to a
//! list screen.
//!
//! # Conventions
//!
//! - **Errors**: Typed `thiserror` enums carrying an [`error::ErrorCode`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod account;
pub mod backend;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod mutation;
pub mod sync;

pub use coordinator::{Coordinator, ErrorStream, Intent};
pub use error::{ErrorCode, SyncError};

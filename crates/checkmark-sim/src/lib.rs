//! checkmark-sim library.
//!
//! Deterministic in-memory stand-ins for the authentication provider and the
//! managed document database, plus a scripted session runner that drives a
//! [`checkmark_core::Coordinator`] against them.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for return types.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod auth;
pub mod clock;
pub mod rng;
pub mod session;
pub mod store;

pub use auth::MemoryAuth;
pub use clock::{ClockConfig, SimulatedClock};
pub use rng::DeterministicRng;
pub use session::{Harness, SessionConfig, SessionReport, run_session};
pub use store::{FaultConfig, MemoryStore};

//! Scripted end-to-end session: sign up, activate, edit concurrently, and
//! check that the rendered state converges on what the store holds.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use checkmark_core::account::AccountForm;
use checkmark_core::backend::{CollectionPath, UserId};
use checkmark_core::config::ClientConfig;
use checkmark_core::model::section::Section;
use checkmark_core::model::Item;
use checkmark_core::sync::StartOutcome;
use checkmark_core::{Coordinator, Intent};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::MemoryAuth;
use crate::clock::SimulatedClock;
use crate::store::{FaultConfig, MemoryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub seed: u64,
    /// Items added in the first burst.
    pub items: usize,
    pub write_failure_percent: u8,
    pub ack_delay_millis: u64,
    /// How long to wait for the rendered state to match the store.
    pub settle_timeout_millis: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            items: 12,
            write_failure_percent: 0,
            ack_delay_millis: 1,
            settle_timeout_millis: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub user: String,
    pub intents_dispatched: usize,
    pub failed_intents: usize,
    pub visible_items: usize,
    pub stored_items: usize,
    pub checked_items: usize,
    pub converged: bool,
    pub listeners_after_teardown: usize,
}

/// Everything a session needs, exposed so tests can poke the doubles.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub auth: Arc<MemoryAuth>,
    pub clock: Arc<SimulatedClock>,
    pub coordinator: Coordinator,
}

impl Harness {
    #[must_use]
    pub fn new(fault: FaultConfig, auth: MemoryAuth) -> Self {
        let store = Arc::new(MemoryStore::new(fault));
        let auth = Arc::new(auth);
        let clock = Arc::new(SimulatedClock::default());
        let coordinator = Coordinator::new(
            auth.clone(),
            store.clone(),
            clock.clone(),
            &ClientConfig::default(),
        );
        Self {
            store,
            auth,
            clock,
            coordinator,
        }
    }

    /// Store-side view of one user's items keyed by id.
    #[must_use]
    pub fn stored_items(&self, user: &UserId) -> BTreeMap<String, (String, bool)> {
        self.store
            .documents(&CollectionPath::for_user(user))
            .iter()
            .filter_map(|doc| Item::from_document(doc).ok())
            .map(|item| (item.id.to_string(), (item.title, item.is_checked)))
            .collect()
    }
}

/// Rendered view of the items keyed by id, comparable to [`Harness::stored_items`].
#[must_use]
pub fn visible_items(sections: &[Section]) -> BTreeMap<String, (String, bool)> {
    sections
        .iter()
        .flat_map(|section| section.items.iter())
        .map(|item| {
            (
                item.id.to_string(),
                (item.title.clone(), item.is_checked),
            )
        })
        .collect()
}

pub async fn run_session(config: &SessionConfig) -> Result<SessionReport> {
    let harness = Harness::new(
        FaultConfig {
            seed: config.seed,
            write_failure_percent: config.write_failure_percent,
            ack_delay_millis: config.ack_delay_millis,
        },
        MemoryAuth::new(),
    );
    let coordinator = &harness.coordinator;
    let mut errors = coordinator
        .take_errors()
        .context("error stream already taken")?;

    let form = AccountForm::new(format!("sim-{:x}@checkmark.test", config.seed), "correct horse");
    let user = coordinator.create_account(&form).await?;

    let outcome = coordinator.activate().await?;
    if outcome != StartOutcome::Started {
        bail!("unexpected activation outcome {outcome:?}");
    }

    let mut dispatched = 0;
    let adds: Vec<_> = (0..config.items)
        .map(|i| {
            coordinator.dispatch(Intent::Add {
                title: format!("Item {i}"),
                description: String::new(),
            })
        })
        .collect();
    dispatched += adds.len();
    futures::future::join_all(adds).await;
    settle(&harness, &user, config).await;

    let current = coordinator.sections().peek();
    let mut edits = Vec::new();
    for (i, item) in current.iter().flat_map(|s| s.items.iter()).enumerate() {
        if i % 3 == 0 {
            edits.push(coordinator.dispatch(Intent::Delete(item.id.clone())));
        } else if i % 2 == 0 {
            edits.push(coordinator.dispatch(Intent::Toggle(item.clone())));
        }
    }
    dispatched += edits.len();
    futures::future::join_all(edits).await;
    let converged = settle(&harness, &user, config).await;

    let mut failed_intents = 0;
    while let Some(error) = errors.try_next() {
        warn!(code = %error.code(), %error, "intent failed during session");
        failed_intents += 1;
    }

    let sections = coordinator.sections().peek();
    let visible = visible_items(&sections);
    let stored = harness.stored_items(&user);

    coordinator.deactivate();
    let listeners_after_teardown = drain_listeners(&harness, config).await;
    let report = SessionReport {
        user: user.to_string(),
        intents_dispatched: dispatched,
        failed_intents,
        visible_items: visible.len(),
        stored_items: stored.len(),
        checked_items: visible.values().filter(|(_, checked)| *checked).count(),
        converged,
        listeners_after_teardown,
    };
    info!(?report, "session finished");
    Ok(report)
}

/// Aborted pumps drop their stream on a later scheduler pass.
async fn drain_listeners(harness: &Harness, config: &SessionConfig) -> usize {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(config.settle_timeout_millis);
    loop {
        let remaining = harness.store.listener_count();
        if remaining == 0 || tokio::time::Instant::now() >= deadline {
            return remaining;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Wait until the rendered items equal the stored ones.
async fn settle(harness: &Harness, user: &UserId, config: &SessionConfig) -> bool {
    let mut view = harness.coordinator.sections();
    let wait = view.wait_for(|sections| visible_items(sections) == harness.stored_items(user));
    matches!(
        tokio::time::timeout(Duration::from_millis(config.settle_timeout_millis), wait).await,
        Ok(Ok(_))
    )
}

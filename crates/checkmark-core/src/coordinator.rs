//! Glue between the list screen, the sync adapter and the mutation gateway.
//!
//! The coordinator starts the subscription when the screen activates and
//! stops it on teardown. User intents are forwarded one-to-one to the
//! gateway on their own task, and every failure from either component ends
//! up on a single error stream. Nothing is retried here.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::account::AccountForm;
use crate::backend::{AuthError, AuthProvider, DocumentStore, UserId};
use crate::clock::Clock;
use crate::config::{AccountConfig, ClientConfig};
use crate::error::SyncError;
use crate::model::{Item, ItemId};
use crate::mutation::MutationGateway;
use crate::sync::{StartOutcome, StateView, SyncAdapter, SyncEvent};

/// A list-level user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Add { title: String, description: String },
    /// Flip the check mark of the item as it was last rendered.
    Toggle(Item),
    Rename { id: ItemId, title: String },
    Describe { id: ItemId, description: String },
    Delete(ItemId),
}

impl Intent {
    const fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Toggle(_) => "toggle",
            Self::Rename { .. } => "rename",
            Self::Describe { .. } => "describe",
            Self::Delete(_) => "delete",
        }
    }

    async fn run(self, gateway: &MutationGateway) -> Result<(), SyncError> {
        match self {
            Self::Add { title, description } => gateway.add(&title, &description).await.map(drop),
            Self::Toggle(item) => gateway.set_checked(&item.id, !item.is_checked).await,
            Self::Rename { id, title } => gateway.set_title(&id, &title).await,
            Self::Describe { id, description } => gateway.set_description(&id, &description).await,
            Self::Delete(id) => gateway.delete(&id).await,
        }
    }
}

/// Receiving end of the coordinator's error stream.
#[derive(Debug)]
pub struct ErrorStream {
    rx: mpsc::UnboundedReceiver<SyncError>,
}

impl ErrorStream {
    /// Next reported error; `None` once the coordinator is gone.
    pub async fn next(&mut self) -> Option<SyncError> {
        self.rx.recv().await
    }

    /// Next already-reported error, without waiting.
    pub fn try_next(&mut self) -> Option<SyncError> {
        self.rx.try_recv().ok()
    }
}

pub struct Coordinator {
    auth: Arc<dyn AuthProvider>,
    adapter: Arc<SyncAdapter>,
    gateway: Arc<MutationGateway>,
    account: AccountConfig,
    errors: mpsc::UnboundedSender<SyncError>,
    error_rx: Mutex<Option<mpsc::UnboundedReceiver<SyncError>>>,
    relay: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Build the adapter and gateway over the given collaborators.
    #[must_use]
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        config: &ClientConfig,
    ) -> Self {
        let adapter = Arc::new(SyncAdapter::new(
            Arc::clone(&auth),
            Arc::clone(&store),
            config.sync.clone(),
        ));
        let gateway = Arc::new(MutationGateway::new(
            Arc::clone(&auth),
            store,
            clock,
            config.sync.clone(),
        ));
        Self::from_parts(auth, adapter, gateway, config.account.clone())
    }

    #[must_use]
    pub fn from_parts(
        auth: Arc<dyn AuthProvider>,
        adapter: Arc<SyncAdapter>,
        gateway: Arc<MutationGateway>,
        account: AccountConfig,
    ) -> Self {
        let (errors, error_rx) = mpsc::unbounded_channel();
        Self {
            auth,
            adapter,
            gateway,
            account,
            errors,
            error_rx: Mutex::new(Some(error_rx)),
            relay: Mutex::new(None),
        }
    }

    /// Hand out the error stream. Only the first call gets it.
    pub fn take_errors(&self) -> Option<ErrorStream> {
        self.error_rx.lock().take().map(|rx| ErrorStream { rx })
    }

    /// Grouped list state for rendering.
    #[must_use]
    pub fn sections(&self) -> StateView {
        self.adapter.current_state()
    }

    #[must_use]
    pub fn adapter(&self) -> &Arc<SyncAdapter> {
        &self.adapter
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<MutationGateway> {
        &self.gateway
    }

    /// Screen activation: start listening.
    ///
    /// Subscription failures, including a failed start, reach the error
    /// stream through the adapter's event channel.
    pub async fn activate(&self) -> Result<StartOutcome, SyncError> {
        self.ensure_relay();
        let outcome = self.adapter.start_listening().await;
        match &outcome {
            Ok(outcome) => info!(?outcome, "list activated"),
            Err(err) => debug!(%err, "list activation failed"),
        }
        outcome
    }

    /// Screen teardown: stop listening. Safe to call repeatedly.
    pub fn deactivate(&self) {
        if self.adapter.stop_listening() {
            info!("list deactivated");
        }
    }

    /// Forward an intent to the gateway without waiting for the write.
    ///
    /// The returned handle resolves once the write was acknowledged or its
    /// failure reported.
    pub fn dispatch(&self, intent: Intent) -> JoinHandle<()> {
        let gateway = Arc::clone(&self.gateway);
        let errors = self.errors.clone();
        tokio::spawn(async move {
            let name = intent.name();
            if let Err(error) = intent.run(&gateway).await {
                warn!(intent = name, code = %error.code(), %error, "intent failed");
                let _ = errors.send(error);
            }
        })
    }

    /// Whether the sign-up form may be submitted.
    #[must_use]
    pub fn can_create_account(&self, form: &AccountForm) -> bool {
        form.can_submit(&self.account)
    }

    pub async fn create_account(&self, form: &AccountForm) -> Result<UserId, SyncError> {
        if !self.can_create_account(form) {
            return Err(self.report(AuthError::InvalidCredentials.into()));
        }
        let user = self
            .auth
            .create_account(form.email.trim(), &form.password)
            .await
            .map_err(|err| self.report(err.into()))?;
        info!(%user, "account created");
        Ok(user)
    }

    pub async fn sign_in(&self, form: &AccountForm) -> Result<UserId, SyncError> {
        let user = self
            .auth
            .sign_in(form.email.trim(), &form.password)
            .await
            .map_err(|err| self.report(err.into()))?;
        info!(%user, "signed in");
        Ok(user)
    }

    /// Sign out, then drop the subscription and the cached list.
    pub async fn logout(&self) -> Result<(), SyncError> {
        self.auth
            .sign_out()
            .await
            .map_err(|err| self.report(err.into()))?;
        self.deactivate();
        self.adapter.clear();
        info!("signed out");
        Ok(())
    }

    fn report(&self, error: SyncError) -> SyncError {
        warn!(code = %error.code(), %error, "reporting error");
        let _ = self.errors.send(error.clone());
        error
    }

    fn ensure_relay(&self) {
        let mut relay = self.relay.lock();
        if relay.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let mut events = self.adapter.events();
        let errors = self.errors.clone();
        *relay = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SyncEvent::Failed { error, .. }) => {
                        if errors.send(error).is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "error relay fell behind; sync events lost");
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }));
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.adapter.stop_listening();
        if let Some(relay) = self.relay.lock().take() {
            relay.abort();
        }
    }
}

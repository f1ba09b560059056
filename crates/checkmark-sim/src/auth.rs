use std::collections::BTreeMap;

use async_trait::async_trait;
use checkmark_core::backend::{AuthError, AuthProvider, UserId};
use parking_lot::Mutex;
use tracing::debug;

struct Account {
    password: String,
    user: UserId,
}

#[derive(Default)]
struct Inner {
    accounts: BTreeMap<String, Account>,
    current: Option<UserId>,
    next_user: u64,
    fail_next: Option<String>,
}

impl Inner {
    fn take_fault(&mut self) -> Result<(), AuthError> {
        match self.fail_next.take() {
            Some(reason) => Err(AuthError::Transport(reason)),
            None => Ok(()),
        }
    }
}

/// In-memory account registry with a single signed-in slot.
#[derive(Default)]
pub struct MemoryAuth {
    inner: Mutex<Inner>,
}

impl MemoryAuth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider with `user` already signed in and no registered accounts.
    #[must_use]
    pub fn signed_in(user: &str) -> Self {
        let auth = Self::new();
        auth.inner.lock().current = Some(UserId::new(user));
        auth
    }

    /// Fail the next request with a transport error.
    pub fn fail_next_request(&self, reason: impl Into<String>) {
        self.inner.lock().fail_next = Some(reason.into());
    }

    /// Drop the signed-in user without going through `sign_out`.
    pub fn expire_session(&self) {
        self.inner.lock().current = None;
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    fn current_user_id(&self) -> Option<UserId> {
        self.inner.lock().current.clone()
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let mut inner = self.inner.lock();
        inner.take_fault()?;
        if inner.accounts.contains_key(email) {
            return Err(AuthError::AccountExists {
                email: email.to_string(),
            });
        }

        inner.next_user += 1;
        let user = UserId::new(format!("user-{}", inner.next_user));
        inner.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        inner.current = Some(user.clone());
        debug!(%user, "account created");
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let mut inner = self.inner.lock();
        inner.take_fault()?;
        let user = inner
            .accounts
            .get(email)
            .filter(|account| account.password == password)
            .map(|account| account.user.clone())
            .ok_or(AuthError::InvalidCredentials)?;
        inner.current = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut inner = self.inner.lock();
        inner.take_fault()?;
        inner.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_sign_in_round_trip() {
        let auth = MemoryAuth::new();
        let created = auth.create_account("a@b.c", "hunter22").await.unwrap();
        assert_eq!(auth.current_user_id(), Some(created.clone()));

        auth.sign_out().await.unwrap();
        assert_eq!(auth.current_user_id(), None);

        let signed_in = auth.sign_in("a@b.c", "hunter22").await.unwrap();
        assert_eq!(signed_in, created);
    }

    #[tokio::test]
    async fn duplicate_accounts_and_bad_passwords_are_rejected() {
        let auth = MemoryAuth::new();
        auth.create_account("a@b.c", "hunter22").await.unwrap();

        assert!(matches!(
            auth.create_account("a@b.c", "other").await,
            Err(AuthError::AccountExists { .. })
        ));
        assert_eq!(
            auth.sign_in("a@b.c", "wrong").await,
            Err(AuthError::InvalidCredentials)
        );
    }
}

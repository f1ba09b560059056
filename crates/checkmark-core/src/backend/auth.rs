use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// Opaque identifier of an authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a provider-issued user id.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors reported by an [`AuthProvider`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account for {email} already exists")]
    AccountExists { email: String },

    #[error("auth request failed: {0}")]
    Transport(String),
}

impl AuthError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::AccountExists { .. } => ErrorCode::AccountExists,
            Self::Transport(_) => ErrorCode::TransportFailed,
        }
    }
}

/// Account capability supplied by the hosting platform.
///
/// `current_user_id` is synchronous: providers keep the signed-in user in
/// memory and every remote operation checks it before building a path.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The signed-in user, if any.
    fn current_user_id(&self) -> Option<UserId>;

    /// Register a new account and sign it in.
    async fn create_account(&self, email: &str, password: &str) -> Result<UserId, AuthError>;

    /// Sign in to an existing account.
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserId, AuthError>;

    /// Sign the current user out. Succeeds when nobody is signed in.
    async fn sign_out(&self) -> Result<(), AuthError>;
}

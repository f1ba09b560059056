use std::fmt;

use crate::backend::{AuthError, StoreError};

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotAuthenticated,
    ConfigParseError,
    InvalidCredentials,
    AccountExists,
    ItemNotFound,
    InvalidTitle,
    DecodeFailed,
    TransportFailed,
    ListenerFailed,
    SubscriptionClosed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotAuthenticated => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidCredentials => "E1003",
            Self::AccountExists => "E1004",
            Self::ItemNotFound => "E2001",
            Self::InvalidTitle => "E2002",
            Self::DecodeFailed => "E3001",
            Self::TransportFailed => "E5001",
            Self::ListenerFailed => "E5002",
            Self::SubscriptionClosed => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and popups.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotAuthenticated => "No signed-in user",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidCredentials => "Invalid email or password",
            Self::AccountExists => "Account already exists",
            Self::ItemNotFound => "Item not found",
            Self::InvalidTitle => "Item title is empty",
            Self::DecodeFailed => "Document could not be decoded",
            Self::TransportFailed => "Remote write failed",
            Self::ListenerFailed => "Live subscription failed",
            Self::SubscriptionClosed => "Live subscription closed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to the user.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotAuthenticated => Some("Sign in before reading or editing items."),
            Self::ConfigParseError => Some("Fix syntax in checkmark/config.toml and retry."),
            Self::InvalidCredentials => Some("Check the email address and password."),
            Self::AccountExists => Some("Sign in with the existing account instead."),
            Self::ItemNotFound | Self::DecodeFailed => None,
            Self::InvalidTitle => Some("Enter a non-empty title."),
            Self::TransportFailed => Some("Check connectivity and retry the change."),
            Self::ListenerFailed | Self::SubscriptionClosed => {
                Some("Stop and restart listening to resubscribe.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures surfaced by the sync adapter, the mutation gateway and the
/// coordinator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// A remote operation was attempted with no signed-in user.
    #[error("no authenticated user")]
    NotAuthenticated,

    /// Caller supplied an empty title.
    #[error("item title must not be empty")]
    InvalidTitle,

    /// A snapshot document could not be decoded into an item.
    #[error("document {id} could not be decoded: {reason}")]
    Decode { id: String, reason: String },

    /// The remote store rejected or failed a request.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The authentication provider failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The live query stream ended.
    #[error("live query stream ended")]
    Closed,
}

impl SyncError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotAuthenticated => ErrorCode::NotAuthenticated,
            Self::InvalidTitle => ErrorCode::InvalidTitle,
            Self::Decode { .. } => ErrorCode::DecodeFailed,
            Self::Store(err) => err.code(),
            Self::Auth(err) => err.code(),
            Self::Closed => ErrorCode::SubscriptionClosed,
        }
    }

    /// Optional remediation hint.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, SyncError};
    use crate::backend::StoreError;
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotAuthenticated,
            ErrorCode::ConfigParseError,
            ErrorCode::InvalidCredentials,
            ErrorCode::AccountExists,
            ErrorCode::ItemNotFound,
            ErrorCode::InvalidTitle,
            ErrorCode::DecodeFailed,
            ErrorCode::TransportFailed,
            ErrorCode::ListenerFailed,
            ErrorCode::SubscriptionClosed,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::ListenerFailed.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn store_errors_keep_their_code() {
        let err = SyncError::from(StoreError::Transport("connection reset".into()));
        assert_eq!(err.code(), ErrorCode::TransportFailed);
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn not_authenticated_maps_to_code() {
        assert_eq!(SyncError::NotAuthenticated.code().code(), "E1001");
        assert!(SyncError::NotAuthenticated.hint().is_some());
    }

    #[test]
    fn closed_stream_is_not_tied_to_the_first_snapshot() {
        let err = SyncError::Closed;
        assert_eq!(err.code(), ErrorCode::SubscriptionClosed);
        assert_eq!(err.to_string(), "live query stream ended");
        assert!(err.hint().is_some());
    }
}

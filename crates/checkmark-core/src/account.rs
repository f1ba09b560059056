use crate::config::AccountConfig;

/// Sign-up form state: the create button is enabled once both fields hold
/// something usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountForm {
    pub email: String,
    pub password: String,
}

impl AccountForm {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn can_submit(&self, config: &AccountConfig) -> bool {
        let email = self.email.trim();
        !email.is_empty()
            && email.contains('@')
            && !self.password.is_empty()
            && self.password.chars().count() >= config.min_password_len
    }
}

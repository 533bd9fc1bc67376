use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AccountId;

/// An account holder. Registration creates the account together with its empty balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Assigned by storage (0 until registered)
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: 0,
            username: username.into().trim().to_string(),
            email: email.into().trim().to_lowercase(),
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), AccountValidationError> {
        if self.username.is_empty() {
            return Err(AccountValidationError::EmptyUsername);
        }
        if !is_plausible_email(&self.email) {
            return Err(AccountValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}

/// `local@domain.tld` with no whitespace and a single `@`.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyUsername,
    InvalidEmail(String),
}

impl std::fmt::Display for AccountValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountValidationError::EmptyUsername => write!(f, "username cannot be empty"),
            AccountValidationError::InvalidEmail(email) => {
                write!(f, "invalid email address format: {}", email)
            }
        }
    }
}

impl std::error::Error for AccountValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_input() {
        let account = Account::new("  alice ", " Alice@Example.COM ");
        assert_eq!(account.username, "alice");
        assert_eq!(account.email, "alice@example.com");
        assert!(account.validate().is_ok());
    }

    #[test]
    fn test_empty_username_rejected() {
        let account = Account::new("   ", "a@b.io");
        assert_eq!(
            account.validate(),
            Err(AccountValidationError::EmptyUsername)
        );
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_plausible_email("bob@bank.example"));
        assert!(!is_plausible_email("bob"));
        assert!(!is_plausible_email("@bank.example"));
        assert!(!is_plausible_email("bob@bank"));
        assert!(!is_plausible_email("bob@.io"));
        assert!(!is_plausible_email("bob@bank.io@x.io"));
        assert!(!is_plausible_email("bo b@bank.io"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Cents};

pub type TransactionId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Funds move between two accounts
    Transfer,
    /// Funds enter an account from the bank
    Credit,
    /// Funds leave an account to the bank
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "transfer" => Some(TransactionKind::Transfer),
            "credit" => Some(TransactionKind::Credit),
            "debit" => Some(TransactionKind::Debit),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A completed monetary operation as recorded in the transaction log.
/// Records are only persisted once completed; corrections are new records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Assigned by storage on append (0 until then)
    pub id: TransactionId,
    /// Paying account; `None` when the bank is the payer (credit)
    pub from_account: Option<AccountId>,
    /// Receiving account; `None` when the bank is the receiver (debit)
    pub to_account: Option<AccountId>,
    /// Always positive
    pub amount_cents: Cents,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    fn pending(
        from_account: Option<AccountId>,
        to_account: Option<AccountId>,
        amount_cents: Cents,
        kind: TransactionKind,
    ) -> Self {
        Self {
            id: 0,
            from_account,
            to_account,
            amount_cents,
            kind,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn transfer(from: AccountId, to: AccountId, amount_cents: Cents) -> Self {
        Self::pending(Some(from), Some(to), amount_cents, TransactionKind::Transfer)
    }

    pub fn credit(account: AccountId, amount_cents: Cents) -> Self {
        Self::pending(None, Some(account), amount_cents, TransactionKind::Credit)
    }

    pub fn debit(account: AccountId, amount_cents: Cents) -> Self {
        Self::pending(Some(account), None, amount_cents, TransactionKind::Debit)
    }

    /// Mark the transaction completed. Only a pending transaction can complete.
    pub fn complete(&mut self) -> Result<(), StatusTransitionError> {
        if self.status != TransactionStatus::Pending {
            return Err(StatusTransitionError {
                from: self.status,
                to: TransactionStatus::Completed,
            });
        }
        self.status = TransactionStatus::Completed;
        Ok(())
    }

    /// Accounts whose balances this transaction moves (never the system account).
    pub fn accounts(&self) -> impl Iterator<Item = AccountId> {
        self.from_account.into_iter().chain(self.to_account)
    }

    pub fn involves(&self, account: AccountId) -> bool {
        self.accounts().any(|a| a == account)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransitionError {
    pub from: TransactionStatus,
    pub to: TransactionStatus,
}

impl std::fmt::Display for StatusTransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot move a {} transaction to {}",
            self.from, self.to
        )
    }
}

impl std::error::Error for StatusTransitionError {}

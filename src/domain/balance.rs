use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

pub type AccountId = i64;

/// The bank's side of a credit or debit. It is never stored as a balance row.
pub const SYSTEM_ACCOUNT: AccountId = 0;

/// Current funds held by an account.
///
/// Only the ledger mutates a balance, inside a unit of work. `version` is bumped
/// by storage on every update and is checked by the next conditional write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub account_id: AccountId,
    pub amount_cents: Cents,
    pub version: i64,
    pub last_updated_at: DateTime<Utc>,
}

impl Balance {
    /// The empty balance created at registration time.
    pub fn new(account_id: AccountId, now: DateTime<Utc>) -> Self {
        Self::seeded(account_id, 0, now)
    }

    /// A balance created directly with funds (first credit of an account without a row).
    pub fn seeded(account_id: AccountId, amount_cents: Cents, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            amount_cents,
            version: 0,
            last_updated_at: now,
        }
    }

    pub fn add(&mut self, amount_cents: Cents, now: DateTime<Utc>) -> Result<(), BalanceError> {
        self.amount_cents = self
            .amount_cents
            .checked_add(amount_cents)
            .ok_or(BalanceError::Overflow {
                account_id: self.account_id,
            })?;
        self.last_updated_at = now;
        Ok(())
    }

    /// Remove funds, refusing to go below zero.
    pub fn subtract(&mut self, amount_cents: Cents, now: DateTime<Utc>) -> Result<(), BalanceError> {
        if self.amount_cents < amount_cents {
            return Err(BalanceError::InsufficientFunds {
                account_id: self.account_id,
                balance: self.amount_cents,
                required: amount_cents,
            });
        }
        self.amount_cents -= amount_cents;
        self.last_updated_at = now;
        Ok(())
    }
}

/// Sum of a set of balances. Transfers never change it.
pub fn total_balance(balances: &[Balance]) -> Cents {
    balances.iter().map(|b| b.amount_cents).sum()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },
    Overflow {
        account_id: AccountId,
    },
}

impl std::fmt::Display for BalanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceError::InsufficientFunds {
                account_id,
                balance,
                required,
            } => write!(
                f,
                "Account {} holds {} cents, {} required",
                account_id, balance, required
            ),
            BalanceError::Overflow { account_id } => {
                write!(f, "Balance of account {} would overflow", account_id)
            }
        }
    }
}

impl std::error::Error for BalanceError {}

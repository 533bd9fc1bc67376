use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, Cents, format_cents};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Credit,
    Debit,
    Transfer,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Credit => "credit",
            JobKind::Debit => "debit",
            JobKind::Transfer => "transfer",
        }
    }

    /// An empty kind means transfer.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(JobKind::Credit),
            "debit" => Some(JobKind::Debit),
            "transfer" | "" => Some(JobKind::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit of work for the pool.
///
/// `kind` stays a raw string until a worker picks the job up; jobs whose kind
/// does not parse are discarded there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount_cents: Cents,
    pub kind: String,
}

impl Job {
    pub fn new(
        from_account: AccountId,
        to_account: AccountId,
        amount_cents: Cents,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            from_account,
            to_account,
            amount_cents,
            kind: kind.into(),
        }
    }

    pub fn credit(account: AccountId, amount_cents: Cents) -> Self {
        Self::new(0, account, amount_cents, JobKind::Credit.as_str())
    }

    pub fn debit(account: AccountId, amount_cents: Cents) -> Self {
        Self::new(account, 0, amount_cents, JobKind::Debit.as_str())
    }

    pub fn transfer(from: AccountId, to: AccountId, amount_cents: Cents) -> Self {
        Self::new(from, to, amount_cents, JobKind::Transfer.as_str())
    }

    pub fn job_kind(&self) -> Option<JobKind> {
        JobKind::from_str(&self.kind)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.kind.is_empty() {
            JobKind::Transfer.as_str()
        } else {
            self.kind.as_str()
        };
        write!(
            f,
            "{} of {} ({} -> {})",
            kind,
            format_cents(self.amount_cents),
            self.from_account,
            self.to_account
        )
    }
}

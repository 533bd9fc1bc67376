use async_trait::async_trait;

use crate::application::{AppError, LedgerService};
use crate::domain::{AccountId, Cents, Transaction};

/// The ledger operations a worker can run.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn credit(&self, account: AccountId, amount_cents: Cents)
    -> Result<Transaction, AppError>;

    async fn debit(&self, account: AccountId, amount_cents: Cents)
    -> Result<Transaction, AppError>;

    async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount_cents: Cents,
    ) -> Result<Transaction, AppError>;
}

#[async_trait]
impl JobProcessor for LedgerService {
    async fn credit(
        &self,
        account: AccountId,
        amount_cents: Cents,
    ) -> Result<Transaction, AppError> {
        LedgerService::credit(self, account, amount_cents).await
    }

    async fn debit(
        &self,
        account: AccountId,
        amount_cents: Cents,
    ) -> Result<Transaction, AppError> {
        LedgerService::debit(self, account, amount_cents).await
    }

    async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount_cents: Cents,
    ) -> Result<Transaction, AppError> {
        LedgerService::transfer(self, from, to, amount_cents).await
    }
}

use thiserror::Error;

use crate::domain::{
    AccountId, AccountValidationError, BalanceError, Cents, StatusTransitionError, TransactionId,
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Balance not found for account: {0}")]
    BalanceNotFound(AccountId),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Account {account_id} still holds {balance} cents and cannot be deleted")]
    AccountNotEmpty { account_id: AccountId, balance: Cents },

    #[error("Invalid transaction state: {0}")]
    InvalidTransition(#[from] StatusTransitionError),

    #[error("Database error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    /// True for the lookups that found no row.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::AccountNotFound(_)
                | AppError::BalanceNotFound(_)
                | AppError::TransactionNotFound(_)
        )
    }
}

impl From<BalanceError> for AppError {
    fn from(err: BalanceError) -> Self {
        match err {
            BalanceError::InsufficientFunds {
                account_id,
                balance,
                required,
            } => AppError::InsufficientFunds {
                account_id,
                balance,
                required,
            },
            BalanceError::Overflow { .. } => AppError::Validation(err.to_string()),
        }
    }
}

impl From<AccountValidationError> for AppError {
    fn from(err: AccountValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

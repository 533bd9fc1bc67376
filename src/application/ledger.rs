use chrono::Utc;
use tracing::{info, warn};

use crate::cache::{balance_key, transaction_key};
use crate::domain::{
    AccountId, Balance, Cents, ENTITY_TRANSACTION, SYSTEM_ACCOUNT, Transaction, TransactionKind,
    format_cents,
};
use crate::storage::LedgerUnit;

use super::{AppError, LedgerService};

impl LedgerService {
    /// Move funds from one account to another.
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount_cents: Cents,
    ) -> Result<Transaction, AppError> {
        if from == to {
            return Err(AppError::Validation(
                "sender and receiver cannot be the same account".to_string(),
            ));
        }
        validate_party(from)?;
        validate_party(to)?;
        validate_amount(amount_cents, "transfer")?;

        let transaction = self.apply(Transaction::transfer(from, to, amount_cents)).await?;

        let details = format!(
            "Account {} transferred {} to account {}",
            from,
            format_cents(amount_cents),
            to
        );
        self.record_audit(ENTITY_TRANSACTION, transaction.id, "transfer", &details)
            .await;
        Ok(transaction)
    }

    /// Add funds to an account from the bank.
    pub async fn credit(
        &self,
        account: AccountId,
        amount_cents: Cents,
    ) -> Result<Transaction, AppError> {
        validate_party(account)?;
        validate_amount(amount_cents, "credit")?;

        let transaction = self.apply(Transaction::credit(account, amount_cents)).await?;

        let details = format!(
            "Account {} credited with {} from the bank",
            account,
            format_cents(amount_cents)
        );
        self.record_audit(ENTITY_TRANSACTION, transaction.id, "credit", &details)
            .await;
        Ok(transaction)
    }

    /// Remove funds from an account to the bank.
    pub async fn debit(
        &self,
        account: AccountId,
        amount_cents: Cents,
    ) -> Result<Transaction, AppError> {
        validate_party(account)?;
        validate_amount(amount_cents, "debit")?;

        let transaction = self.apply(Transaction::debit(account, amount_cents)).await?;

        let details = format!(
            "Account {} debited with {} to the bank",
            account,
            format_cents(amount_cents)
        );
        self.record_audit(ENTITY_TRANSACTION, transaction.id, "debit", &details)
            .await;
        Ok(transaction)
    }

    /// Run a pending transaction as one unit of work and invalidate what it touched.
    async fn apply(&self, mut transaction: Transaction) -> Result<Transaction, AppError> {
        let mut unit = self.repo.begin().await?;

        match write_transaction(&mut unit, &mut transaction).await {
            Ok(()) => unit.commit().await?,
            Err(e) => {
                if let Err(rollback_err) = unit.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                return Err(e);
            }
        }

        for account_id in transaction.accounts() {
            self.cache.invalidate(&balance_key(account_id)).await;
        }
        self.cache.invalidate(&transaction_key(transaction.id)).await;

        info!(
            transaction_id = transaction.id,
            kind = %transaction.kind,
            amount = %format_cents(transaction.amount_cents),
            "transaction committed"
        );
        Ok(transaction)
    }
}

/// Balance mutations and log append for one transaction, inside `unit`.
async fn write_transaction(
    unit: &mut LedgerUnit,
    transaction: &mut Transaction,
) -> Result<(), AppError> {
    let now = Utc::now();
    let accounts: Vec<AccountId> = transaction.accounts().collect();
    unit.claim_balances(&accounts).await?;

    if let Some(from) = transaction.from_account {
        let mut balance = unit
            .fetch_balance(from)
            .await?
            .ok_or(AppError::BalanceNotFound(from))?;
        balance.subtract(transaction.amount_cents, now)?;
        unit.update_balance(&mut balance).await?;
    }

    if let Some(to) = transaction.to_account {
        match unit.fetch_balance(to).await? {
            Some(mut balance) => {
                balance.add(transaction.amount_cents, now)?;
                unit.update_balance(&mut balance).await?;
            }
            None if transaction.kind == TransactionKind::Credit => {
                if !unit.account_exists(to).await? {
                    return Err(AppError::AccountNotFound(to));
                }
                unit.insert_balance(&Balance::seeded(to, transaction.amount_cents, now))
                    .await?;
            }
            None => return Err(AppError::BalanceNotFound(to)),
        }
    }

    transaction.complete()?;
    unit.insert_transaction(transaction).await?;
    Ok(())
}

fn validate_amount(amount_cents: Cents, operation: &str) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::Validation(format!(
            "{} amount must be a positive number",
            operation
        )));
    }
    Ok(())
}

fn validate_party(account: AccountId) -> Result<(), AppError> {
    if account == SYSTEM_ACCOUNT {
        return Err(AppError::Validation(format!(
            "account {} is reserved for the bank",
            SYSTEM_ACCOUNT
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(1, "credit").is_ok());
        assert!(matches!(
            validate_amount(0, "credit"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_amount(-100, "debit"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_system_account_is_not_a_party() {
        assert!(validate_party(1).is_ok());
        assert!(matches!(
            validate_party(SYSTEM_ACCOUNT),
            Err(AppError::Validation(_))
        ));
    }
}

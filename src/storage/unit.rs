use anyhow::{Context, Result, bail};
use sqlx::{Row, Sqlite};

use crate::domain::{Account, AccountId, Balance, SYSTEM_ACCOUNT, Transaction};

use super::Repository;

/// An atomic unit of work over accounts, balances and the transaction log.
///
/// Nothing written through a unit is visible to other connections before
/// [`LedgerUnit::commit`]. Dropping an uncommitted unit rolls everything back.
pub struct LedgerUnit {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl LedgerUnit {
    pub(super) fn new(tx: sqlx::Transaction<'static, Sqlite>) -> Self {
        Self { tx }
    }

    /// Take the database write lock for the given balance rows.
    ///
    /// Must be the first statement of a mutating unit: the lock is acquired
    /// before anything is read, so two units touching the same account are
    /// serialized instead of both reading the same pre-update amount.
    pub async fn claim_balances(&mut self, account_ids: &[AccountId]) -> Result<()> {
        for account_id in account_ids {
            sqlx::query("UPDATE balances SET version = version WHERE account_id = ?")
                .bind(account_id)
                .execute(&mut *self.tx)
                .await
                .context("Failed to claim balance row")?;
        }
        Ok(())
    }

    /// Read a balance inside the unit.
    pub async fn fetch_balance(&mut self, account_id: AccountId) -> Result<Option<Balance>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, amount_cents, version, last_updated_at
            FROM balances
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to fetch balance")?;

        row.as_ref().map(Repository::row_to_balance).transpose()
    }

    /// Whether an account row exists.
    pub async fn account_exists(&mut self, account_id: AccountId) -> Result<bool> {
        let count: i64 = sqlx::query("SELECT COUNT(*) as count FROM accounts WHERE id = ?")
            .bind(account_id)
            .fetch_one(&mut *self.tx)
            .await
            .context("Failed to look up account")?
            .get("count");
        Ok(count > 0)
    }

    /// Create a balance row.
    pub async fn insert_balance(&mut self, balance: &Balance) -> Result<()> {
        if balance.account_id == SYSTEM_ACCOUNT {
            bail!("The system account has no balance row");
        }
        sqlx::query(
            r#"
            INSERT INTO balances (account_id, amount_cents, version, last_updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(balance.account_id)
        .bind(balance.amount_cents)
        .bind(balance.version)
        .bind(balance.last_updated_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .context("Failed to create balance")?;
        Ok(())
    }

    /// Write back a balance read in this unit.
    ///
    /// The update only applies if the row still carries the version that was
    /// read; otherwise the unit must be abandoned.
    pub async fn update_balance(&mut self, balance: &mut Balance) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE balances
            SET amount_cents = ?, last_updated_at = ?, version = version + 1
            WHERE account_id = ? AND version = ?
            "#,
        )
        .bind(balance.amount_cents)
        .bind(balance.last_updated_at.to_rfc3339())
        .bind(balance.account_id)
        .bind(balance.version)
        .execute(&mut *self.tx)
        .await
        .context("Failed to update balance")?;

        if result.rows_affected() == 0 {
            bail!(
                "Concurrent modification of balance for account {} (version {})",
                balance.account_id,
                balance.version
            );
        }
        balance.version += 1;
        Ok(())
    }

    /// Append a transaction to the log, filling in its ID.
    pub async fn insert_transaction(&mut self, transaction: &mut Transaction) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (from_account_id, to_account_id, amount_cents, transaction_type, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction.from_account.unwrap_or(SYSTEM_ACCOUNT))
        .bind(transaction.to_account.unwrap_or(SYSTEM_ACCOUNT))
        .bind(transaction.amount_cents)
        .bind(transaction.kind.as_str())
        .bind(transaction.status.as_str())
        .bind(transaction.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .context("Failed to create transaction record")?;

        transaction.id = result.last_insert_rowid();
        Ok(())
    }

    /// Insert a new account, filling in its ID.
    pub async fn insert_account(&mut self, account: &mut Account) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (username, email, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(account.created_at.to_rfc3339())
        .execute(&mut *self.tx)
        .await
        .context("Failed to save account")?;

        account.id = result.last_insert_rowid();
        Ok(())
    }

    /// Remove a balance row. Returns false if there was none.
    pub async fn delete_balance(&mut self, account_id: AccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM balances WHERE account_id = ?")
            .bind(account_id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete balance")?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove an account. Its balance row must be deleted first.
    pub async fn delete_account(&mut self, account_id: AccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(account_id)
            .execute(&mut *self.tx)
            .await
            .context("Failed to delete account")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .context("Failed to commit unit of work")
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .context("Failed to roll back unit of work")
    }
}

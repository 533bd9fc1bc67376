use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Account, AccountId, AuditEntry, Balance, SYSTEM_ACCOUNT, Transaction, TransactionId,
    TransactionKind, TransactionStatus,
};

use super::{LedgerUnit, MIGRATION_001_INITIAL};

/// How long a connection waits for the database write lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Repository for persisting and querying accounts, balances, transactions and audit entries.
///
/// Plain reads go straight to the pool. Every balance mutation goes through a
/// [`LedgerUnit`] obtained from [`Repository::begin`].
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to an existing SQLite database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        Self::open(database_url, max_connections, false).await
    }

    /// Initialize a database (create if missing + migrate).
    pub async fn init(database_url: &str, max_connections: u32) -> Result<Self> {
        let repo = Self::open(database_url, max_connections, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    async fn open(database_url: &str, max_connections: u32, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(create)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Close every pooled connection. Later calls fail with a storage error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Open an atomic unit of work. Dropping it without committing rolls it back.
    pub async fn begin(&self) -> Result<LedgerUnit> {
        let tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin unit of work")?;
        Ok(LedgerUnit::new(tx))
    }

    // ========================
    // Account operations
    // ========================

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// Get an account by e-mail address.
    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, created_at
            FROM accounts
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by email")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// List all accounts, oldest first.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query("SELECT id, username, email, created_at FROM accounts ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    // ========================
    // Balance operations
    // ========================

    /// Get the current balance row of an account.
    pub async fn get_balance(&self, account_id: AccountId) -> Result<Option<Balance>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, amount_cents, version, last_updated_at
            FROM balances
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch balance")?;

        row.as_ref().map(Self::row_to_balance).transpose()
    }

    /// List every balance row.
    pub async fn list_balances(&self) -> Result<Vec<Balance>> {
        let rows = sqlx::query(
            "SELECT account_id, amount_cents, version, last_updated_at FROM balances ORDER BY account_id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list balances")?;

        rows.iter().map(Self::row_to_balance).collect()
    }

    // ========================
    // Transaction operations
    // ========================

    /// Get a transaction by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount_cents, transaction_type, status, created_at
            FROM transactions
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transaction")?;

        row.as_ref().map(Self::row_to_transaction).transpose()
    }

    /// List transactions where the account pays or receives, in log order.
    pub async fn list_transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount_cents, transaction_type, status, created_at
            FROM transactions
            WHERE from_account_id = ? OR to_account_id = ?
            ORDER BY id
            "#,
        )
        .bind(account_id)
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transactions for account")?;

        rows.iter().map(Self::row_to_transaction).collect()
    }

    /// Count every transaction in the log.
    pub async fn count_transactions(&self) -> Result<i64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) as count FROM transactions")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?
            .get("count");
        Ok(count)
    }

    // ========================
    // Audit operations
    // ========================

    /// Append an audit entry, filling in its ID.
    pub async fn insert_audit_entry(&self, entry: &mut AuditEntry) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (entity_type, entity_id, action, details, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.action)
        .bind(&entry.details)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save audit entry")?;

        entry.id = result.last_insert_rowid();
        Ok(())
    }

    /// List audit entries recorded for one entity, oldest first.
    pub async fn list_audit_entries(
        &self,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, entity_type, entity_id, action, details, created_at
            FROM audit_logs
            WHERE entity_type = ? AND entity_id = ?
            ORDER BY id
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list audit entries")?;

        rows.iter().map(Self::row_to_audit_entry).collect()
    }

    // ========================
    // Row mapping
    // ========================

    pub(super) fn row_to_account(row: &SqliteRow) -> Result<Account> {
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    pub(super) fn row_to_balance(row: &SqliteRow) -> Result<Balance> {
        let updated_str: String = row.get("last_updated_at");

        Ok(Balance {
            account_id: row.get("account_id"),
            amount_cents: row.get("amount_cents"),
            version: row.get("version"),
            last_updated_at: parse_timestamp(&updated_str)
                .context("Invalid last_updated_at timestamp")?,
        })
    }

    fn row_to_transaction(row: &SqliteRow) -> Result<Transaction> {
        let kind_str: String = row.get("transaction_type");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(Transaction {
            id: row.get("id"),
            from_account: account_column(row.get("from_account_id")),
            to_account: account_column(row.get("to_account_id")),
            amount_cents: row.get("amount_cents"),
            kind: TransactionKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction type: {}", kind_str))?,
            status: TransactionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid transaction status: {}", status_str))?,
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }

    fn row_to_audit_entry(row: &SqliteRow) -> Result<AuditEntry> {
        let created_at_str: String = row.get("created_at");

        Ok(AuditEntry {
            id: row.get("id"),
            entity_type: row.get("entity_type"),
            entity_id: row.get("entity_id"),
            action: row.get("action"),
            details: row.get("details"),
            created_at: parse_timestamp(&created_at_str).context("Invalid created_at timestamp")?,
        })
    }
}

/// The bank side of a credit or debit is stored as the system account id.
fn account_column(id: AccountId) -> Option<AccountId> {
    (id != SYSTEM_ACCOUNT).then_some(id)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

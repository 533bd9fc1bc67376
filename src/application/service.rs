use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{
    ACCOUNT_TTL, BALANCE_TTL, Cache, CoherentCache, InMemoryCache, TRANSACTION_TTL, account_key,
    balance_key, transaction_key,
};
use crate::domain::{
    Account, AccountId, AuditEntry, Balance, ENTITY_ACCOUNT, SYSTEM_ACCOUNT, Transaction,
    TransactionId,
};
use crate::storage::{LedgerUnit, Repository, is_unique_violation};

use super::{AppError, AuditSink};

/// Application service providing the ledger's operations.
/// This is the primary interface for any client (CLI, worker pool, API, ...).
pub struct LedgerService {
    pub(super) repo: Repository,
    pub(super) cache: CoherentCache,
    audit: Arc<dyn AuditSink>,
}

impl LedgerService {
    /// Create a service over `repo`, with an in-process cache and the
    /// repository's own audit log as audit sink.
    pub fn new(repo: Repository) -> Self {
        Self {
            audit: Arc::new(repo.clone()),
            cache: CoherentCache::new(Arc::new(InMemoryCache::new())),
            repo,
        }
    }

    /// Replace the cache backend.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = CoherentCache::new(cache);
        self
    }

    /// Replace the audit sink.
    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Initialize a database at the given path, creating it if needed.
    pub async fn init(database_path: &str, max_connections: u32) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::init(&db_url, max_connections).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, max_connections: u32) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url, max_connections).await?;
        Ok(Self::new(repo))
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    // ========================
    // Account operations
    // ========================

    /// Register an account holder together with an empty balance.
    pub async fn register_account(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Account, AppError> {
        let mut account = Account::new(username, email);
        account.validate()?;

        if self.repo.get_account_by_email(&account.email).await?.is_some() {
            return Err(AppError::AccountAlreadyExists(account.email));
        }

        // The lookup above is only a fast path: a concurrent registration can
        // still win the race, and then the UNIQUE constraint decides.
        let mut unit = self.repo.begin().await?;
        if let Err(e) = unit.insert_account(&mut account).await {
            if let Err(rollback_err) = unit.rollback().await {
                warn!(error = %rollback_err, "rollback failed");
            }
            if is_unique_violation(&e) {
                return Err(AppError::AccountAlreadyExists(account.email));
            }
            return Err(e.into());
        }
        unit.insert_balance(&Balance::new(account.id, account.created_at))
            .await?;
        unit.commit().await?;

        self.cache.invalidate(&account_key(account.id)).await;
        self.cache.invalidate(&balance_key(account.id)).await;

        info!(account_id = account.id, username = %account.username, "account registered");
        self.record_audit(
            ENTITY_ACCOUNT,
            account.id,
            "register",
            &format!("Account {} registered as {}", account.id, account.username),
        )
        .await;

        Ok(account)
    }

    /// Delete an account together with its balance row.
    ///
    /// Only empty accounts can be deleted; funds must be debited or
    /// transferred out first. Past transactions and audit entries stay.
    pub async fn delete_account(&self, id: AccountId) -> Result<(), AppError> {
        validate_account_id(id)?;

        let mut unit = self.repo.begin().await?;
        match remove_account(&mut unit, id).await {
            Ok(()) => unit.commit().await?,
            Err(e) => {
                if let Err(rollback_err) = unit.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                return Err(e);
            }
        }

        self.cache.invalidate(&account_key(id)).await;
        self.cache.invalidate(&balance_key(id)).await;

        info!(account_id = id, "account deleted");
        self.record_audit(
            ENTITY_ACCOUNT,
            id,
            "delete",
            &format!("Account {} deleted", id),
        )
        .await;

        Ok(())
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, AppError> {
        self.cache
            .get_or_load(&account_key(id), ACCOUNT_TTL, || self.repo.get_account(id))
            .await?
            .ok_or(AppError::AccountNotFound(id))
    }

    /// List all accounts.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.list_accounts().await?)
    }

    // ========================
    // Read operations
    // ========================

    /// Get the current balance of an account.
    pub async fn get_balance(&self, account_id: AccountId) -> Result<Balance, AppError> {
        self.cache
            .get_or_load(&balance_key(account_id), BALANCE_TTL, || {
                self.repo.get_balance(account_id)
            })
            .await?
            .ok_or(AppError::BalanceNotFound(account_id))
    }

    /// Get every balance straight from storage.
    pub async fn list_balances(&self) -> Result<Vec<Balance>, AppError> {
        Ok(self.repo.list_balances().await?)
    }

    /// Get a transaction by ID.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.cache
            .get_or_load(&transaction_key(id), TRANSACTION_TTL, || {
                self.repo.get_transaction(id)
            })
            .await?
            .ok_or(AppError::TransactionNotFound(id))
    }

    /// Every transaction an account paid or received, in log order.
    pub async fn get_transaction_history(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, AppError> {
        Ok(self.repo.list_transactions_for_account(account_id).await?)
    }

    /// Audit entries recorded for one entity.
    pub async fn audit_trail(
        &self,
        entity_type: &str,
        entity_id: i64,
    ) -> Result<Vec<AuditEntry>, AppError> {
        Ok(self.repo.list_audit_entries(entity_type, entity_id).await?)
    }

    /// Append an audit entry. Failures are logged, never returned.
    pub(super) async fn record_audit(
        &self,
        entity_type: &str,
        entity_id: i64,
        action: &str,
        details: &str,
    ) {
        if let Err(e) = self
            .audit
            .append(entity_type, entity_id, action, details)
            .await
        {
            warn!(
                entity_type,
                entity_id,
                action,
                error = %e,
                "failed to write audit entry"
            );
        }
    }
}

async fn remove_account(unit: &mut LedgerUnit, id: AccountId) -> Result<(), AppError> {
    unit.claim_balances(&[id]).await?;

    if let Some(balance) = unit.fetch_balance(id).await? {
        if balance.amount_cents > 0 {
            return Err(AppError::AccountNotEmpty {
                account_id: id,
                balance: balance.amount_cents,
            });
        }
        unit.delete_balance(id).await?;
    }
    if !unit.delete_account(id).await? {
        return Err(AppError::AccountNotFound(id));
    }
    Ok(())
}

fn validate_account_id(id: AccountId) -> Result<(), AppError> {
    if id == SYSTEM_ACCOUNT {
        return Err(AppError::Validation(format!(
            "account {} is reserved for the bank",
            SYSTEM_ACCOUNT
        )));
    }
    Ok(())
}

// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use ledgerd::application::LedgerService;
use ledgerd::domain::{AccountId, Cents};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap(), 5).await?;
    Ok((service, temp_dir))
}

/// Register an account and credit it with `amount_cents` (skipped when zero).
pub async fn funded_account(
    service: &LedgerService,
    username: &str,
    amount_cents: Cents,
) -> Result<AccountId> {
    let account = service
        .register_account(username, &format!("{}@example.com", username))
        .await?;
    if amount_cents > 0 {
        service.credit(account.id, amount_cents).await?;
    }
    Ok(account.id)
}

/// Current amount of an account, read through the service.
pub async fn amount_of(service: &LedgerService, account: AccountId) -> Result<Cents> {
    Ok(service.get_balance(account).await?.amount_cents)
}

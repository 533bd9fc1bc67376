mod common;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use common::{amount_of, funded_account, test_service};
use ledgerd::application::{AppError, AuditSink, LedgerService};
use ledgerd::domain::{
    AccountId, AuditEntry, ENTITY_TRANSACTION, TransactionKind, TransactionStatus,
    total_balance,
};

#[tokio::test]
async fn test_transfer_moves_funds_between_accounts() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 10000).await?;
    let bob = funded_account(&service, "bob", 5000).await?;

    let transaction = service.transfer(alice, bob, 3000).await?;

    assert_eq!(transaction.kind, TransactionKind::Transfer);
    assert_eq!(transaction.status, TransactionStatus::Completed);
    assert_eq!(transaction.from_account, Some(alice));
    assert_eq!(transaction.to_account, Some(bob));
    assert_eq!(transaction.amount_cents, 3000);

    assert_eq!(amount_of(&service, alice).await?, 7000);
    assert_eq!(amount_of(&service, bob).await?, 8000);

    let stored = service.get_transaction(transaction.id).await?;
    assert_eq!(stored, transaction);

    Ok(())
}

#[tokio::test]
async fn test_credit_and_debit_use_the_bank_as_counterparty() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 0).await?;

    let credit = service.credit(alice, 2500).await?;
    assert_eq!(credit.kind, TransactionKind::Credit);
    assert_eq!(credit.from_account, None);
    assert_eq!(credit.to_account, Some(alice));

    let debit = service.debit(alice, 1000).await?;
    assert_eq!(debit.kind, TransactionKind::Debit);
    assert_eq!(debit.from_account, Some(alice));
    assert_eq!(debit.to_account, None);

    assert_eq!(amount_of(&service, alice).await?, 1500);

    // Bank sides read back as None, not as account 0
    let stored = service.get_transaction(credit.id).await?;
    assert_eq!(stored.from_account, None);

    Ok(())
}

#[tokio::test]
async fn test_insufficient_funds_leaves_state_unchanged() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 1000).await?;
    let bob = funded_account(&service, "bob", 0).await?;
    let before = service.repository().count_transactions().await?;

    let result = service.transfer(alice, bob, 1001).await;
    match result {
        Err(AppError::InsufficientFunds {
            account_id,
            balance,
            required,
        }) => {
            assert_eq!(account_id, alice);
            assert_eq!(balance, 1000);
            assert_eq!(required, 1001);
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }

    let result = service.debit(bob, 1).await;
    assert!(matches!(result, Err(AppError::InsufficientFunds { .. })));

    assert_eq!(amount_of(&service, alice).await?, 1000);
    assert_eq!(amount_of(&service, bob).await?, 0);
    assert_eq!(service.repository().count_transactions().await?, before);

    Ok(())
}

#[tokio::test]
async fn test_exact_balance_can_be_spent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 1000).await?;

    service.debit(alice, 1000).await?;

    assert_eq!(amount_of(&service, alice).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_validation_happens_before_storage() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 1000).await?;

    // With the pool closed, anything that reached storage would be a storage error
    service.repository().close().await;

    let result = service.transfer(alice, alice, 100).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = service.transfer(alice, 2, 0).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = service.credit(alice, -5).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = service.debit(0, 100).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let result = service.credit(alice, 100).await;
    assert!(matches!(result, Err(AppError::Storage(_))));

    Ok(())
}

#[tokio::test]
async fn test_same_account_transfer_message() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 1000).await?;

    let err = service.transfer(alice, alice, 100).await.unwrap_err();
    assert!(err.to_string().contains("cannot be the same account"));
    Ok(())
}

#[tokio::test]
async fn test_transfer_to_unknown_account_rolls_back() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 1000).await?;

    let result = service.transfer(alice, 999, 500).await;
    assert!(matches!(result, Err(AppError::BalanceNotFound(999))));

    // The sender's debit was part of the same unit and must be gone
    assert_eq!(amount_of(&service, alice).await?, 1000);
    assert_eq!(service.get_transaction_history(alice).await?.len(), 1);

    let result = service.credit(999, 500).await;
    assert!(matches!(result, Err(AppError::AccountNotFound(999))));

    Ok(())
}

#[tokio::test]
async fn test_history_lists_both_sides_in_order() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 10000).await?;
    let bob = funded_account(&service, "bob", 0).await?;
    let carol = funded_account(&service, "carol", 0).await?;

    let first = service.transfer(alice, bob, 1000).await?;
    let second = service.transfer(bob, carol, 400).await?;
    service.transfer(alice, carol, 100).await?;

    let history = service.get_transaction_history(bob).await?;
    let ids: Vec<_> = history.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
    assert!(history.iter().all(|t| t.involves(bob)));

    // Alice: opening credit plus two transfers
    assert_eq!(service.get_transaction_history(alice).await?.len(), 3);
    assert!(service.get_transaction_history(12345).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_reads_observe_committed_writes() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 1000).await?;

    // Populate the cache, then write
    assert_eq!(amount_of(&service, alice).await?, 1000);
    service.credit(alice, 250).await?;
    assert_eq!(amount_of(&service, alice).await?, 1250);

    service.debit(alice, 50).await?;
    assert_eq!(amount_of(&service, alice).await?, 1200);

    let balance = service.get_balance(alice).await?;
    assert_eq!(balance.version, 3);

    Ok(())
}

#[tokio::test]
async fn test_transactions_are_audited() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 10000).await?;
    let bob = funded_account(&service, "bob", 0).await?;

    let transfer = service.transfer(alice, bob, 3000).await?;
    let debit = service.debit(bob, 50).await?;

    let trail = service.audit_trail(ENTITY_TRANSACTION, transfer.id).await?;
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, "transfer");
    assert_eq!(
        trail[0].details,
        format!("Account {} transferred 30.00 to account {}", alice, bob)
    );

    let trail = service.audit_trail(ENTITY_TRANSACTION, debit.id).await?;
    assert_eq!(trail[0].action, "debit");
    assert_eq!(
        trail[0].details,
        format!("Account {} debited with 0.50 to the bank", bob)
    );

    Ok(())
}

struct FailingSink;

#[async_trait]
impl AuditSink for FailingSink {
    async fn append(
        &self,
        _entity_type: &str,
        _entity_id: i64,
        _action: &str,
        _details: &str,
    ) -> Result<AuditEntry> {
        anyhow::bail!("audit store unavailable")
    }
}

#[tokio::test]
async fn test_audit_failure_does_not_fail_the_operation() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 1000).await?;
    let service = service.with_audit_sink(Arc::new(FailingSink));

    let transaction = service.credit(alice, 500).await?;

    assert_eq!(amount_of(&service, alice).await?, 1500);
    assert!(
        service
            .audit_trail(ENTITY_TRANSACTION, transaction.id)
            .await?
            .is_empty()
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_conserve_money() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 10000).await?;
    let bob = funded_account(&service, "bob", 10000).await?;
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for i in 0..40 {
        let service = service.clone();
        let (from, to) = if i % 2 == 0 { (alice, bob) } else { (bob, alice) };
        handles.push(tokio::spawn(async move {
            service.transfer(from, to, 700).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => succeeded += 1,
            Err(AppError::InsufficientFunds { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let balances = service.list_balances().await?;
    assert_eq!(total_balance(&balances), 20000);
    assert!(balances.iter().all(|b| b.amount_cents >= 0));

    // Two opening credits plus every successful transfer
    assert_eq!(
        service.repository().count_transactions().await?,
        2 + succeeded
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_credits_are_not_lost() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 0).await?;
    let service: Arc<LedgerService> = Arc::new(service);

    let mut handles = Vec::new();
    for _ in 0..25 {
        let service = service.clone();
        handles.push(tokio::spawn(async move { service.credit(alice, 100).await }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(amount_of(&service, alice).await?, 2500);
    Ok(())
}

/// Drop the balance row behind the service's back, as older databases may lack one.
async fn remove_balance_row(service: &LedgerService, account: AccountId) -> Result<()> {
    let mut unit = service.repository().begin().await?;
    assert!(unit.delete_balance(account).await?);
    unit.commit().await?;
    Ok(())
}

#[tokio::test]
async fn test_credit_seeds_missing_balance_row() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 0).await?;
    remove_balance_row(&service, alice).await?;

    service.credit(alice, 500).await?;

    let balance = service.get_balance(alice).await?;
    assert_eq!(balance.amount_cents, 500);
    assert_eq!(balance.version, 0);

    // A debit still needs the row to exist
    let bob = funded_account(&service, "bob", 0).await?;
    remove_balance_row(&service, bob).await?;
    let result = service.debit(bob, 1).await;
    assert!(matches!(result, Err(AppError::BalanceNotFound(id)) if id == bob));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_credits_seed_once() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let alice = funded_account(&service, "alice", 0).await?;
    remove_balance_row(&service, alice).await?;
    let service: Arc<LedgerService> = Arc::new(service);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = service.clone();
        handles.push(tokio::spawn(async move { service.credit(alice, 100).await }));
    }
    for handle in handles {
        handle.await??;
    }

    assert_eq!(amount_of(&service, alice).await?, 2000);
    assert_eq!(service.get_transaction_history(alice).await?.len(), 20);
    Ok(())
}

#[tokio::test]
async fn test_register_credit_transfer_walkthrough() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let first = funded_account(&service, "first", 0).await?;
    let second = funded_account(&service, "second", 0).await?;

    let credit = service.credit(first, 10000).await?;
    assert_eq!(credit.status, TransactionStatus::Completed);
    assert_eq!(amount_of(&service, first).await?, 10000);

    service.transfer(first, second, 4000).await?;

    assert_eq!(amount_of(&service, first).await?, 6000);
    assert_eq!(amount_of(&service, second).await?, 4000);
    Ok(())
}

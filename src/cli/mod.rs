use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::application::LedgerService;
use crate::config::Config;
use crate::domain::{
    AccountId, ENTITY_ACCOUNT, ENTITY_TRANSACTION, Transaction, TransactionId, format_cents,
    parse_cents, total_balance,
};
use crate::io::read_jobs_csv;
use crate::pool::Dispatcher;
use crate::telemetry;

/// ledgerd - money-movement ledger with an asynchronous worker pool
#[derive(Parser)]
#[command(name = "ledgerd")]
#[command(about = "A transactional ledger for credits, debits and transfers between accounts")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Add funds to an account from the bank
    Credit {
        /// Account ID
        account: AccountId,

        /// Amount to credit (e.g., "50.00" or "50")
        amount: String,
    },

    /// Remove funds from an account to the bank
    Debit {
        /// Account ID
        account: AccountId,

        /// Amount to debit (e.g., "50.00" or "50")
        amount: String,
    },

    /// Move funds between two accounts
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Sender account ID
        #[arg(long)]
        from: AccountId,

        /// Receiver account ID
        #[arg(long)]
        to: AccountId,
    },

    /// Show balance for an account or all accounts
    Balance {
        /// Account ID (omit for all accounts)
        account: Option<AccountId>,
    },

    /// List every transaction an account took part in
    History {
        /// Account ID
        account: AccountId,
    },

    /// Show detailed transaction information
    #[command(name = "show")]
    ShowTransaction {
        /// Transaction ID
        id: TransactionId,
    },

    /// Show the audit trail of a transaction or account
    Audit {
        /// Kind of entity
        #[arg(value_enum)]
        entity: AuditEntity,

        /// Entity ID
        id: i64,
    },

    /// Run a CSV file of jobs through the worker pool
    Submit {
        /// Input file (kind,from_account,to_account,amount; reads stdin if omitted)
        #[arg(short, long)]
        file: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Register a new account with an empty balance
    Register {
        /// Display name
        username: String,

        /// Unique e-mail address
        email: String,
    },

    /// Show account details
    Show {
        /// Account ID
        id: AccountId,
    },

    /// List all accounts
    List,

    /// Delete an account whose balance is zero
    Delete {
        /// Account ID
        id: AccountId,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AuditEntity {
    Transaction,
    Account,
}

impl AuditEntity {
    fn as_str(&self) -> &'static str {
        match self {
            AuditEntity::Transaction => ENTITY_TRANSACTION,
            AuditEntity::Account => ENTITY_ACCOUNT,
        }
    }
}

impl Cli {
    async fn connect(&self) -> Result<LedgerService> {
        LedgerService::connect(&self.config.database, self.config.max_connections)
            .await
            .with_context(|| {
                format!(
                    "Cannot open database '{}'. Run 'ledgerd init' first",
                    self.config.database
                )
            })
    }

    pub async fn run(self) -> Result<()> {
        self.config.validate()?;
        telemetry::init_logging(&self.config)?;

        if let Commands::Init = self.command {
            LedgerService::init(&self.config.database, self.config.max_connections).await?;
            println!("Database initialized: {}", self.config.database);
            return Ok(());
        }

        let service = self.connect().await?;

        match self.command {
            Commands::Init => {}

            Commands::Account(account_cmd) => {
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Credit { account, amount } => {
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let transaction = service.credit(account, amount_cents).await?;
                print_recorded(&transaction);
            }

            Commands::Debit { account, amount } => {
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let transaction = service.debit(account, amount_cents).await?;
                print_recorded(&transaction);
            }

            Commands::Transfer { amount, from, to } => {
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;
                let transaction = service.transfer(from, to, amount_cents).await?;
                print_recorded(&transaction);
            }

            Commands::Balance { account } => {
                run_balance_command(&service, account).await?;
            }

            Commands::History { account } => {
                run_history_command(&service, account).await?;
            }

            Commands::ShowTransaction { id } => {
                run_show_transaction_command(&service, id).await?;
            }

            Commands::Audit { entity, id } => {
                run_audit_command(&service, entity, id).await?;
            }

            Commands::Submit { file } => {
                let service = Arc::new(service);
                run_submit_command(&self.config, service.clone(), file).await?;
                service.repository().close().await;
            }
        }

        Ok(())
    }
}

async fn run_account_command(service: &LedgerService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Register { username, email } => {
            let account = service.register_account(&username, &email).await?;
            println!(
                "Registered account {}: {} <{}>",
                account.id, account.username, account.email
            );
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(id).await?;
            let balance = service.get_balance(id).await?;

            println!("Account: {}", account.id);
            println!("  Username:     {}", account.username);
            println!("  Email:        {}", account.email);
            println!(
                "  Created:      {}",
                account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  Balance:      {}", format_cents(balance.amount_cents));
            println!(
                "  Last updated: {}",
                balance.last_updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }

        AccountCommands::List => {
            let accounts = service.list_accounts().await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<8} {:<20} {:<30}", "ID", "USERNAME", "EMAIL");
                println!("{}", "-".repeat(60));
                for account in accounts {
                    println!(
                        "{:<8} {:<20} {:<30}",
                        account.id,
                        truncate(&account.username, 20),
                        truncate(&account.email, 30)
                    );
                }
            }
        }

        AccountCommands::Delete { id } => {
            service.delete_account(id).await?;
            println!("Deleted account {}", id);
        }
    }
    Ok(())
}

async fn run_balance_command(service: &LedgerService, account: Option<AccountId>) -> Result<()> {
    match account {
        Some(id) => {
            let balance = service.get_balance(id).await?;
            println!("Account {}: {}", id, format_cents(balance.amount_cents));
        }
        None => {
            let balances = service.list_balances().await?;
            if balances.is_empty() {
                println!("No balances found.");
            } else {
                println!("{:<8} {:>14} {:<20}", "ACCOUNT", "BALANCE", "UPDATED");
                println!("{}", "-".repeat(44));
                for balance in &balances {
                    println!(
                        "{:<8} {:>14} {:<20}",
                        balance.account_id,
                        format_cents(balance.amount_cents),
                        balance.last_updated_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
                println!("{}", "-".repeat(44));
                println!(
                    "{:<8} {:>14}",
                    "TOTAL",
                    format_cents(total_balance(&balances))
                );
            }
        }
    }
    Ok(())
}

async fn run_history_command(service: &LedgerService, account: AccountId) -> Result<()> {
    let transactions = service.get_transaction_history(account).await?;
    if transactions.is_empty() {
        println!("No transactions found for account {}.", account);
        return Ok(());
    }

    println!(
        "{:<8} {:<20} {:<10} {:>8} {:>8} {:>14}",
        "ID", "DATE", "KIND", "FROM", "TO", "AMOUNT"
    );
    println!("{}", "-".repeat(72));
    for transaction in transactions {
        println!(
            "{:<8} {:<20} {:<10} {:>8} {:>8} {:>14}",
            transaction.id,
            transaction.created_at.format("%Y-%m-%d %H:%M:%S"),
            transaction.kind,
            party(transaction.from_account),
            party(transaction.to_account),
            format_cents(transaction.amount_cents)
        );
    }
    Ok(())
}

async fn run_show_transaction_command(service: &LedgerService, id: TransactionId) -> Result<()> {
    let transaction = service.get_transaction(id).await?;

    println!("Transaction: {}", transaction.id);
    println!("  Kind:    {}", transaction.kind);
    println!("  Status:  {}", transaction.status);
    println!("  Amount:  {}", format_cents(transaction.amount_cents));
    println!("  From:    {}", party(transaction.from_account));
    println!("  To:      {}", party(transaction.to_account));
    println!(
        "  Date:    {}",
        transaction.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    Ok(())
}

async fn run_audit_command(service: &LedgerService, entity: AuditEntity, id: i64) -> Result<()> {
    let entries = service.audit_trail(entity.as_str(), id).await?;
    if entries.is_empty() {
        println!("No audit entries for {} {}.", entity.as_str(), id);
        return Ok(());
    }

    for entry in entries {
        println!(
            "{}  {:<10} {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.action,
            entry.details
        );
    }
    Ok(())
}

async fn run_submit_command(
    config: &Config,
    service: Arc<LedgerService>,
    file: Option<String>,
) -> Result<()> {
    use std::io::{Read, stdin};

    let mut data = String::new();
    match &file {
        Some(path) => {
            data = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read file: {}", path))?;
        }
        None => {
            stdin()
                .read_to_string(&mut data)
                .context("Failed to read from stdin")?;
        }
    }

    let batch = read_jobs_csv(data.as_bytes())?;
    for error in &batch.errors {
        eprintln!("  Skipped {}", error);
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling job dispatch");
            let _ = cancel_tx.send(true);
        }
    });

    let dispatcher = Dispatcher::start(config.pool_config(), service, cancel_rx);
    let total = batch.jobs.len();
    for job in batch.jobs {
        if let Err(e) = dispatcher.submit(job).await {
            warn!(error = %e, "dispatcher closed before all jobs were queued");
            break;
        }
    }
    info!(jobs = total, "all jobs queued, draining");

    let stats = dispatcher.shutdown().await;

    println!("Job run complete:");
    println!("  Read:       {}", total + batch.errors.len());
    println!("  Rejected:   {}", batch.errors.len());
    println!("  Submitted:  {}", stats.submitted);
    println!("  Succeeded:  {}", stats.succeeded);
    println!("  Failed:     {}", stats.failed);
    println!("  Discarded:  {}", stats.discarded);
    if stats.abandoned > 0 {
        println!("  Abandoned:  {}", stats.abandoned);
    }
    Ok(())
}

fn print_recorded(transaction: &Transaction) {
    println!(
        "Recorded {} {}: {} -> {} ({})",
        transaction.kind,
        format_cents(transaction.amount_cents),
        party(transaction.from_account),
        party(transaction.to_account),
        transaction.id
    );
}

fn party(account: Option<AccountId>) -> String {
    match account {
        Some(id) => id.to_string(),
        None => "bank".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

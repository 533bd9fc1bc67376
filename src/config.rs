use anyhow::{Result, bail};
use clap::{Args, ValueEnum};

use crate::pool::{DEFAULT_WORKERS, PoolConfig};

/// Deployment environment. Selects the log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Runtime settings shared by every command. Flags win over environment variables.
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Database file path
    #[arg(short, long, env = "LEDGERD_DATABASE", default_value = "ledgerd.db", global = true)]
    pub database: String,

    /// Deployment environment
    #[arg(
        long = "env",
        env = "LEDGERD_ENV",
        value_enum,
        default_value_t = Environment::Development,
        global = true
    )]
    pub environment: Environment,

    /// Log filter, e.g. "info" or "ledgerd=debug". RUST_LOG takes precedence.
    #[arg(long, env = "LEDGERD_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Number of workers in the job pool
    #[arg(long, env = "LEDGERD_WORKERS", default_value_t = DEFAULT_WORKERS, global = true)]
    pub workers: usize,

    /// Maximum number of database connections
    #[arg(long, env = "LEDGERD_MAX_CONNECTIONS", default_value_t = 10, global = true)]
    pub max_connections: u32,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            bail!("database path cannot be empty");
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.max_connections == 0 {
            bail!("max connections must be at least 1");
        }
        Ok(())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::with_workers(self.workers)
    }
}

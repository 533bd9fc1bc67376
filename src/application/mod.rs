// Application layer - use cases and orchestration.
// `LedgerService` owns the repository, the read-through cache and the audit sink;
// the ledger writer (transfer / credit / debit) lives in `ledger`.

mod audit;
pub mod error;
mod ledger;
mod service;

pub use audit::*;
pub use error::*;
pub use service::*;

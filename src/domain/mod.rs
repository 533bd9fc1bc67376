mod account;
mod audit;
mod balance;
mod money;
mod transaction;

pub use account::*;
pub use audit::*;
pub use balance::*;
pub use money::*;
pub use transaction::*;

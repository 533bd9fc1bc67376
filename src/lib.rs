pub mod application;
pub mod cache;
pub mod cli;
pub mod config;
pub mod domain;
pub mod io;
pub mod pool;
pub mod storage;
pub mod telemetry;

pub use domain::*;
pub use storage::Repository;

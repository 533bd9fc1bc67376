// Batch input for the worker pool.

mod jobs;

pub use jobs::*;

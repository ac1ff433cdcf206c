//! Shared utilities for Seal.

pub mod logging;
pub mod retry;

pub use logging::init_tracing;
pub use retry::RetryPolicy;

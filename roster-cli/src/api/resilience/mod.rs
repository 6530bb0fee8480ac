//! Resilience features for roster store calls
//!
//! Provides retry policies with backoff and per-request timeouts. These live
//! at the client boundary; the engine itself never retries.

pub mod config;
pub mod retry;

pub use config::{LogLevel, MonitoringConfig, ResilienceConfig};
pub use retry::{RetryConfig, RetryPolicy, RetryableError};

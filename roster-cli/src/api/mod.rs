//! Roster store API module
//!
//! Record types, the operations the engine issues, the client boundary trait
//! and its REST implementation, plus retry/timeout handling.

pub mod client;
pub mod models;
pub mod operations;
pub mod resilience;

pub use client::{HttpRosterClient, RosterClient};
pub use models::{Fields, Record, RecordId, SharedSnapshot, Snapshot};
pub use operations::Operation;
pub use resilience::{
    LogLevel, MonitoringConfig, ResilienceConfig, RetryConfig, RetryPolicy, RetryableError,
};

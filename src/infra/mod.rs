//! Infrastructure - configuration and run metrics
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults, overrides)
//! - `metrics` - Lock-free run counters

pub mod config;
pub mod metrics;

// Re-export commonly used types
pub use config::{Columns, Config, MalformedPolicy};
pub use metrics::{RunStats, RunSummary};

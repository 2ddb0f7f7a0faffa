//! Posture Common - Shared utilities: logging, configuration, payload digests
//!
//! This crate provides common functionality used by the agent and server binaries.

pub mod config;
pub mod digest;
pub mod logging;

pub use config::{Config, ConfigBuilder};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogFormat};

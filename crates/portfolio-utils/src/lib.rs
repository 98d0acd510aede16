//! Shared utilities for portfolio-rs
//!
//! This crate provides common functionality used across the portfolio-rs workspace,
//! including logging setup and application configuration.

pub mod config;
pub mod logging;

pub use config::{Config, LogFormat};
pub use logging::init_tracing_with;

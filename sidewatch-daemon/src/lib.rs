//! Sidewatch daemon library.
//!
//! Exposes the daemon modules for integration testing.
//! In production, `sidewatch` is used as a binary (main.rs).

pub mod cli;
pub mod http;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;

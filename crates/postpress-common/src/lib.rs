//! Shared infrastructure for postpress: configuration, error types, and
//! telemetry setup used by the renderer and the CLI.

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::{Config, RetryPolicy};
pub use error::PostpressError;

//! mirrorcache library
//!
//! A caching fetch engine for package mirrors. Concurrent requests for the
//! same file share one upstream download, clients stream the file while it
//! is still being written, interrupted downloads resume, and every transfer
//! can be held to a bandwidth ceiling.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

//! Command-line interface components
//!
//! Argument parsing, command handlers and the progress display of the
//! `mirrorcache` binary.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    expected_digest, CacheAction, CacheArgs, Cli, Commands, ConfigAction, ConfigArgs, FetchArgs,
    GetArgs, GlobalArgs, KindArg, ResourceArgs, VerifyArgs,
};
pub use commands::{
    build_orchestrator, handle_cache, handle_config, handle_fetch, handle_get, handle_verify,
};
pub use progress::{ProgressConfig, ProgressDisplay, TransferSummary};

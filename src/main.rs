//! mirrorcache CLI application
//!
//! Command-line front end of the caching fetch engine: prefetch files into
//! the cache, request them as a client would, verify cached copies and
//! manage configuration.

use std::process;

use tracing::info;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use mirrorcache::cli::{
    handle_cache, handle_config, handle_fetch, handle_get, handle_verify, Cli, Commands,
};
use mirrorcache::config::AppConfig;
use mirrorcache::constants::logging::CRATE_TARGET;
use mirrorcache::errors::{AppError, ConfigError, Result};

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Missing .env files are fine
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    let mut config = AppConfig::load(cli.global.config.clone()).await?;
    if let Some(cache_dir) = &cli.global.cache_dir {
        config.storage.cache_root = Some(cache_dir.clone());
    }

    init_logging(&cli, &config)?;

    info!("mirrorcache v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Fetch(args) => handle_fetch(args, &config).await,
        Commands::Get(args) => handle_get(args, &config).await,
        Commands::Verify(args) => handle_verify(args, &config).await,
        Commands::Cache(args) => handle_cache(args, &config).await,
        Commands::Config(args) => handle_config(args, &config).await,
    }
}

/// Initialize logging from verbosity flags and the configured level
fn init_logging(cli: &Cli, config: &AppConfig) -> Result<()> {
    let level = cli.log_filter(&config.logging.level);
    let directive = format!("{}={}", CRATE_TARGET, level)
        .parse::<Directive>()
        .map_err(|_| {
            AppError::from(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: level.clone(),
                reason: "Expected one of error, warn, info, debug, trace".to_string(),
            })
        })?;

    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
    Ok(())
}

//! Command handlers for the mirrorcache CLI
//!
//! Each handler builds the engine from the loaded [`AppConfig`], runs one
//! operation and prints a short report.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::fetch::parse_http_date;
use crate::app::{
    CacheStats, FetchOrchestrator, FsStorage, HttpUpstream, ResponseSink, StorageProvider,
};
use crate::app::storage::format_bytes;
use crate::cli::{
    CacheAction, CacheArgs, ConfigAction, ConfigArgs, FetchArgs, GetArgs, ProgressConfig,
    ProgressDisplay, VerifyArgs,
};
use crate::config::AppConfig;
use crate::constants::fetch::PROGRESS_CHANNEL_CAPACITY;
use crate::errors::{AppError, ConfigError, Result, StorageError};

/// Build the fetch engine from configuration
pub async fn build_orchestrator(config: &AppConfig) -> Result<FetchOrchestrator> {
    let (storage_config, upstream_config, fetch_config) = config.to_runtime_config();

    let storage: Arc<dyn StorageProvider> = Arc::new(FsStorage::new(&storage_config).await?);
    let upstream = Arc::new(HttpUpstream::new(&upstream_config)?);

    Ok(FetchOrchestrator::new(fetch_config, storage, upstream))
}

/// Handle the fetch command
///
/// Downloads the file into the cache with no client attached. Interrupting
/// with Ctrl-C leaves the partial file in place for the next attempt.
pub async fn handle_fetch(args: FetchArgs, config: &AppConfig) -> Result<()> {
    let resource = args.build_resource()?;
    let orchestrator = build_orchestrator(config).await?;
    info!("Fetching {} ({})", resource.id, resource.kind);

    let (sender, receiver) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let display = ProgressDisplay::new(
        ProgressConfig {
            enable_progress_bars: !args.no_progress,
            ..Default::default()
        },
        resource.id.file_name.clone(),
    )
    .spawn(receiver)?;

    let started = Instant::now();
    let status = tokio::select! {
        status = orchestrator.prefetch(&resource, Some(sender)) => status?,
        _ = tokio::signal::ctrl_c() => {
            println!("Interrupted; partial data is kept for the next attempt");
            return Err(AppError::generic("Fetch interrupted"));
        }
    };

    let summary = display
        .await
        .map_err(|e| AppError::generic(format!("Progress display failed: {}", e)))?;

    println!("{}: {}", resource.id, status);
    if summary.transferred > 0 {
        println!(
            "  Transferred {} in {:.1}s",
            format_bytes(summary.transferred),
            started.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

/// Handle the get command
///
/// Acts as a client of the engine: the response body goes to the output
/// file, the status line and headers to stdout.
pub async fn handle_get(args: GetArgs, config: &AppConfig) -> Result<()> {
    let resource = args.build_resource()?;
    let orchestrator = build_orchestrator(config).await?;

    let file = tokio::fs::File::create(&args.output)
        .await
        .map_err(StorageError::Io)?;
    let mut sink = ResponseSink::new(file).with_offset(args.offset);

    if let Some(value) = &args.if_modified_since {
        let since = parse_http_date(value).ok_or_else(|| ConfigError::InvalidValue {
            field: "if-modified-since".to_string(),
            value: value.clone(),
            reason: "Expected an HTTP date such as 'Sun, 06 Nov 1994 08:49:37 GMT'".to_string(),
        })?;
        sink = sink.with_if_modified_since(since);
    }

    let status = orchestrator.fetch(&resource, Some(&mut sink), None).await?;

    println!("HTTP {}", sink.status().unwrap_or(200));
    for (name, value) in sink.headers() {
        println!("{}: {}", name, value);
    }
    if let Some(length) = sink.content_length() {
        println!("Content-Length: {}", length);
    }
    info!("{} answered as {}", resource.id, status);

    Ok(())
}

/// Handle the verify command
pub async fn handle_verify(args: VerifyArgs, config: &AppConfig) -> Result<()> {
    let resource = args.build_resource()?;
    let orchestrator = build_orchestrator(config).await?;

    let report = match orchestrator.verify_cached(&resource, !args.keep).await {
        Some(report) => report,
        None => {
            warn!("Checksum integrity checking is disabled in the configuration");
            println!("Verification skipped: checksum_integrity_check is off");
            return Ok(());
        }
    };

    if report.files_missing > 0 {
        println!("{} is not in the cache", resource.id);
        return Ok(());
    }
    if report.files_skipped > 0 {
        println!("{} is being fetched, try again later", resource.id);
        return Ok(());
    }

    if report.is_successful() {
        println!("{}: OK ({:.2?})", resource.id, report.verification_time);
        return Ok(());
    }

    for failure in &report.failed_files {
        match &failure.actual {
            Some(actual) => println!("{}: {} (got {})", failure.resource, failure.reason, actual),
            None => println!("{}: {}", failure.resource, failure.reason),
        }
    }
    if !args.keep {
        println!("The cached copy was removed and will be fetched again on next use");
    }

    Err(StorageError::VerificationFailed {
        files_failed: report.files_failed,
    }
    .into())
}

/// Handle cache commands
pub async fn handle_cache(args: CacheArgs, config: &AppConfig) -> Result<()> {
    match args.action {
        CacheAction::Stats { json } => handle_cache_stats(json, config).await,
    }
}

async fn handle_cache_stats(json: bool, config: &AppConfig) -> Result<()> {
    let storage = FsStorage::new(&config.storage).await?;
    let stats = CacheStats::collect(storage.root(), &storage).await;

    if json {
        let rendered = serde_json::to_string_pretty(&stats)
            .map_err(|e| AppError::generic(format!("Could not render statistics: {}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("Cache Information");
    println!("=================");
    println!("Location: {}", stats.cache_root.display());
    println!(
        "Complete files: {} ({})",
        stats.full_files,
        format_bytes(stats.full_size)
    );
    println!(
        "Partial files: {} ({})",
        stats.partial_files,
        format_bytes(stats.partial_size)
    );
    println!("Total size: {}", stats.format_cache_size());

    Ok(())
}

/// Handle configuration commands
pub async fn handle_config(args: ConfigArgs, config: &AppConfig) -> Result<()> {
    match args.action {
        ConfigAction::Init { force, path } => {
            let written = AppConfig::init_config_file(path, force).await?;
            println!("Wrote {}", written.display());
            Ok(())
        }
        ConfigAction::Show => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

//! Progress display for a single transfer
//!
//! Consumes the [`TransferProgress`] events a fetch emits and renders them
//! with indicatif when stderr is a terminal. Elsewhere (pipes, CI logs) a
//! plain line is written at a fixed interval instead.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::storage::format_bytes;
use crate::app::TransferProgress;
use crate::errors::{AppError, Result};

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// How often text mode prints a line
    pub report_interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            report_interval: Duration::from_secs(5),
        }
    }
}

/// Totals observed by a finished display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    /// Events received
    pub events: u64,
    /// Bytes written during this run, excluding resumed bytes
    pub transferred: u64,
    /// Partial file size at the last event
    pub so_far: u64,
    pub total: Option<u64>,
}

impl TransferSummary {
    fn record(&mut self, progress: &TransferProgress) {
        self.events += 1;
        self.transferred += progress.new_bytes;
        self.so_far = progress.so_far;
        self.total = progress.total.or(self.total);
    }
}

/// Renders the progress of one transfer
pub struct ProgressDisplay {
    config: ProgressConfig,
    label: String,
    is_terminal: bool,
}

impl ProgressDisplay {
    /// Create a new progress display with the given configuration
    pub fn new(config: ProgressConfig, label: impl Into<String>) -> Self {
        Self {
            config,
            label: label.into(),
            is_terminal: atty::is(atty::Stream::Stderr),
        }
    }

    fn uses_bar(&self) -> bool {
        self.config.enable_progress_bars && self.is_terminal
    }

    fn bar(&self) -> Result<ProgressBar> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})")
                .map_err(|e| AppError::generic(format!("Progress bar template error: {}", e)))?
                .progress_chars("##-"),
        );
        bar.set_message(self.label.clone());
        Ok(bar)
    }

    /// Consume events until the sender side is dropped
    ///
    /// # Errors
    ///
    /// Returns an error if the progress bar cannot be set up.
    pub fn spawn(
        self,
        mut receiver: mpsc::Receiver<TransferProgress>,
    ) -> Result<JoinHandle<TransferSummary>> {
        let bar = if self.uses_bar() {
            Some(self.bar()?)
        } else {
            None
        };

        Ok(tokio::spawn(async move {
            let mut summary = TransferSummary::default();
            let mut last_report = Instant::now();

            while let Some(progress) = receiver.recv().await {
                summary.record(&progress);

                match &bar {
                    Some(bar) => {
                        if let Some(total) = progress.total {
                            bar.set_length(total);
                        }
                        bar.set_position(progress.so_far);
                    }
                    None => {
                        if last_report.elapsed() >= self.config.report_interval {
                            eprintln!("{}", self.describe(&progress));
                            last_report = Instant::now();
                        }
                    }
                }
            }

            if let Some(bar) = bar {
                bar.finish_and_clear();
            }
            debug!("Progress for {} finished after {} events", self.label, summary.events);
            summary
        }))
    }

    /// One line describing `progress`
    pub fn describe(&self, progress: &TransferProgress) -> String {
        match (progress.total, progress.fraction()) {
            (Some(total), Some(fraction)) => format!(
                "{}: {} / {} ({:.1}%)",
                self.label,
                format_bytes(progress.so_far),
                format_bytes(total),
                fraction * 100.0
            ),
            _ => format!("{}: {}", self.label, format_bytes(progress.so_far)),
        }
    }
}

// Ingestion progress reporting

use super::ingestor::IngestSummary;
use crate::types::CertFinderError;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

/// Receives ingestion progress. Called from a single task, in order.
pub trait ProgressReporter: Send + Sync {
    fn started(&self, _log_url: &str, _total: u64) {}

    fn advanced(&self, processed: u64, total: u64);

    fn entry_failed(&self, _index: u64, _error: &CertFinderError) {}

    fn finished(&self, _summary: &IngestSummary) {}
}

/// Terminal progress bar
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] {wide_bar} Progress: {pos}/{len} ({per_sec})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());

        let bar = ProgressBar::new(0);
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for BarReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for BarReporter {
    fn started(&self, log_url: &str, total: u64) {
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_message(log_url.to_string());
    }

    fn advanced(&self, processed: u64, _total: u64) {
        self.bar.set_position(processed);
    }

    fn finished(&self, summary: &IngestSummary) {
        self.bar.finish_with_message(format!(
            "{}: {} stored, {} unparsed",
            summary.log_url, summary.stored, summary.failed
        ));
    }
}

/// Periodic log lines instead of a bar, for silent or non-interactive runs.
pub struct LogReporter {
    every: u64,
}

impl LogReporter {
    pub fn new(every: u64) -> Self {
        Self { every: every.max(1) }
    }
}

impl ProgressReporter for LogReporter {
    fn started(&self, log_url: &str, total: u64) {
        info!("Downloading {} ({} entries)", log_url, total);
    }

    fn advanced(&self, processed: u64, total: u64) {
        if processed % self.every == 0 || processed == total {
            info!("Progress: {}/{}", processed, total);
        }
    }
}

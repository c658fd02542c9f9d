// CT Log Ingestor
//
// Pulls every entry of a log in fixed size batches with a bounded number of
// concurrent fetchers. Outcomes are funnelled through one channel to a single
// consumer that owns the counters, writes to the store and reports progress.

use super::client::{CtClient, RawLogEntry};
use super::decoder::{DecodedEntry, EntryDecoder, X509EntryDecoder};
use super::progress::ProgressReporter;
use crate::error::Result;
use crate::store::NameStore;
use crate::types::{CertFinderError, IngestConfig};
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Largest batch CT logs are expected to serve
const MAX_BATCH_SIZE: u64 = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub log_url: String,
    pub tree_size: u64,
    pub attempted: u64,
    pub decoded: u64,
    pub failed: u64,
    pub stored: u64,
    pub store_errors: u64,
    pub duration: Duration,
}

struct EntryOutcome {
    index: u64,
    result: Result<DecodedEntry>,
}

pub struct Ingestor {
    client: CtClient,
    store: NameStore,
    decoder: Arc<dyn EntryDecoder>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(client: CtClient, store: NameStore, config: IngestConfig) -> Self {
        Self {
            client,
            store,
            decoder: Arc::new(X509EntryDecoder),
            config,
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn EntryDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Ingest every entry of one log. Only the tree size probe is fatal;
    /// anything going wrong per entry is counted and the scan carries on.
    pub async fn ingest(&self, log_url: &str, reporter: &dyn ProgressReporter) -> Result<IngestSummary> {
        let started = Instant::now();
        let tree_size = self
            .client
            .get_tree_size(log_url, self.config.probe_timeout)
            .await?;

        info!("Downloading {} ({} entries)", log_url, tree_size);
        reporter.started(log_url, tree_size);

        let batch_size = self.config.batch_size.clamp(1, MAX_BATCH_SIZE);
        let ranges = batch_ranges(tree_size, batch_size);
        let (tx, mut rx) = mpsc::channel::<EntryOutcome>(batch_size as usize);

        let producer = {
            let client = self.client.clone();
            let decoder = Arc::clone(&self.decoder);
            let url = log_url.to_string();
            let workers = self.config.workers.max(1);

            tokio::spawn(async move {
                stream::iter(ranges)
                    .for_each_concurrent(workers, |(start, end)| {
                        let client = client.clone();
                        let decoder = Arc::clone(&decoder);
                        let url = url.clone();
                        let tx = tx.clone();
                        async move { fetch_batch(&client, decoder.as_ref(), &url, start, end, &tx).await }
                    })
                    .await;
            })
        };

        let mut summary = IngestSummary {
            log_url: log_url.to_string(),
            tree_size,
            ..Default::default()
        };

        while let Some(outcome) = rx.recv().await {
            summary.attempted += 1;

            match outcome.result {
                Ok(entry) => {
                    summary.decoded += 1;
                    if let Some(name) = entry.common_name {
                        match self.store.append(&name).await {
                            Ok(_) => summary.stored += 1,
                            Err(e) => {
                                warn!("Entry {}: {}", outcome.index, e);
                                summary.store_errors += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    debug!("Process entry at index {}: <unparsed: {}>", outcome.index, e);
                    reporter.entry_failed(outcome.index, &e);
                }
            }

            reporter.advanced(summary.attempted, tree_size);
        }

        producer
            .await
            .map_err(|e| CertFinderError::Unknown(anyhow::anyhow!("batch fetcher failed: {}", e)))?;

        summary.duration = started.elapsed();
        info!(
            "Finished {}: {}/{} entries, {} names stored, {} unparsed, {} store errors",
            log_url, summary.attempted, tree_size, summary.stored, summary.failed, summary.store_errors
        );
        reporter.finished(&summary);
        Ok(summary)
    }

    /// Ingest several logs one after another. A log whose probe fails is
    /// skipped with a warning.
    pub async fn ingest_all(&self, log_urls: &[String], reporter: &dyn ProgressReporter) -> Vec<IngestSummary> {
        let mut summaries = Vec::with_capacity(log_urls.len());
        for url in log_urls {
            match self.ingest(url, reporter).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => warn!("Skipping {}: {}", url, e),
            }
        }
        summaries
    }
}

/// Inclusive `(start, end)` index ranges covering `0..tree_size`.
pub fn batch_ranges(tree_size: u64, batch_size: u64) -> Vec<(u64, u64)> {
    let batch_size = batch_size.max(1);
    (0..tree_size)
        .step_by(batch_size as usize)
        .map(|start| (start, (start + batch_size).min(tree_size) - 1))
        .collect()
}

/// Fetch and decode `start..=end`, sending exactly one outcome per index.
async fn fetch_batch(
    client: &CtClient,
    decoder: &dyn EntryDecoder,
    log_url: &str,
    start: u64,
    end: u64,
    tx: &mpsc::Sender<EntryOutcome>,
) {
    let mut next = start;

    while next <= end {
        let entries: Vec<RawLogEntry> = match client.get_entries(log_url, next, end).await {
            Ok(entries) if !entries.is_empty() => entries,
            Ok(_) => {
                warn!("{} returned no entries for {}-{}", log_url, next, end);
                break;
            }
            Err(e) => {
                warn!("Failed to fetch entries {}-{} from {}: {}", next, end, log_url, e);
                break;
            }
        };

        for entry in entries.iter().take((end - next + 1) as usize) {
            let outcome = EntryOutcome {
                index: next,
                result: decoder.decode(next, entry),
            };
            if tx.send(outcome).await.is_err() {
                return;
            }
            next += 1;
        }
    }

    // Whatever the log never handed over still counts as attempted
    while next <= end {
        let outcome = EntryOutcome {
            index: next,
            result: Err(CertFinderError::DecodeError {
                index: next,
                message: "entry not retrieved".to_string(),
            }),
        };
        if tx.send(outcome).await.is_err() {
            return;
        }
        next += 1;
    }
}

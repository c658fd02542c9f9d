// src/engine.rs
use crate::dedup::extract_subdomains;
use crate::output::OutputManager;
use crate::resolver::Resolver;
use crate::session::Session;
use crate::sources::Source;
use crate::types::{CertFinderError, CertificateRecord, Config, RunStats};
use crate::utils::sanitize_domain;
use log::{debug, info};
use std::io::Write;
use std::time::Instant;

/// Where a harvesting run currently is. States are only ever moved forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Fetching,
    Deduplicating,
    Resolving,
    Draining,
    Done,
    Failed,
}

pub struct CertFinderEngine {
    config: Config,
    session: Session,
    source: Box<dyn Source>,
    resolver: Resolver,
    output: OutputManager,
    state: PipelineState,
}

impl CertFinderEngine {
    pub fn new(config: Config, source: Box<dyn Source>) -> Result<Self, CertFinderError> {
        let session = Session::new(&config)?;
        let resolver = Resolver::new(&config.resolver)?;
        let output = OutputManager::new(config.output.clone());

        Ok(Self {
            config,
            session,
            source,
            resolver,
            output,
            state: PipelineState::Idle,
        })
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Harvest, deduplicate and optionally resolve the subdomains of
    /// `domain`, writing to the configured destination. The destination is
    /// only opened once fetching has succeeded, so a failed run leaves an
    /// existing output file untouched.
    pub async fn run(&mut self, domain: &str) -> Result<RunStats, CertFinderError> {
        let started = Instant::now();
        let (mut stats, subdomains) = self.collect(domain).await?;

        let mut writer = self.output.open_target()?;
        self.emit(&mut writer, subdomains, &mut stats).await?;
        stats.duration = started.elapsed();

        if let Some(path) = self.output.target_path() {
            info!("Results written to: {}", path.display());
        }
        Ok(stats)
    }

    pub async fn run_to<W: Write>(&mut self, domain: &str, writer: &mut W) -> Result<RunStats, CertFinderError> {
        let started = Instant::now();
        let (mut stats, subdomains) = self.collect(domain).await?;

        self.emit(writer, subdomains, &mut stats).await?;
        stats.duration = started.elapsed();
        Ok(stats)
    }

    /// Fetching and deduplication. Nothing is written yet.
    async fn collect(&mut self, domain: &str) -> Result<(RunStats, Vec<String>), CertFinderError> {
        let started = Instant::now();

        self.transition(PipelineState::Fetching);
        let (pattern, records) = match self.fetch(domain).await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.transition(PipelineState::Failed);
                return Err(e);
            }
        };

        self.transition(PipelineState::Deduplicating);
        let subdomains = extract_subdomains(&records);
        info!(
            "{} unique subdomains out of {} records for {}",
            subdomains.len(),
            records.len(),
            domain
        );

        let stats = RunStats {
            domain: domain.to_string(),
            pattern,
            records_fetched: records.len(),
            unique_subdomains: subdomains.len(),
            resolved_count: 0,
            duration: started.elapsed(),
        };
        Ok((stats, subdomains))
    }

    async fn emit<W: Write>(
        &mut self,
        writer: &mut W,
        subdomains: Vec<String>,
        stats: &mut RunStats,
    ) -> Result<(), CertFinderError> {
        if self.resolver.is_enabled() {
            self.transition(PipelineState::Resolving);
            let results = self.resolver.resolve_stream(subdomains);

            self.transition(PipelineState::Draining);
            let (_, resolved) = self.output.write_results(writer, results).await?;
            stats.resolved_count = resolved;
        } else {
            self.output.write_names(writer, &subdomains)?;
        }

        self.transition(PipelineState::Done);
        Ok(())
    }

    async fn fetch(&self, domain: &str) -> Result<(String, Vec<CertificateRecord>), CertFinderError> {
        let pattern = sanitize_domain(domain)?;
        info!("Querying {} for {}", self.source.name(), pattern);
        let records = self.source.fetch(&pattern, &self.session).await?;
        Ok((pattern, records))
    }
}

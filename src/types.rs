// src/types.rs
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub timeout: Duration,
    pub user_agent: String,
    pub aggregator_url: String,
    pub log_list_url: String,
    /// Log pulled for an empty answer; picked from the catalog when unset
    pub default_log_url: Option<String>,
    pub database_path: PathBuf,
    pub rate_limits: HashMap<String, Option<u32>>,
    pub output: OutputConfig,
    pub resolver: ResolverConfig,
    pub ingest: IngestConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut rate_limits = HashMap::new();
        rate_limits.insert("ctlog".to_string(), Some(20));

        Self {
            timeout: Duration::from_secs(10),
            user_agent: format!("certfinder/{}", env!("CARGO_PKG_VERSION")),
            aggregator_url: "https://crt.sh/".to_string(),
            log_list_url: "https://www.gstatic.com/ct/log_list/v3/log_list.json".to_string(),
            default_log_url: None,
            database_path: PathBuf::from("data.db"),
            rate_limits,
            output: OutputConfig::default(),
            resolver: ResolverConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<PathBuf>,
    pub silent: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            silent: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Csv,
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub enabled: bool,
    pub concurrency: usize,
    pub timeout: Duration,
    pub nameservers: Vec<String>,
    pub use_system_resolver: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            concurrency: 50,
            timeout: Duration::from_secs(5),
            nameservers: vec![
                "8.8.8.8:53".to_string(),
                "1.1.1.1:53".to_string(),
            ],
            use_system_resolver: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub batch_size: u64,
    pub workers: usize,
    pub probe_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            workers: 12,
            probe_timeout: Duration::from_secs(2),
        }
    }
}

/// One certificate as reported by the aggregator feed.
///
/// Only `name_value` is consumed downstream; the remaining fields are kept so
/// callers can filter on issuer or validity later. The feed emits `null` for
/// fields it has no value for, which decodes to the field default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CertificateRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub issuer_ca_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issuer_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name_value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub min_cert_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub min_entry_timestamp: String,
    /// Newer feed layout, replacing `min_entry_timestamp`
    #[serde(default, deserialize_with = "null_as_default")]
    pub entry_timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_after: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub not_before: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl CertificateRecord {
    /// Wraps a bare name (e.g. a stored row) so it can flow through the same
    /// dedup path as aggregator records.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            name_value: name.into(),
            ..Default::default()
        }
    }

    /// Candidate subdomain names carried by this record, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.name_value
            .lines()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    pub fn first_seen(&self) -> Option<NaiveDateTime> {
        [&self.min_entry_timestamp, &self.entry_timestamp]
            .into_iter()
            .map(|raw| raw.trim())
            .find(|raw| !raw.is_empty())
            .and_then(|raw| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionResult {
    pub subdomain: String,
    pub address: Option<Ipv4Addr>,
}

impl ResolutionResult {
    pub fn unresolved(subdomain: impl Into<String>) -> Self {
        Self {
            subdomain: subdomain.into(),
            address: None,
        }
    }

    pub fn address_string(&self) -> String {
        self.address.map(|ip| ip.to_string()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStatus {
    Available,
    Unavailable,
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogStatus::Available => write!(f, "available"),
            LogStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDescriptor {
    pub index: usize,
    pub url: String,
    pub description: String,
    pub tree_size: u64,
    pub status: LogStatus,
    /// Usable and, for sharded logs, inside its temporal window
    pub accepting: bool,
}

impl LogDescriptor {
    pub fn is_available(&self) -> bool {
        self.status == LogStatus::Available
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredName {
    pub id: i64,
    pub subdomain: String,
}

#[derive(Debug, Clone)]
pub struct RunStats {
    pub domain: String,
    pub pattern: String,
    pub records_fetched: usize,
    pub unique_subdomains: usize,
    pub resolved_count: usize,
    pub duration: Duration,
}

#[derive(Debug, Error)]
pub enum CertFinderError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request timed out: {0}")]
    TimeoutError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unexpected status code returned: {0}")]
    UnexpectedStatus(u16),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Failed to decode entry {index}: {message}")]
    DecodeError { index: u64, message: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Resolution error: {0}")]
    ResolutionError(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

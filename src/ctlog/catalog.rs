// CT Log Catalog
//
// Fetches the list of known logs, probes each for its size and handles the
// operator's choice of which logs to pull.

use super::client::CtClient;
use crate::error::Result;
use crate::session::Session;
use crate::types::{CertFinderError, LogDescriptor, LogStatus};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::time::Duration;

/// Log list document. Both the v3 (`operators[].logs[]`) and the older flat
/// (`logs[]`) layouts are accepted.
#[derive(Debug, Default, Deserialize)]
struct LogList {
    #[serde(default)]
    operators: Vec<Operator>,
    #[serde(default)]
    logs: Vec<LogListEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct Operator {
    #[serde(default)]
    logs: Vec<LogListEntry>,
}

#[derive(Debug, Deserialize)]
struct LogListEntry {
    #[serde(default)]
    description: String,
    url: String,
    /// Single key naming the lifecycle state, e.g. `{"usable": {..}}`
    #[serde(default)]
    state: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    temporal_interval: Option<TemporalInterval>,
}

/// Sharded logs only take certificates expiring inside this window.
#[derive(Debug, Deserialize)]
struct TemporalInterval {
    start_inclusive: DateTime<Utc>,
    end_exclusive: DateTime<Utc>,
}

impl LogListEntry {
    fn accepts_at(&self, now: DateTime<Utc>) -> bool {
        let state_ok = self
            .state
            .as_ref()
            .map_or(true, |state| state.contains_key("usable") || state.contains_key("qualified"));
        let window_ok = self
            .temporal_interval
            .as_ref()
            .map_or(true, |window| window.start_inclusive <= now && now < window.end_exclusive);
        state_ok && window_ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Empty answer: the configured default log
    Default,
    /// Every available log
    All,
    /// One log by catalog index
    One(usize),
    /// Stop asking
    Quit,
}

#[derive(Debug, Clone, Default)]
pub struct LogCatalog {
    logs: Vec<LogDescriptor>,
}

impl LogCatalog {
    pub fn new(logs: Vec<LogDescriptor>) -> Self {
        Self { logs }
    }

    /// Download the registry and probe every listed log. The registry
    /// request is fatal on failure; a failed probe only marks the log
    /// unavailable.
    pub async fn fetch(
        session: &Session,
        client: &CtClient,
        registry_url: &str,
        probe_timeout: Duration,
    ) -> Result<Self> {
        info!("Fetching CT log list from {}", registry_url);
        let list: LogList = session.get_json(registry_url).await?;

        let entries: Vec<LogListEntry> = list
            .operators
            .into_iter()
            .flat_map(|operator| operator.logs)
            .chain(list.logs)
            .collect();
        debug!("{} logs listed", entries.len());
        let now = Utc::now();

        let probes = entries.iter().map(|entry| {
            let url = normalize_log_url(&entry.url);
            async move {
                let probe = client.get_tree_size(&url, probe_timeout).await;
                (url, probe)
            }
        });

        let logs = join_all(probes)
            .await
            .into_iter()
            .zip(entries.iter())
            .enumerate()
            .map(|(index, ((url, probe), entry))| {
                let (tree_size, status) = match probe {
                    Ok(size) => (size, LogStatus::Available),
                    Err(e) => {
                        debug!("{} is unavailable: {}", url, e);
                        (0, LogStatus::Unavailable)
                    }
                };
                LogDescriptor {
                    index,
                    url,
                    description: entry.description.clone(),
                    tree_size,
                    status,
                    accepting: entry.accepts_at(now),
                }
            })
            .collect();

        Ok(Self { logs })
    }

    pub fn logs(&self) -> &[LogDescriptor] {
        &self.logs
    }

    pub fn get(&self, index: usize) -> Option<&LogDescriptor> {
        self.logs.get(index)
    }

    pub fn available(&self) -> impl Iterator<Item = &LogDescriptor> {
        self.logs.iter().filter(|log| log.is_available())
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    /// Log pulled for an empty answer: the configured URL if any, otherwise
    /// the first reachable log still accepting new entries.
    pub fn default_log(&self, configured: Option<&str>) -> Option<String> {
        match configured {
            Some(url) => Some(normalize_log_url(url)),
            None => self
                .available()
                .find(|log| log.accepting)
                .map(|log| log.url.clone()),
        }
    }

    /// Validate one answer to the selection prompt.
    pub fn parse_selection(&self, input: &str) -> Result<Selection> {
        let answer = input.trim();

        match answer {
            "" => return Ok(Selection::Default),
            "all" => return Ok(Selection::All),
            "q" | "quit" => return Ok(Selection::Quit),
            _ => {}
        }

        let index: usize = answer
            .parse()
            .map_err(|_| CertFinderError::InvalidSelection("answer is invalid".to_string()))?;

        match self.logs.get(index) {
            Some(log) if log.is_available() => Ok(Selection::One(index)),
            Some(_) => Err(CertFinderError::InvalidSelection("log is unavailable".to_string())),
            None if self.logs.is_empty() => {
                Err(CertFinderError::InvalidSelection("no logs are listed".to_string()))
            }
            None => Err(CertFinderError::InvalidSelection(format!(
                "select between 0-{}",
                self.logs.len() - 1
            ))),
        }
    }

    /// Ask until a valid answer is given. End of input counts as `Quit`.
    pub fn prompt_selection<R: BufRead, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        default_url: Option<&str>,
    ) -> Result<Selection> {
        let upper = self.logs.len().saturating_sub(1);

        loop {
            write!(
                writer,
                "Select log (default '{}') [all | 0-{} | q]: ",
                default_url.unwrap_or("none"),
                upper
            )
                .and_then(|_| writer.flush())
                .map_err(|e| CertFinderError::OutputError(e.to_string()))?;

            let mut line = String::new();
            let read = reader
                .read_line(&mut line)
                .map_err(|e| CertFinderError::OutputError(format!("Failed to read selection: {}", e)))?;
            if read == 0 {
                return Ok(Selection::Quit);
            }

            match self.parse_selection(&line) {
                Ok(Selection::Default) if default_url.is_none() => {
                    writeln!(writer, "no default log, pick one")
                        .map_err(|e| CertFinderError::OutputError(e.to_string()))?;
                }
                Ok(selection) => return Ok(selection),
                Err(CertFinderError::InvalidSelection(reason)) => {
                    writeln!(writer, "{}", reason).map_err(|e| CertFinderError::OutputError(e.to_string()))?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Log URLs a selection stands for.
    pub fn urls_for(&self, selection: &Selection, default_url: Option<&str>) -> Vec<String> {
        match selection {
            Selection::Default => default_url.map(str::to_string).into_iter().collect(),
            Selection::All => self.available().map(|log| log.url.clone()).collect(),
            Selection::One(index) => self.get(*index).map(|log| log.url.clone()).into_iter().collect(),
            Selection::Quit => Vec::new(),
        }
    }
}

/// `ct.example.com/log` -> `https://ct.example.com/log/`
pub fn normalize_log_url(url: &str) -> String {
    let url = url.trim();
    let mut normalized = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

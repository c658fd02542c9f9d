// CT Log API Client
//
// Signed tree head probe and paginated entry retrieval (RFC 6962 section 4)

use crate::error::Result;
use crate::session::Session;
use crate::types::CertFinderError;
use log::{debug, warn};
use serde::Deserialize;
use std::time::Duration;

/// Maximum number of attempts for an entry fetch
const MAX_RETRIES: u32 = 3;

/// Initial backoff duration (doubled with each retry)
const INITIAL_BACKOFF_MS: u64 = 100;

/// Maximum backoff duration
const MAX_BACKOFF_MS: u64 = 5000;

/// Rate limiter key for entry fetches
const RATE_LIMIT_KEY: &str = "ctlog";

#[derive(Clone)]
pub struct CtClient {
    session: Session,
}

impl CtClient {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Current number of entries in the log, from its signed tree head.
    /// Not retried: an unreachable log is simply reported as such.
    pub async fn get_tree_size(&self, log_url: &str, timeout: Duration) -> Result<u64> {
        let url = format!("{}/ct/v1/get-sth", log_url.trim_end_matches('/'));

        let response = self.session.get_with_timeout(&url, timeout).await?;
        let sth: SignedTreeHead = response.json().await.map_err(|e| {
            CertFinderError::ParseError(format!("Failed to parse STH response from {}: {}", url, e))
        })?;

        Ok(sth.tree_size)
    }

    /// Entries `start..=end`. Logs may answer with fewer entries than asked.
    pub async fn get_entries(&self, log_url: &str, start: u64, end: u64) -> Result<Vec<RawLogEntry>> {
        let url = format!(
            "{}/ct/v1/get-entries?start={}&end={}",
            log_url.trim_end_matches('/'),
            start,
            end
        );

        debug!("Fetching entries {}-{} from {}", start, end, log_url);
        self.session.wait_for_rate_limit(RATE_LIMIT_KEY).await;

        let response = self.retry_request(&url).await?;
        let entries: EntriesResponse = response.json().await.map_err(|e| {
            CertFinderError::ParseError(format!("Failed to parse entries response: {}", e))
        })?;

        Ok(entries.entries)
    }

    /// GET with exponential backoff on rate limiting, server errors and
    /// transport failures. Other client errors fail immediately.
    async fn retry_request(&self, url: &str) -> Result<reqwest::Response> {
        let mut backoff = Duration::from_millis(INITIAL_BACKOFF_MS);
        let mut attempt = 1;

        loop {
            let err = match self.session.get(url).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            let retriable = match &err {
                CertFinderError::UnexpectedStatus(status) => *status == 429 || *status >= 500,
                CertFinderError::TimeoutError(_) | CertFinderError::NetworkError(_) => true,
                _ => false,
            };

            if !retriable || attempt >= MAX_RETRIES {
                return Err(err);
            }

            warn!(
                "{}, retrying after {:?} (attempt {}/{})",
                err, backoff, attempt, MAX_RETRIES
            );
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, Duration::from_millis(MAX_BACKOFF_MS));
            attempt += 1;
        }
    }
}

/// Signed Tree Head response
#[derive(Debug, Deserialize)]
struct SignedTreeHead {
    tree_size: u64,
}

/// Get-entries API response
#[derive(Debug, Deserialize)]
struct EntriesResponse {
    entries: Vec<RawLogEntry>,
}

/// Individual CT log entry, still base64 encoded
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawLogEntry {
    pub leaf_input: String,
    #[serde(default)]
    pub extra_data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Config;
    use mockito::Matcher;

    fn client() -> CtClient {
        CtClient::new(Session::new(&Config::default()).unwrap())
    }

    #[tokio::test]
    async fn test_get_tree_size() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/log/ct/v1/get-sth")
            .with_body(r#"{"tree_size":42,"timestamp":1,"sha256_root_hash":"x","tree_head_signature":"y"}"#)
            .create_async()
            .await;

        let size = client()
            .get_tree_size(&format!("{}/log/", server.url()), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(size, 42);
    }

    #[tokio::test]
    async fn test_get_entries_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("GET", "/ct/v1/get-entries")
            .match_query(Matcher::Any)
            .with_status(500)
            .expect(MAX_RETRIES as usize)
            .create_async()
            .await;

        let result = client().get_entries(&server.url(), 0, 9).await;
        assert!(matches!(result, Err(CertFinderError::UnexpectedStatus(500))));
        failing.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_entries_does_not_retry_client_errors() {
        let mut server = mockito::Server::new_async().await;
        let rejected = server
            .mock("GET", "/ct/v1/get-entries")
            .match_query(Matcher::Any)
            .with_status(400)
            .expect(1)
            .create_async()
            .await;

        let result = client().get_entries(&server.url(), 0, 9).await;
        assert!(matches!(result, Err(CertFinderError::UnexpectedStatus(400))));
        rejected.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_entries_parses_page() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/ct/v1/get-entries")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "5".into()),
                Matcher::UrlEncoded("end".into(), "6".into()),
            ]))
            .with_body(r#"{"entries":[{"leaf_input":"AA==","extra_data":""},{"leaf_input":"AQ=="}]}"#)
            .create_async()
            .await;

        let entries = client().get_entries(&server.url(), 5, 6).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].leaf_input, "AQ==");
        assert_eq!(entries[1].extra_data, "");
    }
}

// src/sources/crtsh.rs
use crate::session::Session;
use crate::sources::Source;
use crate::types::{CertFinderError, CertificateRecord};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Deserialize;
use url::Url;

/// One top-level JSON value of the aggregator feed. The feed is normally a
/// single array but has been seen emitting bare objects back to back.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedChunk {
    Many(Vec<CertificateRecord>),
    One(CertificateRecord),
}

/// crt.sh certificate transparency aggregator
#[derive(Debug, Clone)]
pub struct CrtShSource {
    name: String,
    base_url: String,
}

impl CrtShSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            name: "crt".to_string(),
            base_url: base_url.to_string(),
        }
    }

    pub fn query_url(&self, pattern: &str) -> Result<Url, CertFinderError> {
        Url::parse_with_params(&self.base_url, &[("q", pattern), ("output", "json")])
            .map_err(|e| CertFinderError::ConfigError(format!("Invalid aggregator URL {}: {}", self.base_url, e)))
    }
}

#[async_trait]
impl Source for CrtShSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, pattern: &str, session: &Session) -> Result<Vec<CertificateRecord>, CertFinderError> {
        let url = self.query_url(pattern)?;
        debug!("Querying {}", url);

        let response = session.get(url.as_str()).await?;
        let body = response
            .text()
            .await
            .map_err(|e| CertFinderError::NetworkError(e.to_string()))?;

        let records = decode_records(&body);
        info!("{}: {} certificate records for {}", self.name, records.len(), pattern);
        Ok(records)
    }
}

/// Decode an aggregator body. Anything that cannot be repaired yields an
/// empty list instead of an error.
pub fn decode_records(body: &str) -> Vec<CertificateRecord> {
    let body = body.trim();
    if body.is_empty() {
        return Vec::new();
    }

    let strict_err = match serde_json::from_str::<Vec<CertificateRecord>>(body) {
        Ok(records) => return records,
        Err(e) => e,
    };

    // `{..},{..}` without the enclosing brackets
    if body.starts_with('{') {
        if let Ok(records) = serde_json::from_str::<Vec<CertificateRecord>>(&format!("[{}]", body)) {
            debug!("Recovered {} records from comma separated objects", records.len());
            return records;
        }
    }

    // `{..}{..}` or values separated only by whitespace
    match decode_concatenated(body) {
        Ok(records) => {
            debug!("Recovered {} records from concatenated objects", records.len());
            records
        }
        Err(e) => {
            warn!("Failed to decode aggregator response: {} ({})", strict_err, e);
            Vec::new()
        }
    }
}

fn decode_concatenated(body: &str) -> Result<Vec<CertificateRecord>, serde_json::Error> {
    let mut records = Vec::new();
    for chunk in serde_json::Deserializer::from_str(body).into_iter::<FeedChunk>() {
        match chunk? {
            FeedChunk::Many(many) => records.extend(many),
            FeedChunk::One(one) => records.push(one),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD_A: &str = r#"{"issuer_ca_id":16418,"issuer_name":"C=US, O=Let's Encrypt, CN=R3","name_value":"a.example.com","min_cert_id":325717795,"min_entry_timestamp":"2018-02-08T16:47:39.089","not_before":"2018-02-08T15:47:39","not_after":"2018-05-09T15:47:39"}"#;
    const RECORD_B: &str = r#"{"issuer_ca_id":16418,"name_value":"b.example.com","min_cert_id":1}"#;

    fn names(records: &[CertificateRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name_value.as_str()).collect()
    }

    #[test]
    fn test_query_url_escapes_wildcard() {
        let source = CrtShSource::new("https://crt.sh/");
        let url = source.query_url("%.example.com").unwrap();
        assert_eq!(url.as_str(), "https://crt.sh/?q=%25.example.com&output=json");
    }

    #[test]
    fn test_decode_array() {
        let body = format!("[{},{}]", RECORD_A, RECORD_B);
        let records = decode_records(&body);
        assert_eq!(names(&records), vec!["a.example.com", "b.example.com"]);
        assert_eq!(records[0].issuer_ca_id, 16418);
        assert_eq!(records[0].min_cert_id, 325717795);
        assert!(records[0].first_seen().is_some());
        assert!(records[1].first_seen().is_none());
    }

    #[test]
    fn test_decode_concatenated_objects() {
        let body = format!("{}{}", RECORD_A, RECORD_B);
        assert_eq!(names(&decode_records(&body)), vec!["a.example.com", "b.example.com"]);

        let body = format!("{}\n{}\n", RECORD_A, RECORD_B);
        assert_eq!(names(&decode_records(&body)), vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_decode_comma_separated_objects() {
        let body = format!("{},{}", RECORD_A, RECORD_B);
        assert_eq!(names(&decode_records(&body)), vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn test_decode_null_fields() {
        let body = r#"[{"issuer_name":"R3","name_value":"a.example.com"},
            {"issuer_ca_id":null,"issuer_name":null,"name_value":"b.example.com","not_after":null}]"#;
        let records = decode_records(body);
        assert_eq!(names(&records), vec!["a.example.com", "b.example.com"]);
        assert_eq!(records[1].issuer_name, "");
        assert_eq!(records[1].issuer_ca_id, 0);

        let body = r#"{"name_value":null}{"name_value":"c.example.com"}"#;
        assert_eq!(names(&decode_records(body)), vec!["", "c.example.com"]);
    }

    #[test]
    fn test_first_seen_from_entry_timestamp() {
        let body = r#"[{"id":12,"name_value":"a.example.com","entry_timestamp":"2024-05-01T10:20:30.5"},
            {"name_value":"b.example.com","entry_timestamp":null}]"#;
        let records = decode_records(body);
        let seen = records[0].first_seen().unwrap();
        assert_eq!(seen.to_string(), "2024-05-01 10:20:30.500");
        assert!(records[1].first_seen().is_none());
    }

    #[test]
    fn test_decode_failure_yields_empty_list() {
        assert!(decode_records("").is_empty());
        assert!(decode_records("[]").is_empty());
        assert!(decode_records("<html>rate limited</html>").is_empty());
        assert!(decode_records(&format!("{}{{\"name_value\":", RECORD_A)).is_empty());
    }
}

// src/sources/database.rs
use crate::session::Session;
use crate::sources::Source;
use crate::store::NameStore;
use crate::types::{CertFinderError, CertificateRecord};
use async_trait::async_trait;
use log::info;
use std::path::PathBuf;

/// Names previously harvested from CT logs into the local store
#[derive(Debug, Clone)]
pub struct DatabaseSource {
    name: String,
    path: PathBuf,
}

impl DatabaseSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            name: "db".to_string(),
            path,
        }
    }
}

#[async_trait]
impl Source for DatabaseSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, pattern: &str, _session: &Session) -> Result<Vec<CertificateRecord>, CertFinderError> {
        let store = NameStore::open_existing(&self.path).await?;
        let rows = store.query(pattern).await?;
        store.close().await;

        info!("{}: {} stored names match {}", self.name, rows.len(), pattern);
        Ok(rows
            .into_iter()
            .map(|row| CertificateRecord::from_name(row.subdomain))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Config;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_fetch_from_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.db");

        let store = NameStore::open(&path).await.unwrap();
        for name in ["a.example.com", "a.example.com", "b.example.org"] {
            store.append(name).await.unwrap();
        }
        store.close().await;

        let session = Session::new(&Config::default()).unwrap();
        let source = DatabaseSource::new(path);
        let records = source.fetch("%.example.com", &session).await.unwrap();

        let names: Vec<&str> = records.iter().map(|r| r.name_value.as_str()).collect();
        assert_eq!(names, vec!["a.example.com", "a.example.com"]);
    }

    #[tokio::test]
    async fn test_missing_store_is_fatal() {
        let dir = tempdir().unwrap();
        let session = Session::new(&Config::default()).unwrap();
        let source = DatabaseSource::new(dir.path().join("nope.db"));

        assert!(matches!(
            source.fetch("%.example.com", &session).await,
            Err(CertFinderError::StorageError(_))
        ));
    }
}

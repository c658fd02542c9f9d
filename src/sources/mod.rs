// src/sources/mod.rs
use crate::session::Session;
use crate::types::{CertFinderError, CertificateRecord, Config};
use async_trait::async_trait;

mod crtsh;
mod database;

pub use crtsh::{decode_records, CrtShSource};
pub use database::DatabaseSource;

/// Something that turns a `%.<base>` wildcard pattern into certificate records.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self, pattern: &str, session: &Session) -> Result<Vec<CertificateRecord>, CertFinderError>;
}

/// Build a source from its command line name (`crt` or `db`).
pub fn create_source(name: &str, config: &Config) -> Option<Box<dyn Source>> {
    match name.to_lowercase().as_str() {
        "crt" => Some(Box::new(CrtShSource::new(&config.aggregator_url))),
        "db" => Some(Box::new(DatabaseSource::new(config.database_path.clone()))),
        _ => None,
    }
}

pub fn source_names() -> &'static [&'static str] {
    &["crt", "db"]
}

// src/store.rs
//
// Append-only SQLite table of harvested subdomain names.

use crate::error::{ErrorContext, Result};
use crate::types::{CertFinderError, StoredName};
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS subdomains (id INTEGER PRIMARY KEY, subdomain TEXT)";

/// Handle on the name database. Cloning shares the underlying pool.
///
/// The pool holds a single connection, so every statement (writes included)
/// runs one at a time no matter how many tasks share the handle.
#[derive(Debug, Clone)]
pub struct NameStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl NameStore {
    /// Open the store, creating the file and table when missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect(path.as_ref(), true).await
    }

    /// Open a store that must already exist on disk.
    pub async fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CertFinderError::StorageError(format!(
                "database {} is missing, pull CT logs first to create one",
                path.display()
            )));
        }
        Self::connect(path, false).await
    }

    async fn connect(path: &Path, create: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let store = Self {
            pool,
            path: path.to_path_buf(),
        };
        store.ensure_schema().await?;
        debug!("Opened name store at {}", path.display());
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .with_context(|| "Failed to create subdomains table".to_string())?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a name unconditionally; duplicates are kept.
    pub async fn append(&self, name: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO subdomains (subdomain) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to store {}", name))?;

        Ok(result.last_insert_rowid())
    }

    /// Rows whose name contains `substring`, in insertion order. `%` and `_`
    /// keep their LIKE meaning, so the `%.<base>` wildcard can be passed as is.
    pub async fn query(&self, substring: &str) -> Result<Vec<StoredName>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT id, subdomain FROM subdomains WHERE subdomain LIKE ? ORDER BY id",
        )
        .bind(format!("%{}%", substring))
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query for {}", substring))?;

        Ok(rows.into_iter().map(into_stored).collect())
    }

    pub async fn all(&self) -> Result<Vec<StoredName>> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, subdomain FROM subdomains ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .with_context(|| "Failed to read subdomains".to_string())?;

        Ok(rows.into_iter().map(into_stored).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subdomains")
            .fetch_one(&self.pool)
            .await
            .with_context(|| "Failed to count subdomains".to_string())?;
        Ok(count)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn into_stored((id, subdomain): (i64, String)) -> StoredName {
    StoredName { id, subdomain }
}

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use catalog_diff::{
    HistorySink, KeyFormat, ProductKey, ProductSnapshot, RunReport, RunStats, SnapshotStore,
    StoreError,
};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;

use crate::schema;

/// How long a write waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A SQLite-backed snapshot store and run history.
///
/// Rows are scoped by catalog name, so several catalogs can share one file.
/// The single connection is shared by every detection worker behind a mutex.
pub struct SqliteSnapshotStore {
    conn: Mutex<rusqlite::Connection>,
    catalog: String,
    key_format: KeyFormat,
}

impl SqliteSnapshotStore {
    /// Open a store backed by a file on disk, creating and migrating it if needed.
    pub fn open(
        path: &Path,
        catalog: impl Into<String>,
        key_format: KeyFormat,
    ) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(path).map_err(db)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db)?;

        let mut store = Self {
            conn: Mutex::new(conn),
            catalog: catalog.into(),
            key_format,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory(catalog: impl Into<String>) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open_in_memory().map_err(db)?;

        let mut store = Self {
            conn: Mutex::new(conn),
            catalog: catalog.into(),
            key_format: KeyFormat::Opaque,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn with_key_format(mut self, key_format: KeyFormat) -> Self {
        self.key_format = key_format;
        self
    }

    fn migrate(&mut self) -> Result<(), StoreError> {
        let conn = self
            .conn
            .get_mut()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))?;
        schema::migrations()
            .to_latest(conn)
            .map_err(|e| StoreError::Migration(e.to_string()))
    }

    fn conn(&self) -> Result<MutexGuard<'_, rusqlite::Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".into()))
    }

    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    /// Number of products with a snapshot in this catalog.
    pub fn snapshot_count(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM snapshots WHERE catalog = ?1",
                [&self.catalog],
                |row| row.get(0),
            )
            .map_err(db)?;
        Ok(from_sql_int(count))
    }

    /// The most recent run reports for this catalog, newest first.
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunReport>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT recorded_at, checked, updated, added, removed, skipped, failed,
                        pages_fetched, pages_skipped, duration_seconds
                 FROM run_history
                 WHERE catalog = ?1
                 ORDER BY id DESC
                 LIMIT ?2",
            )
            .map_err(db)?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(rusqlite::params![&self.catalog, limit], Self::row_to_report)
            .map_err(db)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(db)
    }

    fn row_to_report(row: &rusqlite::Row) -> rusqlite::Result<RunReport> {
        let int = |idx: usize| -> rusqlite::Result<u64> { row.get::<_, i64>(idx).map(from_sql_int) };

        Ok(RunReport {
            recorded_at: row.get(0)?,
            stats: RunStats {
                checked: int(1)?,
                updated: int(2)?,
                added: int(3)?,
                removed: int(4)?,
                skipped: int(5)?,
                failed: int(6)?,
                pages_fetched: int(7)?,
                pages_skipped: int(8)?,
            },
            duration_seconds: row.get(9)?,
        })
    }
}

#[async_trait::async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    fn key_format(&self) -> KeyFormat {
        self.key_format
    }

    async fn find(&self, key: &ProductKey) -> Result<Option<ProductSnapshot>, StoreError> {
        let conn = self.conn()?;

        let row: Option<(String, String, DateTime<Utc>, DateTime<Utc>)> = conn
            .query_row(
                "SELECT competitors_hash, competitors_json, last_checked, last_changed
                 FROM snapshots
                 WHERE catalog = ?1 AND product_id = ?2",
                rusqlite::params![&self.catalog, key.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
            .map_err(db)?;

        let Some((competitors_hash, competitors_json, last_checked, last_changed)) = row else {
            return Ok(None);
        };

        let competitors: Vec<String> =
            serde_json::from_str(&competitors_json).map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("competitors_json: {e}"),
            })?;

        Ok(Some(ProductSnapshot {
            key: key.clone(),
            competitors_hash,
            competitors,
            last_checked,
            last_changed,
        }))
    }

    async fn upsert(&self, snapshot: &ProductSnapshot) -> Result<(), StoreError> {
        let competitors_json = serde_json::to_string(&snapshot.competitors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO snapshots
                (catalog, product_id, competitors_hash, competitors_json, last_checked, last_changed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (catalog, product_id) DO UPDATE SET
                competitors_hash = excluded.competitors_hash,
                competitors_json = excluded.competitors_json,
                last_checked     = excluded.last_checked,
                last_changed     = excluded.last_changed",
            rusqlite::params![
                &self.catalog,
                snapshot.key.as_str(),
                snapshot.competitors_hash,
                competitors_json,
                snapshot.last_checked,
                snapshot.last_changed,
            ],
        )
        .map_err(db)?;

        Ok(())
    }

    async fn touch(&self, key: &ProductKey, checked_at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE snapshots SET last_checked = ?3 WHERE catalog = ?1 AND product_id = ?2",
                rusqlite::params![&self.catalog, key.as_str(), checked_at],
            )
            .map_err(db)?;

        if changed == 0 {
            tracing::debug!(product = %key, "touch on missing snapshot");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl HistorySink for SqliteSnapshotStore {
    async fn append(&self, report: &RunReport) -> Result<(), StoreError> {
        let s = &report.stats;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO run_history
                (catalog, recorded_at, checked, updated, added, removed, skipped, failed,
                 pages_fetched, pages_skipped, duration_seconds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            rusqlite::params![
                &self.catalog,
                report.recorded_at,
                to_sql_int(s.checked),
                to_sql_int(s.updated),
                to_sql_int(s.added),
                to_sql_int(s.removed),
                to_sql_int(s.skipped),
                to_sql_int(s.failed),
                to_sql_int(s.pages_fetched),
                to_sql_int(s.pages_skipped),
                report.duration_seconds,
            ],
        )
        .map_err(db)?;

        Ok(())
    }
}

fn db(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn to_sql_int(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn from_sql_int(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

use chrono::{DateTime, Utc};

use crate::product::{KeyFormat, ProductKey};
use crate::report::RunReport;
use crate::snapshot::ProductSnapshot;

/// Errors reported by snapshot and history storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("corrupt record for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed persistence of per-product snapshots.
///
/// A single handle is shared by every detection worker, so implementations
/// must tolerate concurrent calls. Writes for different keys are independent.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The key form this store accepts; ids that do not parse are skipped.
    fn key_format(&self) -> KeyFormat {
        KeyFormat::Opaque
    }

    /// Look up a snapshot. `Ok(None)` means the product was never seen.
    async fn find(&self, key: &ProductKey) -> Result<Option<ProductSnapshot>, StoreError>;

    /// Insert or fully replace the snapshot for `snapshot.key`.
    async fn upsert(&self, snapshot: &ProductSnapshot) -> Result<(), StoreError>;

    /// Update `last_checked` only, leaving hash, competitors and `last_changed` alone.
    async fn touch(&self, key: &ProductKey, checked_at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Append-only record of finished runs.
#[async_trait::async_trait]
pub trait HistorySink: Send + Sync {
    async fn append(&self, report: &RunReport) -> Result<(), StoreError>;
}

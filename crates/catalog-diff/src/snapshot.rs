use chrono::{DateTime, Utc};

use crate::product::ProductKey;

/// The last persisted competitor set of a product, plus bookkeeping timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSnapshot {
    pub key: ProductKey,
    /// Hex SHA-256 of the sorted, concatenated competitor ids.
    pub competitors_hash: String,
    /// Sorted ascending, no duplicates.
    pub competitors: Vec<String>,
    pub last_checked: DateTime<Utc>,
    pub last_changed: DateTime<Utc>,
}

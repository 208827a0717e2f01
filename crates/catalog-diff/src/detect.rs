use std::borrow::Cow;

use chrono::{DateTime, Utc};

use crate::fingerprint::{canonicalize, fingerprint, merge_diff};
use crate::product::{Product, ProductKey};
use crate::snapshot::ProductSnapshot;
use crate::store::SnapshotStore;

/// How a product's competitor set compares to its stored snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// No snapshot existed; one is created.
    Created,
    Unchanged,
    Modified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub added: u64,
    pub removed: u64,
}

impl Change {
    pub fn unchanged() -> Self {
        Self {
            kind: ChangeKind::Unchanged,
            added: 0,
            removed: 0,
        }
    }

    /// Whether the snapshot's competitor set had to be rewritten.
    pub fn changed(&self) -> bool {
        self.kind != ChangeKind::Unchanged
    }
}

/// The store write a [`plan`] asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotWrite {
    Create(ProductSnapshot),
    Touch {
        key: ProductKey,
        checked_at: DateTime<Utc>,
    },
    Replace(ProductSnapshot),
}

/// Compare `competitors` against `prior` without touching any store.
///
/// Timestamps never move backwards: a `now` earlier than the stored
/// `last_checked` (clock skew between hosts) is clamped to it.
pub fn plan(
    key: ProductKey,
    competitors: &[String],
    prior: Option<&ProductSnapshot>,
    now: DateTime<Utc>,
) -> (Change, SnapshotWrite) {
    let current = canonicalize(competitors.iter().cloned());
    let current_hash = fingerprint(&current);

    let Some(prior) = prior else {
        let change = Change {
            kind: ChangeKind::Created,
            added: current.len() as u64,
            removed: 0,
        };
        let snapshot = ProductSnapshot {
            key,
            competitors_hash: current_hash,
            competitors: current,
            last_checked: now,
            last_changed: now,
        };
        return (change, SnapshotWrite::Create(snapshot));
    };

    let checked_at = now.max(prior.last_checked);

    if current_hash == prior.competitors_hash {
        return (Change::unchanged(), SnapshotWrite::Touch { key, checked_at });
    }

    let old = if is_strictly_sorted(&prior.competitors) {
        Cow::Borrowed(prior.competitors.as_slice())
    } else {
        Cow::Owned(canonicalize(prior.competitors.iter().cloned()))
    };
    let diff = merge_diff(&old, &current);

    let change = Change {
        kind: ChangeKind::Modified,
        added: diff.added,
        removed: diff.removed,
    };
    let snapshot = ProductSnapshot {
        key,
        competitors_hash: current_hash,
        competitors: current,
        last_checked: checked_at,
        last_changed: checked_at.max(prior.last_changed),
    };
    (change, SnapshotWrite::Replace(snapshot))
}

fn is_strictly_sorted(ids: &[String]) -> bool {
    ids.windows(2).all(|w| w[0] < w[1])
}

/// Per-product result of a [`ChangeDetector::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Checked(Change),
    /// The id could not be turned into a store key; the store was not touched.
    Skipped { reason: String },
    /// The store failed to read or write; counts as no change.
    Failed { reason: String },
}

/// Runs change detection for single products against a shared store.
pub struct ChangeDetector<'a> {
    store: &'a dyn SnapshotStore,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(store: &'a dyn SnapshotStore) -> Self {
        Self { store }
    }

    pub async fn check(&self, product: &Product, now: DateTime<Utc>) -> Detection {
        let key = match ProductKey::parse(&product.id, self.store.key_format()) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(product = %product.id, error = %e, "skipping product");
                return Detection::Skipped {
                    reason: e.to_string(),
                };
            }
        };

        let prior = match self.store.find(&key).await {
            Ok(prior) => prior,
            Err(e) => {
                tracing::warn!(product = %product.id, error = %e, "snapshot lookup failed");
                return Detection::Failed {
                    reason: format!("lookup failed: {e}"),
                };
            }
        };

        let (change, write) = plan(key, &product.competitors, prior.as_ref(), now);

        let written = match &write {
            SnapshotWrite::Create(snapshot) | SnapshotWrite::Replace(snapshot) => {
                self.store.upsert(snapshot).await
            }
            SnapshotWrite::Touch { key, checked_at } => self.store.touch(key, *checked_at).await,
        };

        if let Err(e) = written {
            tracing::warn!(product = %product.id, error = %e, "snapshot write failed");
            return Detection::Failed {
                reason: format!("write failed: {e}"),
            };
        }

        match change.kind {
            ChangeKind::Modified => tracing::info!(
                product = %product.id,
                added = change.added,
                removed = change.removed,
                "competitors changed"
            ),
            ChangeKind::Created => tracing::debug!(
                product = %product.id,
                competitors = change.added,
                "new product"
            ),
            ChangeKind::Unchanged => {}
        }

        Detection::Checked(change)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::product::KeyFormat;
    use crate::test_support::InMemorySnapshotStore;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn key(id: &str) -> ProductKey {
        ProductKey::from_stored(id)
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn first_sighting_creates_snapshot() {
        let (change, write) = plan(key("p1"), &ids(&["c2", "c1"]), None, at(100));

        assert_eq!(
            change,
            Change {
                kind: ChangeKind::Created,
                added: 2,
                removed: 0
            }
        );
        let SnapshotWrite::Create(snapshot) = write else {
            panic!("expected create, got {write:?}");
        };
        assert_eq!(snapshot.competitors, ids(&["c1", "c2"]));
        assert_eq!(snapshot.competitors_hash, fingerprint(&ids(&["c1", "c2"])));
        assert_eq!(snapshot.last_checked, at(100));
        assert_eq!(snapshot.last_changed, at(100));
    }

    #[test]
    fn first_sighting_with_no_competitors_is_still_a_change() {
        let (change, _) = plan(key("p1"), &[], None, at(1));
        assert!(change.changed());
        assert_eq!(change.added, 0);
    }

    #[test]
    fn same_set_in_other_order_only_touches() {
        let (_, write) = plan(key("p1"), &ids(&["c1", "c2"]), None, at(100));
        let SnapshotWrite::Create(prior) = write else {
            panic!("expected create");
        };

        let (change, write) = plan(key("p1"), &ids(&["c2", "c1"]), Some(&prior), at(200));
        assert_eq!(change, Change::unchanged());
        assert_eq!(
            write,
            SnapshotWrite::Touch {
                key: key("p1"),
                checked_at: at(200)
            }
        );
    }

    #[test]
    fn modified_set_reports_diff_and_rewrites() {
        let (_, write) = plan(key("p1"), &ids(&["c1", "c2"]), None, at(100));
        let SnapshotWrite::Create(prior) = write else {
            panic!("expected create");
        };

        let (change, write) = plan(key("p1"), &ids(&["c3", "c2"]), Some(&prior), at(200));
        assert_eq!(
            change,
            Change {
                kind: ChangeKind::Modified,
                added: 1,
                removed: 1
            }
        );
        let SnapshotWrite::Replace(snapshot) = write else {
            panic!("expected replace, got {write:?}");
        };
        assert_eq!(snapshot.competitors, ids(&["c2", "c3"]));
        assert_eq!(snapshot.last_changed, at(200));
        assert_eq!(snapshot.last_checked, at(200));
    }

    #[test]
    fn unsorted_stored_competitors_are_canonicalized_before_diffing() {
        let prior = ProductSnapshot {
            key: key("p1"),
            competitors_hash: "stale".into(),
            competitors: ids(&["c3", "c1", "c2"]),
            last_checked: at(10),
            last_changed: at(10),
        };

        let (change, _) = plan(key("p1"), &ids(&["c1", "c2", "c3", "c4"]), Some(&prior), at(20));
        assert_eq!(change.added, 1);
        assert_eq!(change.removed, 0);
    }

    #[test]
    fn timestamps_never_move_backwards() {
        let prior = ProductSnapshot {
            key: key("p1"),
            competitors_hash: fingerprint(&ids(&["c1"])),
            competitors: ids(&["c1"]),
            last_checked: at(500),
            last_changed: at(400),
        };

        let (_, touch) = plan(key("p1"), &ids(&["c1"]), Some(&prior), at(300));
        assert_eq!(
            touch,
            SnapshotWrite::Touch {
                key: key("p1"),
                checked_at: at(500)
            }
        );

        let (_, replace) = plan(key("p1"), &ids(&["c2"]), Some(&prior), at(300));
        let SnapshotWrite::Replace(snapshot) = replace else {
            panic!("expected replace");
        };
        assert_eq!(snapshot.last_checked, at(500));
        assert_eq!(snapshot.last_changed, at(500));
    }

    #[tokio::test]
    async fn check_walks_through_three_runs() {
        let store = InMemorySnapshotStore::new();
        let detector = ChangeDetector::new(&store);

        let first = detector
            .check(&Product::new("p1", ["c1", "c2"]), at(100))
            .await;
        assert_eq!(
            first,
            Detection::Checked(Change {
                kind: ChangeKind::Created,
                added: 2,
                removed: 0
            })
        );
        let snap = store.get("p1").unwrap();
        assert_eq!(snap.competitors_hash, fingerprint(&ids(&["c1", "c2"])));

        let second = detector
            .check(&Product::new("p1", ["c2", "c3"]), at(200))
            .await;
        assert_eq!(
            second,
            Detection::Checked(Change {
                kind: ChangeKind::Modified,
                added: 1,
                removed: 1
            })
        );
        let snap = store.get("p1").unwrap();
        assert_eq!(snap.competitors_hash, fingerprint(&ids(&["c2", "c3"])));
        assert_eq!(snap.last_changed, at(200));

        let third = detector
            .check(&Product::new("p1", ["c3", "c2"]), at(300))
            .await;
        assert_eq!(third, Detection::Checked(Change::unchanged()));
        let snap = store.get("p1").unwrap();
        assert_eq!(snap.competitors_hash, fingerprint(&ids(&["c2", "c3"])));
        assert_eq!(snap.last_changed, at(200));
        assert_eq!(snap.last_checked, at(300));
    }

    #[tokio::test]
    async fn repeated_unchanged_checks_only_advance_last_checked() {
        let store = InMemorySnapshotStore::new();
        let detector = ChangeDetector::new(&store);
        let product = Product::new("p1", ["c1"]);

        detector.check(&product, at(1)).await;
        let created = store.get("p1").unwrap();

        for t in [2, 3] {
            let result = detector.check(&product, at(t)).await;
            assert_eq!(result, Detection::Checked(Change::unchanged()));
            let snap = store.get("p1").unwrap();
            assert_eq!(snap.competitors_hash, created.competitors_hash);
            assert_eq!(snap.competitors, created.competitors);
            assert_eq!(snap.last_changed, created.last_changed);
            assert_eq!(snap.last_checked, at(t));
        }
    }

    #[tokio::test]
    async fn unparseable_id_is_skipped_without_store_access() {
        let store = InMemorySnapshotStore::with_key_format(KeyFormat::ObjectId);
        let detector = ChangeDetector::new(&store);

        let result = detector.check(&Product::new("not-hex", ["c1"]), at(1)).await;
        assert!(matches!(result, Detection::Skipped { .. }));
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn store_write_failure_is_reported_as_failed() {
        let store = InMemorySnapshotStore::new();
        store.fail_writes_for("p1");
        let detector = ChangeDetector::new(&store);

        let result = detector.check(&Product::new("p1", ["c1"]), at(1)).await;
        assert!(matches!(result, Detection::Failed { reason } if reason.starts_with("write failed")));
        assert!(store.get("p1").is_none());
    }

    #[tokio::test]
    async fn store_read_failure_is_reported_as_failed() {
        let store = InMemorySnapshotStore::new();
        store.fail_reads_for("p1");
        let detector = ChangeDetector::new(&store);

        let result = detector.check(&Product::new("p1", ["c1"]), at(1)).await;
        assert!(matches!(result, Detection::Failed { reason } if reason.starts_with("lookup failed")));
    }
}

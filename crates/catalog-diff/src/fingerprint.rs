//! Order-independent fingerprints of competitor sets and the merge-diff used to
//! count what changed between two of them.

use std::cmp::Ordering;

use sha2::{Digest, Sha256};

/// Sort ascending and drop duplicates.
///
/// Both [`fingerprint`] and [`merge_diff`] assume their input went through
/// this first; `merge_diff` silently miscounts on unsorted input.
pub fn canonicalize<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Lowercase hex SHA-256 of the ids concatenated without a separator.
pub fn fingerprint(canonical: &[String]) -> String {
    let mut hasher = Sha256::new();
    for id in canonical {
        hasher.update(id.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Counts of ids unique to each side of a [`merge_diff`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diff {
    pub added: u64,
    pub removed: u64,
}

/// Two-cursor walk over two strictly sorted sequences.
///
/// Ids only in `old` are removed, ids only in `current` are added.
pub fn merge_diff(old: &[String], current: &[String]) -> Diff {
    let mut diff = Diff::default();
    let (mut i, mut j) = (0, 0);

    while i < old.len() && j < current.len() {
        match old[i].cmp(&current[j]) {
            Ordering::Less => {
                diff.removed += 1;
                i += 1;
            }
            Ordering::Greater => {
                diff.added += 1;
                j += 1;
            }
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }

    diff.removed += (old.len() - i) as u64;
    diff.added += (current.len() - j) as u64;
    diff
}

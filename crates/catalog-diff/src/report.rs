use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::issue::Issue;

/// Counters for one run, or for the slice of a run one worker handled.
///
/// Partial stats combine by addition, so the total does not depend on which
/// worker saw which product.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Every product seen, including skipped and failed ones.
    pub checked: u64,
    /// Products whose competitor set changed (first sightings included).
    pub updated: u64,
    pub added: u64,
    pub removed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub pages_fetched: u64,
    pub pages_skipped: u64,
}

impl RunStats {
    /// Fold one product's detection result into the counters.
    pub fn record(&mut self, detection: &Detection) {
        self.checked += 1;
        match detection {
            Detection::Checked(change) => {
                if change.changed() {
                    self.updated += 1;
                    self.added += change.added;
                    self.removed += change.removed;
                }
            }
            Detection::Skipped { .. } => self.skipped += 1,
            Detection::Failed { .. } => self.failed += 1,
        }
    }
}

impl Add for RunStats {
    type Output = RunStats;

    fn add(mut self, rhs: RunStats) -> RunStats {
        self += rhs;
        self
    }
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, rhs: RunStats) {
        self.checked += rhs.checked;
        self.updated += rhs.updated;
        self.added += rhs.added;
        self.removed += rhs.removed;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
        self.pages_fetched += rhs.pages_fetched;
        self.pages_skipped += rhs.pages_skipped;
    }
}

impl Sum for RunStats {
    fn sum<I: Iterator<Item = RunStats>>(iter: I) -> RunStats {
        iter.fold(RunStats::default(), Add::add)
    }
}

/// The persisted, append-only record of one finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub recorded_at: DateTime<Utc>,
    pub stats: RunStats,
    pub duration_seconds: f64,
}

impl RunReport {
    pub fn new(recorded_at: DateTime<Utc>, stats: RunStats, duration: Duration) -> Self {
        Self {
            recorded_at,
            stats,
            duration_seconds: duration.as_secs_f64(),
        }
    }

    /// One-line human summary, as printed at the end of a run.
    pub fn summary_line(&self) -> String {
        format!(
            "checked {} products, {} updated, {} competitors added, {} removed in {:.2}s",
            self.stats.checked,
            self.stats.updated,
            self.stats.added,
            self.stats.removed,
            self.duration_seconds,
        )
    }
}

/// A finished run: the report that gets persisted plus everything that was
/// skipped along the way.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub issues: Vec<Issue>,
}

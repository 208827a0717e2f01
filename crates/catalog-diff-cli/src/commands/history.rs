use anyhow::{Context, Result};
use catalog_diff_store::SqliteSnapshotStore;

pub fn run(store: &SqliteSnapshotStore, limit: usize) -> Result<()> {
    let runs = store
        .recent_runs(limit)
        .context("failed to read run history")?;

    if runs.is_empty() {
        println!("No runs recorded for catalog {}.", store.catalog());
        return Ok(());
    }

    for report in &runs {
        let s = &report.stats;
        println!(
            "{}  {}  (skipped {}, failed {}, pages {}/{})",
            report.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            report.summary_line(),
            s.skipped,
            s.failed,
            s.pages_fetched,
            s.pages_fetched + s.pages_skipped,
        );
    }

    Ok(())
}

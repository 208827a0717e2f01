use std::sync::Arc;

use anyhow::Result;
use catalog_diff::{Issue, PageSource, Pipeline, PipelineConfig};
use catalog_diff_store::SqliteSnapshotStore;

/// Print skipped pages, then skipped or failed products, to stderr.
pub fn print_issues(issues: &[Issue]) {
    for line in issue_lines(issues) {
        eprintln!("{line}");
    }
}

fn issue_lines(issues: &[Issue]) -> Vec<String> {
    let (pages, products): (Vec<&Issue>, Vec<&Issue>) =
        issues.iter().partition(|issue| issue.is_page());
    pages
        .into_iter()
        .chain(products)
        .map(|issue| format!("warning: {issue}"))
        .collect()
}

/// Run one detection pass, record it in the history, and print the summary.
pub async fn run(
    store: Arc<SqliteSnapshotStore>,
    source: Arc<dyn PageSource>,
    config: PipelineConfig,
) -> Result<()> {
    let pipeline = Pipeline::new(source, store.clone(), config);
    let outcome = pipeline.run_and_record(store.as_ref()).await;

    print_issues(&outcome.issues);
    println!("{}", outcome.report.summary_line());

    Ok(())
}

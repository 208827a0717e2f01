//! Two-stage worker pool: fetch workers turn page indices into product
//! batches, detection workers turn batches into [`RunStats`].
//!
//! ```text
//! page_count ─▶ [page queue] ─▶ fetch × F ─▶ [batch queue] ─▶ detect × D ─▶ tallies ─▶ RunReport
//! ```
//!
//! Both queues are bounded, so a slow stage applies backpressure to the one
//! before it. A queue closes once every sender clone is gone, which is how
//! the detection pool learns that the last fetch worker has finished.
//!
//! The batch queue is normally the bottleneck: at most `queue_capacity`
//! batches are ever waiting, so detection workers beyond that number mostly
//! sit idle on the shared receiver.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::detect::{ChangeDetector, Detection};
use crate::issue::Issue;
use crate::product::{PageIndex, Product};
use crate::report::{RunOutcome, RunReport, RunStats};
use crate::source::{Page, PageSource};
use crate::store::{HistorySink, SnapshotStore};

/// How the set of pages to fetch is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationMode {
    /// Ask the catalog for its page count once, then fetch `1..=count`
    /// concurrently. Failed pages are skipped.
    #[default]
    Discover,
    /// Walk pages 1, 2, 3, … one at a time until the first page that is
    /// empty, reports end-of-data, or fails.
    Probe,
}

impl PaginationMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "discover" => Some(Self::Discover),
            "probe" => Some(Self::Probe),
            _ => None,
        }
    }
}

/// Pool and queue sizing for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub fetch_workers: usize,
    pub detect_workers: usize,
    /// Capacity of both the page queue and the batch queue.
    pub queue_capacity: usize,
    pub pagination: PaginationMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_workers: 5,
            detect_workers: 200,
            queue_capacity: 100,
            pagination: PaginationMode::Discover,
        }
    }
}

impl PipelineConfig {
    /// Clamp every size to at least one.
    pub fn normalized(&self) -> Self {
        Self {
            fetch_workers: self.fetch_workers.max(1),
            detect_workers: self.detect_workers.max(1),
            queue_capacity: self.queue_capacity.max(1),
            pagination: self.pagination,
        }
    }
}

/// What a single worker hands back when it exits.
#[derive(Debug, Default)]
struct RunTally {
    stats: RunStats,
    issues: Vec<Issue>,
}

type Shared<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// One change-detection run over a catalog.
pub struct Pipeline {
    source: Arc<dyn PageSource>,
    store: Arc<dyn SnapshotStore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn PageSource>,
        store: Arc<dyn SnapshotStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            store,
            config: config.normalized(),
        }
    }

    /// Fetch every page, check every product, and sum the results.
    ///
    /// Page and product failures are absorbed into [`RunOutcome::issues`];
    /// this never fails as a whole. There is no cancellation: a hung request
    /// stalls its worker and therefore the run.
    pub async fn run(&self) -> RunOutcome {
        let started = Instant::now();
        let config = &self.config;

        let (batch_tx, batch_rx) = mpsc::channel::<Vec<Product>>(config.queue_capacity);
        let (tally_tx, mut tally_rx) = mpsc::unbounded_channel::<RunTally>();
        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        let mode = match config.pagination {
            PaginationMode::Discover => match self.source.page_count().await {
                Ok(count) => {
                    tracing::info!(
                        catalog = self.source.label(),
                        pages = count,
                        fetch_workers = config.fetch_workers,
                        detect_workers = config.detect_workers,
                        "starting run"
                    );
                    handles.extend(self.spawn_discovered(count, &batch_tx, &tally_tx));
                    PaginationMode::Discover
                }
                Err(e) => {
                    tracing::warn!(
                        catalog = self.source.label(),
                        error = %e,
                        "could not read page count, probing pages sequentially"
                    );
                    handles.push(self.spawn_probe(batch_tx.clone(), tally_tx.clone()));
                    PaginationMode::Probe
                }
            },
            PaginationMode::Probe => {
                tracing::info!(
                    catalog = self.source.label(),
                    detect_workers = config.detect_workers,
                    "starting run, probing pages sequentially"
                );
                handles.push(self.spawn_probe(batch_tx.clone(), tally_tx.clone()));
                PaginationMode::Probe
            }
        };
        // Only worker-held clones may keep the batch queue open.
        drop(batch_tx);

        let batch_rx: Shared<Vec<Product>> = Arc::new(Mutex::new(batch_rx));
        for worker in 0..config.detect_workers {
            handles.push(tokio::spawn(detect_worker(
                worker,
                Arc::clone(&batch_rx),
                Arc::clone(&self.store),
                tally_tx.clone(),
            )));
        }
        drop(tally_tx);

        let mut stats = RunStats::default();
        let mut issues = Vec::new();
        while let Some(tally) = tally_rx.recv().await {
            stats += tally.stats;
            issues.extend(tally.issues);
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "pipeline worker did not finish cleanly");
            }
        }

        let report = RunReport::new(Utc::now(), stats, started.elapsed());
        tracing::debug!(?mode, issues = issues.len(), "run finished");
        RunOutcome { report, issues }
    }

    /// [`run`](Self::run), then append the report to `history`.
    ///
    /// A failed append is logged and otherwise ignored.
    pub async fn run_and_record(&self, history: &dyn HistorySink) -> RunOutcome {
        let outcome = self.run().await;

        if let Err(e) = history.append(&outcome.report).await {
            tracing::error!(error = %e, "failed to record run history");
        }

        let stats = &outcome.report.stats;
        if stats.updated == 0 {
            tracing::info!(checked = stats.checked, "No changed items found");
        } else {
            tracing::info!(
                checked = stats.checked,
                added = stats.added,
                removed = stats.removed,
                "Total changed items: {}",
                stats.updated
            );
        }

        outcome
    }

    fn spawn_discovered(
        &self,
        count: u32,
        batch_tx: &mpsc::Sender<Vec<Product>>,
        tally_tx: &mpsc::UnboundedSender<RunTally>,
    ) -> Vec<JoinHandle<()>> {
        let (page_tx, page_rx) = mpsc::channel::<PageIndex>(self.config.queue_capacity);
        let mut handles = Vec::with_capacity(self.config.fetch_workers + 1);

        handles.push(tokio::spawn(async move {
            for n in 1..=count {
                let Some(page) = PageIndex::new(n) else {
                    continue;
                };
                if page_tx.send(page).await.is_err() {
                    break;
                }
            }
        }));

        let page_rx: Shared<PageIndex> = Arc::new(Mutex::new(page_rx));
        for worker in 0..self.config.fetch_workers {
            handles.push(tokio::spawn(fetch_worker(
                worker,
                Arc::clone(&page_rx),
                Arc::clone(&self.source),
                batch_tx.clone(),
                tally_tx.clone(),
            )));
        }

        handles
    }

    fn spawn_probe(
        &self,
        batch_tx: mpsc::Sender<Vec<Product>>,
        tally_tx: mpsc::UnboundedSender<RunTally>,
    ) -> JoinHandle<()> {
        tokio::spawn(probe_pages(
            Arc::clone(&self.source),
            batch_tx,
            tally_tx,
        ))
    }
}

async fn fetch_worker(
    worker: usize,
    pages: Shared<PageIndex>,
    source: Arc<dyn PageSource>,
    batches: mpsc::Sender<Vec<Product>>,
    tallies: mpsc::UnboundedSender<RunTally>,
) {
    let mut tally = RunTally::default();

    loop {
        let next = pages.lock().await.recv().await;
        let Some(page) = next else {
            break;
        };

        match source.fetch_page(page).await {
            Ok(Page::Products(products)) => {
                tracing::debug!(worker, %page, products = products.len(), "page fetched");
                tally.stats.pages_fetched += 1;
                if batches.send(products).await.is_err() {
                    tracing::warn!(worker, %page, "batch queue closed, dropping page");
                    break;
                }
            }
            Ok(Page::End) => {
                tracing::info!(worker, %page, "catalog reported end of data inside page range");
                tally.stats.pages_skipped += 1;
                tally.issues.push(Issue::page_skipped(page, "end of data"));
            }
            Err(e) => {
                tracing::warn!(worker, %page, error = %e, "skipping page");
                tally.stats.pages_skipped += 1;
                tally.issues.push(Issue::page_skipped(page, e.to_string()));
            }
        }
    }

    let _ = tallies.send(tally);
}

async fn probe_pages(
    source: Arc<dyn PageSource>,
    batches: mpsc::Sender<Vec<Product>>,
    tallies: mpsc::UnboundedSender<RunTally>,
) {
    let mut tally = RunTally::default();
    let mut page = PageIndex::FIRST;

    loop {
        match source.fetch_page(page).await {
            Ok(Page::Products(products)) if products.is_empty() => {
                tracing::info!(%page, "empty page, stopping");
                break;
            }
            Ok(Page::Products(products)) => {
                tracing::debug!(%page, products = products.len(), "page fetched");
                tally.stats.pages_fetched += 1;
                if batches.send(products).await.is_err() {
                    break;
                }
            }
            Ok(Page::End) => {
                tracing::info!(%page, "end of data");
                break;
            }
            Err(e) => {
                tracing::warn!(%page, error = %e, "page failed, stopping pagination");
                tally.stats.pages_skipped += 1;
                tally.issues.push(Issue::page_skipped(page, e.to_string()));
                break;
            }
        }

        match page.next() {
            Some(next) => page = next,
            None => break,
        }
    }

    let _ = tallies.send(tally);
}

async fn detect_worker(
    worker: usize,
    batches: Shared<Vec<Product>>,
    store: Arc<dyn SnapshotStore>,
    tallies: mpsc::UnboundedSender<RunTally>,
) {
    let detector = ChangeDetector::new(store.as_ref());
    let mut tally = RunTally::default();

    loop {
        let next = batches.lock().await.recv().await;
        let Some(products) = next else {
            break;
        };

        for product in &products {
            let detection = detector.check(product, Utc::now()).await;
            tally.stats.record(&detection);
            match detection {
                Detection::Checked(_) => {}
                Detection::Skipped { reason } => tally
                    .issues
                    .push(Issue::product_skipped(product.id.clone(), reason)),
                Detection::Failed { reason } => tally
                    .issues
                    .push(Issue::product_failed(product.id.clone(), reason)),
            }
        }
    }

    tracing::trace!(worker, checked = tally.stats.checked, "detect worker done");
    let _ = tallies.send(tally);
}

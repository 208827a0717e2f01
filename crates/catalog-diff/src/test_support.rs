use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::{
    HistorySink, KeyFormat, Page, PageError, PageIndex, PageSource, Product, ProductKey,
    ProductSnapshot, RunReport, SnapshotStore, StoreError,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory catalog for testing. Page `n` is entry `n - 1`; anything past
/// the end answers [`Page::End`].
pub struct InMemoryPageSource {
    label: String,
    pages: Mutex<Vec<Result<Page, PageError>>>,
    reported_count: Mutex<Option<Result<u32, PageError>>>,
    requested: Mutex<Vec<u32>>,
}

impl InMemoryPageSource {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pages: Mutex::new(Vec::new()),
            reported_count: Mutex::new(None),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn push_products(&self, products: Vec<Product>) {
        lock(&self.pages).push(Ok(Page::Products(products)));
    }

    pub fn push_end(&self) {
        lock(&self.pages).push(Ok(Page::End));
    }

    pub fn push_error(&self, error: PageError) {
        lock(&self.pages).push(Err(error));
    }

    /// Replace the contents of page `page`, padding with end-of-data pages
    /// if the catalog is shorter.
    pub fn set_products(&self, page: u32, products: Vec<Product>) {
        let idx = page.saturating_sub(1) as usize;
        let mut pages = lock(&self.pages);
        while pages.len() <= idx {
            pages.push(Ok(Page::End));
        }
        pages[idx] = Ok(Page::Products(products));
    }

    /// Override what `page_count` reports instead of the number of pushed pages.
    pub fn report_page_count(&self, count: Result<u32, PageError>) {
        *lock(&self.reported_count) = Some(count);
    }

    /// Page numbers requested so far, in request order.
    pub fn requested(&self) -> Vec<u32> {
        lock(&self.requested).clone()
    }
}

#[async_trait::async_trait]
impl PageSource for InMemoryPageSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch_page(&self, page: PageIndex) -> Result<Page, PageError> {
        lock(&self.requested).push(page.get());
        let pages = lock(&self.pages);
        match pages.get(page.get() as usize - 1) {
            Some(result) => result.clone(),
            None => Ok(Page::End),
        }
    }

    async fn page_count(&self) -> Result<u32, PageError> {
        if let Some(count) = lock(&self.reported_count).clone() {
            return count;
        }
        Ok(lock(&self.pages).len() as u32)
    }
}

/// In-memory snapshot store and history sink with failure injection.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    key_format: KeyFormat,
    snapshots: Mutex<HashMap<ProductKey, ProductSnapshot>>,
    history: Mutex<Vec<RunReport>>,
    failing_reads: Mutex<HashSet<String>>,
    failing_writes: Mutex<HashSet<String>>,
    failing_history: Mutex<bool>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_format(key_format: KeyFormat) -> Self {
        Self {
            key_format,
            ..Self::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<ProductSnapshot> {
        lock(&self.snapshots)
            .get(&ProductKey::from_stored(key))
            .cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.snapshots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn history(&self) -> Vec<RunReport> {
        lock(&self.history).clone()
    }

    pub fn fail_reads_for(&self, key: &str) {
        lock(&self.failing_reads).insert(key.to_owned());
    }

    pub fn fail_writes_for(&self, key: &str) {
        lock(&self.failing_writes).insert(key.to_owned());
    }

    pub fn fail_history(&self) {
        *lock(&self.failing_history) = true;
    }

    fn check_write(&self, key: &ProductKey) -> Result<(), StoreError> {
        if lock(&self.failing_writes).contains(key.as_str()) {
            return Err(StoreError::Database(format!("injected write failure for {key}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    fn key_format(&self) -> KeyFormat {
        self.key_format
    }

    async fn find(&self, key: &ProductKey) -> Result<Option<ProductSnapshot>, StoreError> {
        if lock(&self.failing_reads).contains(key.as_str()) {
            return Err(StoreError::Database(format!("injected read failure for {key}")));
        }
        Ok(lock(&self.snapshots).get(key).cloned())
    }

    async fn upsert(&self, snapshot: &ProductSnapshot) -> Result<(), StoreError> {
        self.check_write(&snapshot.key)?;
        lock(&self.snapshots).insert(snapshot.key.clone(), snapshot.clone());
        Ok(())
    }

    async fn touch(&self, key: &ProductKey, checked_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check_write(key)?;
        if let Some(snapshot) = lock(&self.snapshots).get_mut(key) {
            snapshot.last_checked = checked_at;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl HistorySink for InMemorySnapshotStore {
    async fn append(&self, report: &RunReport) -> Result<(), StoreError> {
        if *lock(&self.failing_history) {
            return Err(StoreError::Unavailable("injected history failure".into()));
        }
        lock(&self.history).push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn page_source_serves_pushed_pages_then_end() {
        let source = InMemoryPageSource::new("test");
        source.push_products(vec![Product::new("p1", ["c1"])]);

        let first = source.fetch_page(PageIndex::FIRST).await.unwrap();
        assert_eq!(first, Page::Products(vec![Product::new("p1", ["c1"])]));

        let second = source.fetch_page(PageIndex::new(2).unwrap()).await.unwrap();
        assert_eq!(second, Page::End);
        assert_eq!(source.requested(), vec![1, 2]);
        assert_eq!(source.page_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn page_source_reports_overridden_count() {
        let source = InMemoryPageSource::new("test");
        source.report_page_count(Err(PageError::Status(503)));
        assert_eq!(source.page_count().await, Err(PageError::Status(503)));
    }

    #[tokio::test]
    async fn touch_on_missing_key_is_a_no_op() {
        let store = InMemorySnapshotStore::new();
        store
            .touch(&ProductKey::from_stored("ghost"), Utc::now())
            .await
            .unwrap();
        assert!(store.is_empty());
    }
}

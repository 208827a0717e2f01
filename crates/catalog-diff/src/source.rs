use std::sync::Arc;

use crate::product::{PageIndex, Product};

/// Errors that can occur while fetching a catalog page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("parse error: {0}")]
    Parse(String),
}

/// What a single page request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Products(Vec<Product>),
    /// The catalog has no page at this index; pagination is over.
    End,
}

/// A paginated catalog of products and their competitors.
///
/// Implementations keep no state between calls beyond connection reuse.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    /// Human-readable label identifying this catalog.
    fn label(&self) -> &str;

    /// Fetch and decode one page.
    async fn fetch_page(&self, page: PageIndex) -> Result<Page, PageError>;

    /// Total number of pages, as reported by the catalog.
    async fn page_count(&self) -> Result<u32, PageError>;
}

#[async_trait::async_trait]
impl<T: PageSource + ?Sized> PageSource for Arc<T> {
    fn label(&self) -> &str {
        (**self).label()
    }

    async fn fetch_page(&self, page: PageIndex) -> Result<Page, PageError> {
        (**self).fetch_page(page).await
    }

    async fn page_count(&self) -> Result<u32, PageError> {
        (**self).page_count().await
    }
}

use std::fmt;

use crate::product::{PageIndex, ProductId};

/// Something a run absorbed instead of aborting.
///
/// Workers never pass errors to each other. They record one of these and keep
/// going, so callers (and tests) can inspect what was dropped without
/// scraping log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// A page was not processed: end-of-data inside the discovered range,
    /// a transport or status failure, or an undecodable body.
    PageSkipped { page: PageIndex, reason: String },
    /// A product was not checked because its id is unusable as a store key.
    ProductSkipped { id: ProductId, reason: String },
    /// A product was not checked because the store failed.
    ProductFailed { id: ProductId, reason: String },
}

impl Issue {
    pub fn page_skipped(page: PageIndex, reason: impl Into<String>) -> Self {
        Self::PageSkipped {
            page,
            reason: reason.into(),
        }
    }

    pub fn product_skipped(id: ProductId, reason: impl Into<String>) -> Self {
        Self::ProductSkipped {
            id,
            reason: reason.into(),
        }
    }

    pub fn product_failed(id: ProductId, reason: impl Into<String>) -> Self {
        Self::ProductFailed {
            id,
            reason: reason.into(),
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, Self::PageSkipped { .. })
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PageSkipped { page, reason } => write!(f, "page {page} skipped: {reason}"),
            Self::ProductSkipped { id, reason } => write!(f, "product {id} skipped: {reason}"),
            Self::ProductFailed { id, reason } => write!(f, "product {id} failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_display() {
        let page = PageIndex::new(4).unwrap();
        assert_eq!(
            Issue::page_skipped(page, "end of data").to_string(),
            "page 4 skipped: end of data"
        );
        assert_eq!(
            Issue::product_skipped(ProductId::new("x"), "bad id").to_string(),
            "product x skipped: bad id"
        );
        assert_eq!(
            Issue::product_failed(ProductId::new("y"), "db down").to_string(),
            "product y failed: db down"
        );
    }

    #[test]
    fn only_page_skips_are_page_issues() {
        assert!(Issue::page_skipped(PageIndex::FIRST, "HTTP 500").is_page());
        assert!(!Issue::product_failed(ProductId::new("y"), "x").is_page());
    }
}

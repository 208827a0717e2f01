pub mod client;
pub mod envelope;

pub use client::{CatalogClient, CatalogClientConfig, ClientError, StatusPolicy};
pub use envelope::{CatalogPage, CompetitorEntry, SkuEntry};

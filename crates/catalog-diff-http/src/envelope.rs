use catalog_diff::Product;
use serde::{Deserialize, Deserializer};

/// Body of one catalog page.
/// `GET {base}?page={n}&app_key={key}`
///
/// Only page 1 is guaranteed to carry `number_of_pages`.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub skus: Vec<SkuEntry>,
    #[serde(default)]
    pub number_of_pages: Option<u32>,
}

/// A single product on a page.
///
/// A missing `oid` decodes as empty and is rejected later as a bad key, so
/// one malformed entry never costs its siblings on the same page.
#[derive(Debug, Deserialize)]
pub struct SkuEntry {
    #[serde(default)]
    pub oid: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub competitors: Vec<CompetitorEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CompetitorEntry {
    #[serde(default)]
    pub oid: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl CatalogPage {
    pub fn into_products(self) -> Vec<Product> {
        self.skus.into_iter().map(SkuEntry::into_product).collect()
    }
}

impl SkuEntry {
    pub fn into_product(self) -> Product {
        Product::new(self.oid, self.competitors.into_iter().map(|c| c.oid))
    }
}

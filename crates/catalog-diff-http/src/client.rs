use std::time::Duration;

use catalog_diff::{Page, PageError, PageIndex, PageSource};
use reqwest::{StatusCode, Url};

use crate::envelope::CatalogPage;

/// How non-success HTTP statuses are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Every non-success status means "no more pages". A server error
    /// therefore silently truncates the run.
    AnyFailureEndsPagination,
    /// Only 404 and 410 (and a 204 success) mean "no more pages"; any other
    /// non-success status is reported as [`PageError::Status`].
    #[default]
    DistinguishFaults,
}

impl StatusPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "any-failure-ends" | "lenient" => Some(Self::AnyFailureEndsPagination),
            "distinguish" | "strict" => Some(Self::DistinguishFaults),
            _ => None,
        }
    }
}

/// Configuration for a paginated catalog endpoint.
#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    pub label: String,
    pub base_url: String,
    pub app_key: Option<String>,
    pub status_policy: StatusPolicy,
    /// Per-request timeout. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

/// Errors building a [`CatalogClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid catalog url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build http client: {0}")]
    Build(String),
}

/// Fetches catalog pages over HTTP.
pub struct CatalogClient {
    config: CatalogClientConfig,
    base_url: Url,
    client: reqwest::Client,
}

impl CatalogClient {
    pub fn new(config: CatalogClientConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ClientError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = reqwest::Client::builder().user_agent("catalog-diff");
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    fn page_url(&self, page: PageIndex) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page", &page.to_string());
            if let Some(key) = &self.config.app_key {
                query.append_pair("app_key", key);
            }
        }
        url
    }

    /// GET one page. `Ok(None)` means the status says there is no such page.
    async fn get_body(&self, page: PageIndex) -> Result<Option<Vec<u8>>, PageError> {
        let response = self
            .client
            .get(self.page_url(page))
            .send()
            .await
            .map_err(|e| PageError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if !status.is_success() {
            return match self.config.status_policy {
                StatusPolicy::AnyFailureEndsPagination => {
                    tracing::debug!(%page, %status, "treating status as end of pages");
                    Ok(None)
                }
                StatusPolicy::DistinguishFaults
                    if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) =>
                {
                    Ok(None)
                }
                StatusPolicy::DistinguishFaults => Err(PageError::Status(status.as_u16())),
            };
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PageError::Network(format!("failed to read page body: {e}")))?;

        Ok(Some(bytes.to_vec()))
    }

    fn decode(page: PageIndex, body: &[u8]) -> Result<CatalogPage, PageError> {
        serde_json::from_slice(body).map_err(|e| PageError::Parse(format!("page {page}: {e}")))
    }
}

#[async_trait::async_trait]
impl PageSource for CatalogClient {
    fn label(&self) -> &str {
        &self.config.label
    }

    async fn fetch_page(&self, page: PageIndex) -> Result<Page, PageError> {
        match self.get_body(page).await? {
            None => Ok(Page::End),
            Some(body) => Ok(Page::Products(Self::decode(page, &body)?.into_products())),
        }
    }

    async fn page_count(&self) -> Result<u32, PageError> {
        let first = PageIndex::FIRST;
        let Some(body) = self.get_body(first).await? else {
            return Ok(0);
        };

        Self::decode(first, &body)?
            .number_of_pages
            .ok_or_else(|| PageError::Parse("page 1 has no number_of_pages".into()))
    }
}

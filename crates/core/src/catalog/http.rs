//! HTTP client for the book catalog search endpoint.
//!
//! Request shape: `GET <base_url>?query=<q>&page=<p>&size=<n>[&ttbkey=<key>]`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::CatalogConfig;
use crate::metrics::{CATALOG_REQUESTS, CATALOG_REQUEST_DURATION};

use super::{CatalogClient, CatalogError};

/// reqwest-backed catalog client.
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpCatalogClient {
    /// Create a new client. Every request is bounded by `config.timeout_secs`.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Unavailable(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    async fn request(
        &self,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<String, CatalogError> {
        let page = page.to_string();
        let size = page_size.to_string();
        let mut params: Vec<(&str, &str)> =
            vec![("query", query), ("page", page.as_str()), ("size", size.as_str())];
        if let Some(key) = &self.api_key {
            params.push(("ttbkey", key.as_str()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Catalog returned an error status");
            return Err(CatalogError::HttpError {
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(map_transport_error)
    }
}

fn map_transport_error(e: reqwest::Error) -> CatalogError {
    if e.is_timeout() {
        CatalogError::Unavailable("request timed out".to_string())
    } else if e.is_connect() {
        CatalogError::Unavailable(format!("connection failed: {}", e))
    } else {
        CatalogError::Unavailable(e.to_string())
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_page(
        &self,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<String, CatalogError> {
        debug!(query, page, page_size, "Catalog search");

        let started = Instant::now();
        let result = self.request(query, page, page_size).await;
        CATALOG_REQUEST_DURATION.observe(started.elapsed().as_secs_f64());

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        CATALOG_REQUESTS.with_label_values(&[status]).inc();

        result
    }
}

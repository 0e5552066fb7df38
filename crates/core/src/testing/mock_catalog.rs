//! Mock catalog client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::catalog::{CatalogClient, CatalogError};

/// Body returned for pages that were never scripted.
const EMPTY_PAGE: &str = r#"{"item": []}"#;

/// A recorded catalog request for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCatalogRequest {
    pub query: String,
    pub page: u32,
    pub page_size: u32,
}

/// Mock implementation of the CatalogClient trait.
///
/// Provides controllable behavior for testing:
/// - Return scripted response bodies per (query, page)
/// - Count and record upstream calls
/// - Simulate latency and failures
///
/// # Example
///
/// ```rust,ignore
/// use bookjourney_core::testing::{MockCatalogClient, fixtures};
///
/// let client = MockCatalogClient::new();
/// client.set_page("dune", 1, fixtures::catalog_page(&["Dune"])).await;
///
/// let body = client.fetch_page("dune", 1, 10).await?;
/// assert_eq!(client.fetch_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockCatalogClient {
    /// Response bodies by (query, page).
    pages: Arc<RwLock<HashMap<(String, u32), String>>>,
    /// Recorded requests.
    requests: Arc<RwLock<Vec<RecordedCatalogRequest>>>,
    /// Number of fetch_page calls, readable without awaiting.
    fetches: Arc<AtomicUsize>,
    /// Latency applied to every call.
    delay: Arc<RwLock<Option<Duration>>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<CatalogError>>>,
}

impl Default for MockCatalogClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalogClient {
    /// Create a mock that answers every request with an empty page.
    pub fn new() -> Self {
        Self {
            pages: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            fetches: Arc::new(AtomicUsize::new(0)),
            delay: Arc::new(RwLock::new(None)),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    // =========================================================================
    // Response Configuration
    // =========================================================================

    /// Script the raw response body for one (query, page).
    pub async fn set_page(&self, query: &str, page: u32, body: String) {
        self.pages
            .write()
            .await
            .insert((query.to_string(), page), body);
    }

    /// Apply a latency to every subsequent call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    // =========================================================================
    // Request Recording
    // =========================================================================

    /// Number of upstream calls made so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Get all recorded requests.
    pub async fn recorded_requests(&self) -> Vec<RecordedCatalogRequest> {
        self.requests.read().await.clone()
    }

    // =========================================================================
    // Error Injection
    // =========================================================================

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }
}

#[async_trait]
impl CatalogClient for MockCatalogClient {
    async fn fetch_page(
        &self,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<String, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(RecordedCatalogRequest {
            query: query.to_string(),
            page,
            page_size,
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(self
            .pages
            .read()
            .await
            .get(&(query.to_string(), page))
            .cloned()
            .unwrap_or_else(|| EMPTY_PAGE.to_string()))
    }
}

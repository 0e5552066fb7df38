//! Cache Store implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use moka::sync::Cache;
use tracing::{debug, info, warn};

use crate::catalog::{
    classify, decode, BookDetail, BookSummary, CatalogClient, CatalogError, PageKey,
    RawCatalogItem, SearchRequest,
};
use crate::config::CacheConfig;
use crate::metrics::{CACHE_LOOKUPS, CATALOG_DECODE_FAILURES, SINGLE_FLIGHT_JOINS};

use super::CacheError;

type Page = Arc<Vec<BookSummary>>;
type PageFetch = Shared<BoxFuture<'static, Result<Page, CatalogError>>>;
type InFlight = Arc<Mutex<HashMap<PageKey, PageFetch>>>;

/// Read-through cache of catalog pages and book details.
///
/// Guarantees at most one catalog fetch in flight per (query, page): the
/// first miss registers a shared fetch, later misses for the same key wait
/// on it and get the same outcome. Different keys fetch independently.
///
/// Construct once and share behind an `Arc`.
pub struct BookCache {
    client: Arc<dyn CatalogClient>,
    pages: Cache<PageKey, Page>,
    details: Cache<String, Arc<BookDetail>>,
    in_flight: InFlight,
}

impl BookCache {
    /// Create a cache with the given eviction policy.
    pub fn new(client: Arc<dyn CatalogClient>, config: &CacheConfig) -> Self {
        let pages = Cache::builder()
            .max_capacity(config.max_pages)
            .time_to_live(Duration::from_secs(config.page_ttl_secs))
            .build();
        let details = Cache::builder()
            .max_capacity(config.max_details)
            .time_to_live(Duration::from_secs(config.detail_ttl_secs))
            .build();

        Self {
            client,
            pages,
            details,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the cached page for `request`, fetching and caching it on a miss.
    ///
    /// A failed fetch is not cached; the next call for the same key fetches again.
    pub async fn get_or_fetch_page(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<BookSummary>, CacheError> {
        let key = request.cache_key();

        if let Some(page) = self.pages.get(&key) {
            CACHE_LOOKUPS.with_label_values(&["page", "hit"]).inc();
            debug!(query = %key.query, page = key.page, "Page cache hit");
            return Ok(page.as_ref().clone());
        }
        CACHE_LOOKUPS.with_label_values(&["page", "miss"]).inc();

        let fetch = {
            let mut in_flight = lock(&self.in_flight);

            // A fetch may have finished between the first lookup and taking
            // the lock; it writes the page before leaving the map.
            if let Some(page) = self.pages.get(&key) {
                return Ok(page.as_ref().clone());
            }

            match in_flight.get(&key) {
                Some(fetch) => {
                    SINGLE_FLIGHT_JOINS.inc();
                    debug!(query = %key.query, page = key.page, "Joining in-flight fetch");
                    fetch.clone()
                }
                None => {
                    let fetch = self.start_fetch(key.clone(), request.page_size());
                    in_flight.insert(key, fetch.clone());
                    fetch
                }
            }
        };

        let page = fetch.await?;
        Ok(page.as_ref().clone())
    }

    /// Return the cached detail for `isbn` with `is_favorite` unset.
    ///
    /// Fails with [`CacheError::DetailNotCached`] on a miss; there is no
    /// per-ISBN upstream lookup.
    pub fn get_or_fetch_detail(&self, isbn: &str) -> Result<BookDetail, CacheError> {
        match self.details.get(isbn) {
            Some(detail) => {
                CACHE_LOOKUPS.with_label_values(&["detail", "hit"]).inc();
                Ok(detail.as_ref().clone())
            }
            None => {
                CACHE_LOOKUPS.with_label_values(&["detail", "miss"]).inc();
                Err(CacheError::DetailNotCached(isbn.to_string()))
            }
        }
    }

    /// Whether the page for `request` is currently cached.
    pub fn contains_page(&self, request: &SearchRequest) -> bool {
        self.pages.contains_key(&request.cache_key())
    }

    /// Whether a detail for `isbn` is currently cached.
    pub fn contains_detail(&self, isbn: &str) -> bool {
        self.details.contains_key(isbn)
    }

    /// Number of page fetches currently in flight.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Spawn the fetch for `key` and return a handle its waiters can share.
    ///
    /// The fetch runs on its own task, so it completes (and leaves the
    /// in-flight map) even when every waiter has given up on it.
    fn start_fetch(&self, key: PageKey, page_size: u32) -> PageFetch {
        let client = Arc::clone(&self.client);
        let pages = self.pages.clone();
        let details = self.details.clone();
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key,
        };

        let handle = tokio::spawn(async move {
            fetch_and_populate(client.as_ref(), &guard.key, page_size, &pages, &details).await
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                warn!(error = %e, "Catalog fetch task aborted");
                Err(CatalogError::Unavailable(format!("fetch task aborted: {}", e)))
            })
        }
        .boxed()
        .shared()
    }
}

/// Removes a key from the in-flight map when its fetch task ends, including
/// on panic or cancellation.
struct InFlightGuard {
    in_flight: InFlight,
    key: PageKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.key);
    }
}

/// Fetch one page, decode it, and write both the page and every detail.
async fn fetch_and_populate(
    client: &dyn CatalogClient,
    key: &PageKey,
    page_size: u32,
    pages: &Cache<PageKey, Page>,
    details: &Cache<String, Arc<BookDetail>>,
) -> Result<Page, CatalogError> {
    let raw = client.fetch_page(&key.query, key.page, page_size).await?;

    let items = decode(&raw).inspect_err(|_| CATALOG_DECODE_FAILURES.inc())?;

    let mut summaries = Vec::with_capacity(items.len());
    for item in items.into_iter().take(page_size as usize) {
        let detail = build_detail(item);
        summaries.push(BookSummary::from(&detail));
        details.insert(detail.isbn.clone(), Arc::new(detail));
    }

    info!(
        query = %key.query,
        page = key.page,
        books = summaries.len(),
        "Cached catalog page"
    );

    let page = Arc::new(summaries);
    pages.insert(key.clone(), Arc::clone(&page));
    Ok(page)
}

fn build_detail(item: RawCatalogItem) -> BookDetail {
    let isbn = item.resolved_isbn().unwrap_or_default().to_string();
    let genre = classify(item.category_text.as_deref().unwrap_or_default());

    BookDetail {
        title: item.title.unwrap_or_default(),
        author: item.author.unwrap_or_default(),
        isbn,
        cover_url: item.cover_url.unwrap_or_default(),
        description: item.description.unwrap_or_default(),
        genre,
        publisher: item.publisher.unwrap_or_default(),
        published_date: item.published_date.unwrap_or_default(),
        is_favorite: false,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Genre;
    use crate::testing::{fixtures, MockCatalogClient};

    fn cache_with(client: Arc<MockCatalogClient>) -> BookCache {
        BookCache::new(client, &CacheConfig::default())
    }

    #[tokio::test]
    async fn test_miss_then_hit_uses_one_fetch() {
        let client = Arc::new(MockCatalogClient::new());
        client
            .set_page("dune", 1, fixtures::catalog_page(&["Dune", "Dune Messiah"]))
            .await;
        let cache = cache_with(Arc::clone(&client));
        let request = SearchRequest::new("dune", 1, 10);

        let first = cache.get_or_fetch_page(&request).await.unwrap();
        let second = cache.get_or_fetch_page(&request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].title, "Dune");
        assert_eq!(first[1].title, "Dune Messiah");
        assert_eq!(client.fetch_count(), 1);
        assert!(cache.contains_page(&request));
    }

    #[tokio::test]
    async fn test_page_fetch_writes_through_details() {
        let client = Arc::new(MockCatalogClient::new());
        client
            .set_page(
                "herbert",
                1,
                r#"{item: [{title: 'Dune', author: 'Frank Herbert', isbn13: '9780441013593',
                   cover: 'https://covers.example.com/dune.jpg', description: 'Spice',
                   categoryName: 'Fiction>Science Fiction', publisher: 'Ace', pubDate: '1990-09-01'}]}"#
                    .to_string(),
            )
            .await;
        let cache = cache_with(Arc::clone(&client));

        assert!(matches!(
            cache.get_or_fetch_detail("9780441013593"),
            Err(CacheError::DetailNotCached(_))
        ));

        cache
            .get_or_fetch_page(&SearchRequest::new("herbert", 1, 10))
            .await
            .unwrap();

        let detail = cache.get_or_fetch_detail("9780441013593").unwrap();
        assert_eq!(detail.title, "Dune");
        assert_eq!(detail.author, "Frank Herbert");
        assert_eq!(detail.genre, Genre::ScienceFiction);
        assert_eq!(detail.publisher, "Ace");
        assert_eq!(detail.published_date, "1990-09-01");
        assert!(!detail.is_favorite);
        assert_eq!(client.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_isbn10_fallback_is_used_as_detail_key() {
        let client = Arc::new(MockCatalogClient::new());
        client
            .set_page(
                "ender",
                1,
                r#"{"item": [{"title": "Ender's Game", "isbn13": "", "isbn": "8901234567"}]}"#
                    .to_string(),
            )
            .await;
        let cache = cache_with(Arc::clone(&client));

        let page = cache
            .get_or_fetch_page(&SearchRequest::new("ender", 1, 10))
            .await
            .unwrap();
        assert_eq!(page[0].isbn, "8901234567");
        assert!(cache.contains_detail("8901234567"));
        assert_eq!(
            cache.get_or_fetch_detail("8901234567").unwrap().genre,
            Genre::Other
        );
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let client = Arc::new(MockCatalogClient::new());
        client
            .set_page("dune", 1, fixtures::catalog_page(&["Dune"]))
            .await;
        client
            .set_next_error(CatalogError::Unavailable("timeout".to_string()))
            .await;
        let cache = cache_with(Arc::clone(&client));
        let request = SearchRequest::new("dune", 1, 10);

        let result = cache.get_or_fetch_page(&request).await;
        assert_eq!(
            result,
            Err(CacheError::Catalog(CatalogError::Unavailable(
                "timeout".to_string()
            )))
        );
        assert!(!cache.contains_page(&request));
        assert_eq!(cache.in_flight_count(), 0);

        let page = cache.get_or_fetch_page(&request).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(client.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_parse_error_propagates() {
        let client = Arc::new(MockCatalogClient::new());
        client
            .set_page("broken", 1, r#"{"item": [{"title": "No ISBN"}]}"#.to_string())
            .await;
        let cache = cache_with(Arc::clone(&client));
        let request = SearchRequest::new("broken", 1, 10);

        let result = cache.get_or_fetch_page(&request).await;
        assert!(matches!(
            result,
            Err(CacheError::Catalog(CatalogError::ParseError(_)))
        ));
        assert!(!cache.contains_page(&request));
    }

    #[tokio::test]
    async fn test_empty_result_is_cached() {
        let client = Arc::new(MockCatalogClient::new());
        let cache = cache_with(Arc::clone(&client));
        let request = SearchRequest::new("nothing matches", 1, 10);

        assert!(cache.get_or_fetch_page(&request).await.unwrap().is_empty());
        assert!(cache.get_or_fetch_page(&request).await.unwrap().is_empty());
        assert_eq!(client.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_page_is_truncated_to_page_size() {
        let client = Arc::new(MockCatalogClient::new());
        client
            .set_page("dune", 1, fixtures::catalog_page(&["A", "B", "C", "D"]))
            .await;
        let cache = cache_with(Arc::clone(&client));

        let page = cache
            .get_or_fetch_page(&SearchRequest::new("dune", 1, 3))
            .await
            .unwrap();
        let titles: Vec<_> = page.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_page_size_is_forwarded_to_catalog() {
        let client = Arc::new(MockCatalogClient::new());
        let cache = cache_with(Arc::clone(&client));

        cache
            .get_or_fetch_page(&SearchRequest::new("dune", 4, 25))
            .await
            .unwrap();

        let requests = client.recorded_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query, "dune");
        assert_eq!(requests[0].page, 4);
        assert_eq!(requests[0].page_size, 25);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_fetch() {
        let client = Arc::new(MockCatalogClient::new());
        client
            .set_page("dune", 1, fixtures::catalog_page(&["Dune", "Children of Dune"]))
            .await;
        client.set_delay(Duration::from_millis(200)).await;
        let cache = Arc::new(cache_with(Arc::clone(&client)));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    cache
                        .get_or_fetch_page(&SearchRequest::new("dune", 1, 10))
                        .await
                })
            })
            .collect();

        for handle in handles {
            let page = handle.await.unwrap().unwrap();
            assert_eq!(page.len(), 2);
        }

        assert_eq!(client.fetch_count(), 1);
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_failure() {
        let client = Arc::new(MockCatalogClient::new());
        client.set_delay(Duration::from_millis(200)).await;
        client
            .set_next_error(CatalogError::HttpError { status: 502 })
            .await;
        let cache = Arc::new(cache_with(Arc::clone(&client)));

        let results = futures::future::join_all((0..10).map(|_| {
            let cache = Arc::clone(&cache);
            async move {
                cache
                    .get_or_fetch_page(&SearchRequest::new("dune", 1, 10))
                    .await
            }
        }))
        .await;

        for result in results {
            assert_eq!(
                result,
                Err(CacheError::Catalog(CatalogError::HttpError { status: 502 }))
            );
        }
        assert_eq!(client.fetch_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_keys_fetch_concurrently() {
        let client = Arc::new(MockCatalogClient::new());
        client.set_delay(Duration::from_millis(300)).await;
        let cache = Arc::new(cache_with(Arc::clone(&client)));

        let started = std::time::Instant::now();
        let req1 = SearchRequest::new("dune", 1, 10);
        let req2 = SearchRequest::new("dune", 2, 10);
        let (a, b) = tokio::join!(
            cache.get_or_fetch_page(&req1),
            cache.get_or_fetch_page(&req2),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(client.fetch_count(), 2);
        // Serialized fetches would take at least 600ms.
        assert!(started.elapsed() < Duration::from_millis(550));
    }

    async fn wait_for_no_fetches(cache: &BookCache) {
        for _ in 0..200 {
            if cache.in_flight_count() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("fetch still in flight after 2s");
    }

    #[tokio::test]
    async fn test_abandoned_fetch_still_completes() {
        let client = Arc::new(MockCatalogClient::new());
        client
            .set_page("dune", 2, fixtures::catalog_page(&["Dune Messiah"]))
            .await;
        client.set_delay(Duration::from_millis(300)).await;
        let cache = cache_with(Arc::clone(&client));
        let request = SearchRequest::new("dune", 2, 10);

        let waited =
            tokio::time::timeout(Duration::from_millis(50), cache.get_or_fetch_page(&request))
                .await;
        assert!(waited.is_err());
        assert_eq!(cache.in_flight_count(), 1);

        wait_for_no_fetches(&cache).await;
        assert!(cache.contains_page(&request));
        assert!(cache.contains_detail(&fixtures::isbn(1)));

        let page = cache.get_or_fetch_page(&request).await.unwrap();
        assert_eq!(page[0].title, "Dune Messiah");
        assert_eq!(client.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_failed_fetch_is_not_reused() {
        let client = Arc::new(MockCatalogClient::new());
        client
            .set_page("dune", 2, fixtures::catalog_page(&["Dune Messiah"]))
            .await;
        client.set_delay(Duration::from_millis(300)).await;
        client
            .set_next_error(CatalogError::Unavailable("request timed out".to_string()))
            .await;
        let cache = cache_with(Arc::clone(&client));
        let request = SearchRequest::new("dune", 2, 10);

        let waited =
            tokio::time::timeout(Duration::from_millis(50), cache.get_or_fetch_page(&request))
                .await;
        assert!(waited.is_err());

        wait_for_no_fetches(&cache).await;
        assert!(!cache.contains_page(&request));

        // The next caller starts a fresh fetch instead of inheriting the failure.
        client.set_delay(Duration::ZERO).await;
        let page = cache.get_or_fetch_page(&request).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(client.fetch_count(), 2);
    }

    #[test]
    fn test_build_detail_defaults_missing_fields() {
        let detail = build_detail(RawCatalogItem {
            isbn13: Some("9780000000001".to_string()),
            ..Default::default()
        });
        assert_eq!(detail.isbn, "9780000000001");
        assert_eq!(detail.title, "");
        assert_eq!(detail.genre, Genre::Other);
        assert!(!detail.is_favorite);
    }
}

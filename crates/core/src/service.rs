//! Book search service.
//!
//! Public entry point of the core: catalog search with next-page
//! prefetch, book detail with the caller's favorite flag, and the
//! most popular persisted book.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{BookCache, CacheError};
use crate::catalog::{BookDetail, BookSummary, CatalogError, SearchRequest};
use crate::library::{BookRepository, RepositoryError};
use crate::prefetch::{PoolStatus, Prefetcher};

/// Errors returned by [`BookService`].
#[derive(Debug, Error)]
pub enum BookServiceError {
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Catalog returned HTTP {status}")]
    CatalogHttpError { status: u16 },

    /// The payload keeps the decoder message for logs; the display text is fixed.
    #[error("Upstream data error")]
    CatalogParseError(String),

    #[error("Book not found: {0}")]
    DetailNotCached(String),

    #[error("No popular book found")]
    NoPopularBookFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl BookServiceError {
    /// Whether retrying later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookServiceError::CatalogUnavailable(_))
    }

    /// Whether the error means the requested resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BookServiceError::DetailNotCached(_) | BookServiceError::NoPopularBookFound
        )
    }
}

impl From<CacheError> for BookServiceError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Catalog(CatalogError::Unavailable(msg)) => {
                BookServiceError::CatalogUnavailable(msg)
            }
            CacheError::Catalog(CatalogError::HttpError { status }) => {
                BookServiceError::CatalogHttpError { status }
            }
            CacheError::Catalog(CatalogError::ParseError(msg)) => {
                BookServiceError::CatalogParseError(msg)
            }
            CacheError::DetailNotCached(isbn) => BookServiceError::DetailNotCached(isbn),
        }
    }
}

/// The persisted book with the most reading rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopularBook {
    pub book_id: i64,
    pub room_count: u64,
    pub book: BookDetail,
}

/// Search, detail and popular-book operations over the shared cache.
pub struct BookService {
    cache: Arc<BookCache>,
    prefetcher: Prefetcher,
    repository: Arc<dyn BookRepository>,
}

impl BookService {
    pub fn new(
        cache: Arc<BookCache>,
        prefetcher: Prefetcher,
        repository: Arc<dyn BookRepository>,
    ) -> Self {
        Self {
            cache,
            prefetcher,
            repository,
        }
    }

    /// Return one page of results and schedule a prefetch of the next page.
    ///
    /// The prefetch is only scheduled once the current page was served; its
    /// outcome never reaches the caller.
    pub async fn search(
        &self,
        request: &SearchRequest,
    ) -> Result<Vec<BookSummary>, BookServiceError> {
        let page = self.cache.get_or_fetch_page(request).await?;

        self.prefetcher.schedule(request.next_page());

        debug!(
            query = %request.query(),
            page = request.page(),
            books = page.len(),
            "Search served"
        );
        Ok(page)
    }

    /// Cached detail for `isbn`, with `is_favorite` set from the store.
    ///
    /// Books that were never persisted keep `is_favorite == false`.
    pub fn book_detail(&self, isbn: &str, user_id: i64) -> Result<BookDetail, BookServiceError> {
        let detail = self.cache.get_or_fetch_detail(isbn)?;

        match self.repository.find_book_by_isbn(isbn)? {
            Some(book) => {
                let is_favorite = self.repository.exists_active_favorite(user_id, book.id)?;
                debug!(isbn, user_id, book_id = book.id, is_favorite, "Favorite overlay applied");
                Ok(detail.with_favorite(is_favorite))
            }
            None => {
                debug!(isbn, "Book not persisted, favorite flag left unset");
                Ok(detail)
            }
        }
    }

    /// The persisted book with the most reading rooms.
    pub fn popular_book(&self) -> Result<PopularBook, BookServiceError> {
        let record = self
            .repository
            .find_book_with_most_rooms()?
            .ok_or(BookServiceError::NoPopularBookFound)?;

        info!(
            book_id = record.book.id,
            room_count = record.room_count,
            "Popular book resolved"
        );

        Ok(PopularBook {
            book_id: record.book.id,
            room_count: record.room_count,
            book: record.book.to_detail(),
        })
    }

    /// Prefetch pool statistics.
    pub fn prefetch_status(&self) -> PoolStatus {
        self.prefetcher.status()
    }
}

//! Read-through cache in front of the external catalog.
//!
//! Search pages are cached by (query, page) and book details by ISBN.
//! Details are written as a side effect of fetching a page, so a detail
//! lookup never needs its own upstream call.

mod store;

pub use store::BookCache;

use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors returned by cache lookups.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Populating a page from the catalog failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// No cached detail for this ISBN; details are only filled by page fetches.
    #[error("Book detail not cached: {0}")]
    DetailNotCached(String),
}

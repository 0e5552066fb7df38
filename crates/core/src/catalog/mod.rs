//! External book catalog access.
//!
//! This module holds the catalog client (one HTTP call per search page),
//! the tolerant decoder for the catalog's loosely formed JSON, and the
//! genre classifier applied to decoded items.

mod decode;
mod genre;
mod http;
mod types;

pub use decode::{decode, normalize};
pub use genre::{classify, Genre};
pub use http::HttpCatalogClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when fetching or decoding catalog pages.
///
/// `Clone` so that one failed fetch can be reported to every caller that
/// was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Network failure or timeout.
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    /// Catalog answered with a non-2xx status.
    #[error("Catalog returned HTTP {status}")]
    HttpError { status: u16 },

    /// Response could not be decoded.
    #[error("Failed to parse catalog response: {0}")]
    ParseError(String),
}

impl CatalogError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::Unavailable(_) => "unavailable",
            CatalogError::HttpError { .. } => "http_error",
            CatalogError::ParseError(_) => "parse_error",
        }
    }
}

/// Trait for the external catalog search endpoint.
///
/// Implementations perform exactly one upstream request per call and do
/// not retry.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch one page of search results as raw response text.
    async fn fetch_page(
        &self,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<String, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CatalogError::Unavailable("timeout".to_string()).kind(),
            "unavailable"
        );
        assert_eq!(CatalogError::HttpError { status: 503 }.kind(), "http_error");
        assert_eq!(
            CatalogError::ParseError("bad".to_string()).kind(),
            "parse_error"
        );
    }

    #[test]
    fn test_error_display() {
        let err = CatalogError::HttpError { status: 429 };
        assert_eq!(err.to_string(), "Catalog returned HTTP 429");
    }
}

//! Types for catalog search requests and decoded books.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize};

use super::genre::Genre;

// ============================================================================
// Search Requests
// ============================================================================

/// A paginated search against the external catalog.
///
/// Immutable once built. Two requests are equal (and hash the same) when
/// their query text and page match; the page size is carried along but is
/// not part of the cache identity.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    query: String,
    page: u32,
    page_size: u32,
}

impl SearchRequest {
    /// Create a request. Page and page size are clamped to at least 1.
    pub fn new(query: impl Into<String>, page: u32, page_size: u32) -> Self {
        Self {
            query: query.into(),
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// 1-indexed page number.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The same search, one page further.
    pub fn next_page(&self) -> Self {
        Self {
            query: self.query.clone(),
            page: self.page.saturating_add(1),
            page_size: self.page_size,
        }
    }

    /// Key under which this request's page is cached.
    pub fn cache_key(&self) -> PageKey {
        PageKey {
            query: self.query.clone(),
            page: self.page,
        }
    }
}

impl PartialEq for SearchRequest {
    fn eq(&self, other: &Self) -> bool {
        self.query == other.query && self.page == other.page
    }
}

impl Eq for SearchRequest {}

impl Hash for SearchRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.query.hash(state);
        self.page.hash(state);
    }
}

/// Cache key of a search page: (query text, page).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageKey {
    pub query: String,
    pub page: u32,
}

// ============================================================================
// Decoded Catalog Items
// ============================================================================

/// One item of a catalog response, before any interpretation.
///
/// Every field is optional; numbers are accepted where text is expected
/// since the catalog is not consistent about ISBN types.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCatalogItem {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub isbn13: Option<String>,
    #[serde(rename = "isbn", default, deserialize_with = "lenient_text")]
    pub isbn10: Option<String>,
    #[serde(rename = "cover", default, deserialize_with = "lenient_text")]
    pub cover_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(rename = "categoryName", default, deserialize_with = "lenient_text")]
    pub category_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub publisher: Option<String>,
    #[serde(rename = "pubDate", default, deserialize_with = "lenient_text")]
    pub published_date: Option<String>,
}

impl RawCatalogItem {
    /// The 13-digit ISBN, or the 10-digit one when the former is absent or empty.
    pub fn resolved_isbn(&self) -> Option<&str> {
        match self.isbn13.as_deref() {
            Some(isbn) if !isbn.is_empty() => Some(isbn),
            _ => self.isbn10.as_deref().filter(|isbn| !isbn.is_empty()),
        }
    }
}

/// Accept a string, a number (rendered as text) or null.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!(
            "expected text, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ============================================================================
// Books
// ============================================================================

/// A book as listed in search results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookSummary {
    pub title: String,
    pub author: String,
    /// Resolved ISBN (13-digit, falling back to 10-digit).
    pub isbn: String,
    pub cover_url: String,
}

impl From<&BookDetail> for BookSummary {
    fn from(detail: &BookDetail) -> Self {
        Self {
            title: detail.title.clone(),
            author: detail.author.clone(),
            isbn: detail.isbn.clone(),
            cover_url: detail.cover_url.clone(),
        }
    }
}

/// Full information about a book.
///
/// `is_favorite` is user specific: cached details always carry `false` and
/// the flag is overlaid per read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookDetail {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub cover_url: String,
    pub description: String,
    pub genre: Genre,
    pub publisher: String,
    pub published_date: String,
    #[serde(default)]
    pub is_favorite: bool,
}

impl BookDetail {
    /// Same book with the favorite flag overlaid.
    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_search_request_clamps_page() {
        let request = SearchRequest::new("dune", 0, 0);
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), 1);
    }

    #[test]
    fn test_next_page_keeps_query_and_size() {
        let request = SearchRequest::new("dune", 3, 20);
        let next = request.next_page();
        assert_eq!(next.query(), "dune");
        assert_eq!(next.page(), 4);
        assert_eq!(next.page_size(), 20);
        // original untouched
        assert_eq!(request.page(), 3);
    }

    #[test]
    fn test_equality_ignores_page_size() {
        let a = SearchRequest::new("dune", 1, 10);
        let b = SearchRequest::new("dune", 1, 50);
        let c = SearchRequest::new("dune", 2, 10);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a.clone(), b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(a.cache_key(), SearchRequest::new("dune", 1, 99).cache_key());
    }

    #[test]
    fn test_resolved_isbn_falls_back_on_empty_isbn13() {
        let item = RawCatalogItem {
            isbn13: Some(String::new()),
            isbn10: Some("8901234567".to_string()),
            ..Default::default()
        };
        assert_eq!(item.resolved_isbn(), Some("8901234567"));
    }

    #[test]
    fn test_resolved_isbn_prefers_isbn13() {
        let item = RawCatalogItem {
            isbn13: Some("9788901234567".to_string()),
            isbn10: Some("8901234567".to_string()),
            ..Default::default()
        };
        assert_eq!(item.resolved_isbn(), Some("9788901234567"));
    }

    #[test]
    fn test_resolved_isbn_missing() {
        assert_eq!(RawCatalogItem::default().resolved_isbn(), None);

        let blank = RawCatalogItem {
            isbn13: Some(String::new()),
            isbn10: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(blank.resolved_isbn(), None);
    }

    #[test]
    fn test_raw_item_accepts_numbers_and_nulls() {
        let json = r#"{"title": "Dune", "isbn13": 9780441013593, "author": null}"#;
        let item: RawCatalogItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.isbn13.as_deref(), Some("9780441013593"));
        assert_eq!(item.author, None);
    }

    #[test]
    fn test_raw_item_rejects_structured_field() {
        let json = r#"{"title": {"main": "Dune"}, "isbn13": "9780441013593"}"#;
        let result: Result<RawCatalogItem, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_summary_from_detail() {
        let detail = BookDetail {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: "9780441013593".to_string(),
            cover_url: "https://covers.example.com/dune.jpg".to_string(),
            description: "Spice.".to_string(),
            genre: Genre::ScienceFiction,
            publisher: "Ace".to_string(),
            published_date: "1990-09-01".to_string(),
            is_favorite: false,
        };
        let summary = BookSummary::from(&detail);
        assert_eq!(summary.title, "Dune");
        assert_eq!(summary.isbn, "9780441013593");
        assert!(detail.with_favorite(true).is_favorite);
    }
}

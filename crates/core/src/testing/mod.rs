//! Testing utilities and mock implementations.
//!
//! Mocks for the catalog client and the book repository, so the cache,
//! prefetcher and book service can be exercised without a network or a
//! database.
//!
//! # Example
//!
//! ```rust,ignore
//! use bookjourney_core::testing::{fixtures, MockBookRepository, MockCatalogClient};
//!
//! let client = MockCatalogClient::new();
//! client.set_page("dune", 1, fixtures::catalog_page(&["Dune", "Dune Messiah"])).await;
//!
//! let repository = MockBookRepository::new();
//! repository.add_book(fixtures::stored_book(1, "9780000000001", "Dune"));
//! ```

mod mock_catalog;
mod mock_repository;

pub use mock_catalog::{MockCatalogClient, RecordedCatalogRequest};
pub use mock_repository::MockBookRepository;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Value};

    use crate::catalog::Genre;
    use crate::library::StoredBook;

    /// ISBN-13 for the n-th fixture book, starting at 1 (`9780000000001`).
    pub fn isbn(n: usize) -> String {
        format!("978{:010}", n)
    }

    /// One catalog item as the upstream sends it.
    pub fn catalog_item(title: &str, isbn13: &str) -> Value {
        json!({
            "title": title,
            "author": "Test Author",
            "isbn13": isbn13,
            "isbn": "",
            "cover": format!("https://covers.example.com/{}.jpg", isbn13),
            "description": format!("About {}", title),
            "categoryName": "Fiction>Science Fiction",
            "publisher": "Test Press",
            "pubDate": "2020-01-01"
        })
    }

    /// A catalog response body with one item per title, numbered with [`isbn`].
    pub fn catalog_page(titles: &[&str]) -> String {
        let items: Vec<Value> = titles
            .iter()
            .enumerate()
            .map(|(i, title)| catalog_item(title, &isbn(i + 1)))
            .collect();
        json!({ "item": items }).to_string()
    }

    /// A persisted book.
    pub fn stored_book(id: i64, isbn: &str, title: &str) -> StoredBook {
        StoredBook {
            id,
            isbn: isbn.to_string(),
            title: title.to_string(),
            author: "Test Author".to_string(),
            cover_url: String::new(),
            description: String::new(),
            genre: Genre::Novel,
            publisher: "Test Press".to_string(),
            published_date: "2020-01-01".to_string(),
        }
    }
}

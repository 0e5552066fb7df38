//! Persisted book records.
//!
//! The relational store (books, reading rooms, favorites) is owned by
//! another part of the system. This module defines the queries the book
//! service needs from it and a SQLite implementation.

mod sqlite;

pub use sqlite::SqliteBookRepository;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{BookDetail, Genre};

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// A book saved in the relational store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBook {
    pub id: i64,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub cover_url: String,
    pub description: String,
    pub genre: Genre,
    pub publisher: String,
    pub published_date: String,
}

impl StoredBook {
    /// The stored data as a [`BookDetail`] with `is_favorite` unset.
    pub fn to_detail(&self) -> BookDetail {
        BookDetail {
            title: self.title.clone(),
            author: self.author.clone(),
            isbn: self.isbn.clone(),
            cover_url: self.cover_url.clone(),
            description: self.description.clone(),
            genre: self.genre,
            publisher: self.publisher.clone(),
            published_date: self.published_date.clone(),
            is_favorite: false,
        }
    }
}

/// Result of the "book with most rooms" query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopularBookRecord {
    pub book: StoredBook,
    pub room_count: u64,
}

/// Queries the book service runs against the relational store.
pub trait BookRepository: Send + Sync {
    /// Look up a persisted book by ISBN.
    fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<StoredBook>, RepositoryError>;

    /// Whether `user_id` has an active favorite on the book.
    fn exists_active_favorite(&self, user_id: i64, book_id: i64) -> Result<bool, RepositoryError>;

    /// The book with the most reading rooms, or `None` when no book is stored.
    fn find_book_with_most_rooms(&self) -> Result<Option<PopularBookRecord>, RepositoryError>;
}

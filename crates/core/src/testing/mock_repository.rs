//! In-memory book repository for testing.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::library::{BookRepository, PopularBookRecord, RepositoryError, StoredBook};

#[derive(Debug, Default)]
struct State {
    books: Vec<StoredBook>,
    /// Room count per book id.
    rooms: Vec<(i64, u64)>,
    favorites: HashSet<(i64, i64)>,
    fail: Option<String>,
}

/// Mock implementation of the BookRepository trait.
#[derive(Debug, Default)]
pub struct MockBookRepository {
    state: Mutex<State>,
}

impl MockBookRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a book.
    pub fn add_book(&self, book: StoredBook) {
        self.state().books.push(book);
    }

    /// Set the number of rooms opened for a book.
    pub fn set_room_count(&self, book_id: i64, count: u64) {
        let mut state = self.state();
        state.rooms.retain(|(id, _)| *id != book_id);
        state.rooms.push((book_id, count));
    }

    /// Add an active favorite.
    pub fn add_favorite(&self, user_id: i64, book_id: i64) {
        self.state().favorites.insert((user_id, book_id));
    }

    /// Make every query fail with a database error.
    pub fn fail_with(&self, message: &str) {
        self.state().fail = Some(message.to_string());
    }

    fn check(&self) -> Result<(), RepositoryError> {
        match &self.state().fail {
            Some(message) => Err(RepositoryError::Database(message.clone())),
            None => Ok(()),
        }
    }
}

impl BookRepository for MockBookRepository {
    fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<StoredBook>, RepositoryError> {
        self.check()?;
        Ok(self.state().books.iter().find(|b| b.isbn == isbn).cloned())
    }

    fn exists_active_favorite(&self, user_id: i64, book_id: i64) -> Result<bool, RepositoryError> {
        self.check()?;
        Ok(self.state().favorites.contains(&(user_id, book_id)))
    }

    fn find_book_with_most_rooms(&self) -> Result<Option<PopularBookRecord>, RepositoryError> {
        self.check()?;
        let state = self.state();

        let room_count = |id: i64| {
            state
                .rooms
                .iter()
                .find(|(book_id, _)| *book_id == id)
                .map(|(_, count)| *count)
                .unwrap_or(0)
        };

        // Ties go to the first added book.
        let mut best: Option<PopularBookRecord> = None;
        for book in &state.books {
            let count = room_count(book.id);
            if best.as_ref().map_or(true, |b| count > b.room_count) {
                best = Some(PopularBookRecord {
                    book: book.clone(),
                    room_count: count,
                });
            }
        }
        Ok(best)
    }
}

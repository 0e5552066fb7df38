//! SQLite-backed book repository.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::{BookRepository, PopularBookRecord, RepositoryError, StoredBook};
use crate::catalog::BookDetail;

const BOOK_COLUMNS: &str =
    "b.id, b.isbn, b.title, b.author, b.cover_url, b.description, b.genre, b.publisher, b.published_date";

/// SQLite-backed book repository.
pub struct SqliteBookRepository {
    conn: Mutex<Connection>,
}

impl SqliteBookRepository {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(|e| RepositoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory repository (useful for testing).
    pub fn in_memory() -> Result<Self, RepositoryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| RepositoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RepositoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS books (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                isbn TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                author TEXT NOT NULL DEFAULT '',
                cover_url TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                genre TEXT NOT NULL DEFAULT 'other',
                publisher TEXT NOT NULL DEFAULT '',
                published_date TEXT NOT NULL DEFAULT ''
            );

            -- Reading rooms opened for a book
            CREATE TABLE IF NOT EXISTS rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
                name TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_rooms_book ON rooms(book_id);

            -- A user's favorite books; inactive rows are kept when unfavorited
            CREATE TABLE IF NOT EXISTS favorites (
                user_id INTEGER NOT NULL,
                book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
                active INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (user_id, book_id)
            );
            "#,
        )
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_book(row: &rusqlite::Row) -> rusqlite::Result<StoredBook> {
        let genre: String = row.get(6)?;
        Ok(StoredBook {
            id: row.get(0)?,
            isbn: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            cover_url: row.get(4)?,
            description: row.get(5)?,
            genre: genre.parse().unwrap_or_default(),
            publisher: row.get(7)?,
            published_date: row.get(8)?,
        })
    }

    /// Insert or update a book by ISBN and return its id.
    pub fn upsert_book(&self, book: &BookDetail) -> Result<i64, RepositoryError> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO books (isbn, title, author, cover_url, description, genre, publisher, published_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(isbn) DO UPDATE SET
                title = excluded.title,
                author = excluded.author,
                cover_url = excluded.cover_url,
                description = excluded.description,
                genre = excluded.genre,
                publisher = excluded.publisher,
                published_date = excluded.published_date",
            params![
                book.isbn,
                book.title,
                book.author,
                book.cover_url,
                book.description,
                book.genre.as_str(),
                book.publisher,
                book.published_date,
            ],
        )
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        conn.query_row(
            "SELECT id FROM books WHERE isbn = ?",
            params![book.isbn],
            |row| row.get(0),
        )
        .map_err(|e| RepositoryError::Database(e.to_string()))
    }

    /// Open a reading room for a book and return the room id.
    pub fn add_room(&self, book_id: i64, name: &str) -> Result<i64, RepositoryError> {
        let conn = self.conn()?;
        Self::ensure_book(&conn, book_id)?;

        conn.execute(
            "INSERT INTO rooms (book_id, name) VALUES (?1, ?2)",
            params![book_id, name],
        )
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    /// Mark or unmark a book as a user's favorite.
    pub fn set_favorite(
        &self,
        user_id: i64,
        book_id: i64,
        active: bool,
    ) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        Self::ensure_book(&conn, book_id)?;

        conn.execute(
            "INSERT INTO favorites (user_id, book_id, active) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, book_id) DO UPDATE SET active = excluded.active",
            params![user_id, book_id, active],
        )
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(())
    }

    fn ensure_book(conn: &Connection, book_id: i64) -> Result<(), RepositoryError> {
        let exists = conn
            .query_row(
                "SELECT 1 FROM books WHERE id = ?",
                params![book_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| RepositoryError::Database(e.to_string()))?
            .is_some();

        if exists {
            Ok(())
        } else {
            Err(RepositoryError::NotFound(format!("book {}", book_id)))
        }
    }
}

impl BookRepository for SqliteBookRepository {
    fn find_book_by_isbn(&self, isbn: &str) -> Result<Option<StoredBook>, RepositoryError> {
        let conn = self.conn()?;

        conn.query_row(
            &format!("SELECT {} FROM books b WHERE b.isbn = ?", BOOK_COLUMNS),
            params![isbn],
            Self::row_to_book,
        )
        .optional()
        .map_err(|e| RepositoryError::Database(e.to_string()))
    }

    fn exists_active_favorite(&self, user_id: i64, book_id: i64) -> Result<bool, RepositoryError> {
        let conn = self.conn()?;

        let found = conn
            .query_row(
                "SELECT 1 FROM favorites WHERE user_id = ?1 AND book_id = ?2 AND active = 1",
                params![user_id, book_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(found.is_some())
    }

    fn find_book_with_most_rooms(&self) -> Result<Option<PopularBookRecord>, RepositoryError> {
        let conn = self.conn()?;

        // Ties go to the earliest stored book.
        conn.query_row(
            &format!(
                "SELECT {}, COUNT(r.id) AS room_count
                 FROM books b LEFT JOIN rooms r ON r.book_id = b.id
                 GROUP BY b.id
                 ORDER BY room_count DESC, b.id ASC
                 LIMIT 1",
                BOOK_COLUMNS
            ),
            [],
            |row| {
                let room_count: i64 = row.get(9)?;
                Ok(PopularBookRecord {
                    book: Self::row_to_book(row)?,
                    room_count: room_count.max(0) as u64,
                })
            },
        )
        .optional()
        .map_err(|e| RepositoryError::Database(e.to_string()))
    }
}

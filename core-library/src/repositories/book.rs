//! Book repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Book;
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

/// Book repository interface for catalogue access
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Find a book by its ID
    ///
    /// # Returns
    /// - `Ok(Some(book))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: &str) -> Result<Option<Book>>;

    /// Insert a new book
    async fn insert(&self, book: &Book) -> Result<()>;

    /// Case-insensitive substring search over title and author
    async fn search(&self, query: &str, page_request: PageRequest) -> Result<Page<Book>>;

    /// Books in a genre, newest first
    async fn query_by_genre(&self, genre: &str, page_request: PageRequest) -> Result<Page<Book>>;
}

/// SQLite implementation of BookRepository
pub struct SqliteBookRepository {
    pool: SqlitePool,
}

impl SqliteBookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside LIKE.
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl BookRepository for SqliteBookRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Book>> {
        let book = query_as::<_, Book>("SELECT * FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(book)
    }

    async fn insert(&self, book: &Book) -> Result<()> {
        book.validate()
            .map_err(|msg| LibraryError::invalid("book", msg))?;

        sqlx::query(
            r#"
            INSERT INTO books (
                id, title, author, cover_url, genre, description,
                audio_path, duration, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.cover_url)
        .bind(&book.genre)
        .bind(&book.description)
        .bind(&book.audio_path)
        .bind(book.duration)
        .bind(book.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn search(&self, query: &str, page_request: PageRequest) -> Result<Page<Book>> {
        let pattern = like_pattern(query);

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM books \
             WHERE title LIKE ?1 ESCAPE '\\' OR author LIKE ?1 ESCAPE '\\'",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let books = query_as::<_, Book>(
            "SELECT * FROM books \
             WHERE title LIKE ?1 ESCAPE '\\' OR author LIKE ?1 ESCAPE '\\' \
             ORDER BY title COLLATE NOCASE LIMIT ?2 OFFSET ?3",
        )
        .bind(&pattern)
        .bind(page_request.limit() as i64)
        .bind(page_request.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(books, total.0 as u64, page_request))
    }

    async fn query_by_genre(&self, genre: &str, page_request: PageRequest) -> Result<Page<Book>> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books WHERE genre = ?")
            .bind(genre)
            .fetch_one(&self.pool)
            .await?;

        let books = query_as::<_, Book>(
            "SELECT * FROM books WHERE genre = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(genre)
        .bind(page_request.limit() as i64)
        .bind(page_request.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(books, total.0 as u64, page_request))
    }
}

//! Personal library: liked and saved books

use crate::error::Result;
use crate::models::{Book, MarkKind};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query_as, SqlitePool};

/// Per-user likes and saves.
#[async_trait]
pub trait LibraryRepository: Send + Sync {
    /// Whether the user has this book in the given list
    async fn contains(&self, kind: MarkKind, user_id: &str, book_id: &str) -> Result<bool>;

    /// Add the book to the list. Adding twice is not an error.
    async fn add(&self, kind: MarkKind, user_id: &str, book_id: &str) -> Result<()>;

    /// Remove the book from the list. Returns `true` if it was present.
    async fn remove(&self, kind: MarkKind, user_id: &str, book_id: &str) -> Result<bool>;

    /// Books in the list, most recently added first
    async fn books(&self, kind: MarkKind, user_id: &str) -> Result<Vec<Book>>;

    /// Flip membership and return the new state.
    async fn toggle(&self, kind: MarkKind, user_id: &str, book_id: &str) -> Result<bool> {
        if self.contains(kind, user_id, book_id).await? {
            self.remove(kind, user_id, book_id).await?;
            Ok(false)
        } else {
            self.add(kind, user_id, book_id).await?;
            Ok(true)
        }
    }

    async fn is_liked(&self, user_id: &str, book_id: &str) -> Result<bool> {
        self.contains(MarkKind::Like, user_id, book_id).await
    }

    async fn is_saved(&self, user_id: &str, book_id: &str) -> Result<bool> {
        self.contains(MarkKind::Save, user_id, book_id).await
    }

    async fn toggle_like(&self, user_id: &str, book_id: &str) -> Result<bool> {
        self.toggle(MarkKind::Like, user_id, book_id).await
    }

    async fn toggle_save(&self, user_id: &str, book_id: &str) -> Result<bool> {
        self.toggle(MarkKind::Save, user_id, book_id).await
    }

    async fn saved_books(&self, user_id: &str) -> Result<Vec<Book>> {
        self.books(MarkKind::Save, user_id).await
    }
}

/// SQLite implementation of LibraryRepository
pub struct SqliteLibraryRepository {
    pool: SqlitePool,
}

impl SqliteLibraryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LibraryRepository for SqliteLibraryRepository {
    async fn contains(&self, kind: MarkKind, user_id: &str, book_id: &str) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE user_id = ? AND book_id = ?",
            kind.table()
        );
        let count: (i64,) = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0 > 0)
    }

    async fn add(&self, kind: MarkKind, user_id: &str, book_id: &str) -> Result<()> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} (user_id, book_id, created_at) VALUES (?, ?, ?)",
            kind.table()
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(book_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn remove(&self, kind: MarkKind, user_id: &str, book_id: &str) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = ? AND book_id = ?",
            kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(book_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn books(&self, kind: MarkKind, user_id: &str) -> Result<Vec<Book>> {
        let sql = format!(
            "SELECT b.* FROM books b JOIN {} m ON m.book_id = b.id \
             WHERE m.user_id = ? ORDER BY m.created_at DESC",
            kind.table()
        );
        let books = query_as::<_, Book>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(books)
    }
}

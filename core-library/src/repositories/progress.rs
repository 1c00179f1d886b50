//! Listening progress repository trait and SQLite implementation

use crate::error::{LibraryError, Result};
use crate::models::ListeningProgress;
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};
use tracing::instrument;

/// Durable storage for one checkpoint per (user, book).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Look up the checkpoint for a (user, book) pair.
    ///
    /// # Returns
    /// - `Ok(Some(progress))` if a row exists
    /// - `Ok(None)` if the pair has never been checkpointed
    /// - `Err` on storage failure
    async fn find(&self, user_id: &str, book_id: &str) -> Result<Option<ListeningProgress>>;

    /// Insert a new checkpoint. Fails if the pair already has one.
    async fn insert(&self, progress: &ListeningProgress) -> Result<()>;

    /// Update the existing checkpoint for the pair.
    ///
    /// # Errors
    /// Returns `NotFound` if no row exists for the pair.
    async fn update(&self, progress: &ListeningProgress) -> Result<()>;

    /// Insert or update.
    ///
    /// The default is check-then-act; callers that can race on the same pair
    /// must serialize writes themselves. Stores with a native upsert override
    /// this with an atomic statement.
    async fn upsert(&self, progress: &ListeningProgress) -> Result<()> {
        match self.find(&progress.user_id, &progress.book_id).await? {
            Some(_) => self.update(progress).await,
            None => self.insert(progress).await,
        }
    }

    /// Most recently updated checkpoints for a user ("continue listening").
    async fn recent_for_user(&self, user_id: &str, limit: u32)
        -> Result<Vec<ListeningProgress>>;

    /// Remove the checkpoint for a pair. Returns `true` if a row was removed.
    async fn delete(&self, user_id: &str, book_id: &str) -> Result<bool>;
}

fn validate(progress: &ListeningProgress) -> Result<()> {
    progress
        .validate()
        .map_err(|msg| LibraryError::invalid("listening_progress", msg))
}

/// SQLite implementation of ProgressRepository
pub struct SqliteProgressRepository {
    pool: SqlitePool,
}

impl SqliteProgressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressRepository for SqliteProgressRepository {
    #[instrument(skip(self), level = "debug")]
    async fn find(&self, user_id: &str, book_id: &str) -> Result<Option<ListeningProgress>> {
        let progress = query_as::<_, ListeningProgress>(
            "SELECT user_id, book_id, current_position, duration, updated_at \
             FROM listening_progress WHERE user_id = ? AND book_id = ?",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(progress)
    }

    async fn insert(&self, progress: &ListeningProgress) -> Result<()> {
        validate(progress)?;

        sqlx::query(
            r#"
            INSERT INTO listening_progress (user_id, book_id, current_position, duration, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&progress.user_id)
        .bind(&progress.book_id)
        .bind(progress.current_position)
        .bind(progress.duration)
        .bind(progress.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, progress: &ListeningProgress) -> Result<()> {
        validate(progress)?;

        let result = sqlx::query(
            r#"
            UPDATE listening_progress
            SET current_position = ?, duration = ?, updated_at = ?
            WHERE user_id = ? AND book_id = ?
            "#,
        )
        .bind(progress.current_position)
        .bind(progress.duration)
        .bind(progress.updated_at)
        .bind(&progress.user_id)
        .bind(&progress.book_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "ListeningProgress".to_string(),
                id: format!("{}/{}", progress.user_id, progress.book_id),
            });
        }

        Ok(())
    }

    #[instrument(
        skip(self, progress),
        fields(
            user_id = %progress.user_id,
            book_id = %progress.book_id,
            position = progress.current_position
        ),
        level = "debug"
    )]
    async fn upsert(&self, progress: &ListeningProgress) -> Result<()> {
        validate(progress)?;

        sqlx::query(
            r#"
            INSERT INTO listening_progress (user_id, book_id, current_position, duration, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (user_id, book_id) DO UPDATE SET
                current_position = excluded.current_position,
                duration = excluded.duration,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&progress.user_id)
        .bind(&progress.book_id)
        .bind(progress.current_position)
        .bind(progress.duration)
        .bind(progress.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ListeningProgress>> {
        let rows = query_as::<_, ListeningProgress>(
            "SELECT user_id, book_id, current_position, duration, updated_at \
             FROM listening_progress WHERE user_id = ? \
             ORDER BY updated_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn delete(&self, user_id: &str, book_id: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM listening_progress WHERE user_id = ? AND book_id = ?")
                .bind(user_id)
                .bind(book_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

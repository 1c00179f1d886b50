//! Domain models for the audiobook catalogue and per-user listening state
//!
//! Records mirror the hosted backend's tables (`books`, `listening_progress`,
//! `book_likes`, `book_saves`) and map onto the local SQLite schema through
//! `sqlx::FromRow`. Optional columns are `Option` so absent values never
//! masquerade as zero or empty strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// Book
// =============================================================================

/// A catalogue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    /// Public cover image URL
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Object key in the audio bucket, or an absolute URL
    #[serde(default)]
    pub audio_path: Option<String>,
    /// Total length in seconds, when known
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Book {
    /// Create a book with a fresh identifier.
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            author: author.into(),
            cover_url: None,
            genre: None,
            description: None,
            audio_path: None,
            duration: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_audio_path(mut self, path: impl Into<String>) -> Self {
        self.audio_path = Some(path.into());
        self
    }

    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Validate book data
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Book id cannot be empty".to_string());
        }

        if self.title.trim().is_empty() {
            return Err("Book title cannot be empty".to_string());
        }

        if self.author.trim().is_empty() {
            return Err("Book author cannot be empty".to_string());
        }

        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(format!("Book duration {} must be positive", duration));
            }
        }

        Ok(())
    }

    /// `true` when the record points at some audio (possibly unreachable).
    pub fn has_audio(&self) -> bool {
        self.audio_path
            .as_deref()
            .is_some_and(|path| !path.trim().is_empty())
    }
}

// =============================================================================
// Listening progress
// =============================================================================

/// Durable playback checkpoint, one row per (user, book).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ListeningProgress {
    pub user_id: String,
    pub book_id: String,
    /// Seconds from the start of the book
    pub current_position: f64,
    #[serde(default)]
    pub duration: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl ListeningProgress {
    pub fn new(
        user_id: impl Into<String>,
        book_id: impl Into<String>,
        current_position: f64,
        duration: Option<f64>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            book_id: book_id.into(),
            current_position,
            duration,
            updated_at,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() || self.book_id.trim().is_empty() {
            return Err("Progress requires both user_id and book_id".to_string());
        }

        if !self.current_position.is_finite() || self.current_position < 0.0 {
            return Err(format!(
                "Position {} must be a non-negative number of seconds",
                self.current_position
            ));
        }

        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(format!("Duration {} must be non-negative", duration));
            }
        }

        Ok(())
    }

    /// Fraction of the book listened to, if the duration is known.
    pub fn fraction_complete(&self) -> Option<f64> {
        self.duration
            .filter(|d| *d > 0.0)
            .map(|d| (self.current_position / d).clamp(0.0, 1.0))
    }

    /// A position of zero after a completed listen reads as "not started".
    pub fn has_started(&self) -> bool {
        self.current_position > 0.0
    }
}

/// Column set written by progress inserts and updates.
///
/// Serialized as the request body for the hosted backend; the composite key
/// travels in the query string for updates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressWrite<'a> {
    pub user_id: &'a str,
    pub book_id: &'a str,
    pub current_position: f64,
    pub duration: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl<'a> From<&'a ListeningProgress> for ProgressWrite<'a> {
    fn from(progress: &'a ListeningProgress) -> Self {
        Self {
            user_id: &progress.user_id,
            book_id: &progress.book_id,
            current_position: progress.current_position,
            duration: progress.duration,
            updated_at: progress.updated_at,
        }
    }
}

// =============================================================================
// Personal library
// =============================================================================

/// Membership row for `book_likes` and `book_saves`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct BookMark {
    pub user_id: String,
    pub book_id: String,
    pub created_at: DateTime<Utc>,
}

/// Which personal list a [`BookMark`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkKind {
    Like,
    Save,
}

impl MarkKind {
    pub fn table(&self) -> &'static str {
        match self {
            MarkKind::Like => "book_likes",
            MarkKind::Save => "book_saves",
        }
    }
}

//! The book a session is playing.

use core_library::Book;
use serde::{Deserialize, Serialize};

/// Just enough of a [`Book`] to drive playback and the mini-player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBook {
    pub id: String,
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    /// Storage key or absolute URL. Empty when the book has no audio.
    pub audio_path: String,
}

impl ActiveBook {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
        audio_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: author.into(),
            cover_url: None,
            audio_path: audio_path.into(),
        }
    }

    pub fn with_cover_url(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }
}

impl From<&Book> for ActiveBook {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            cover_url: book.cover_url.clone(),
            audio_path: book.audio_path.clone().unwrap_or_default(),
        }
    }
}

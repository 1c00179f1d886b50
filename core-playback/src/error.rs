//! # Playback Error Types
//!
//! Errors raised by the playback core. Session operations convert most of
//! these into state flags and notifications; they surface as `Err` only from
//! construction and from [`GlobalPlaybackSession::start`](crate::GlobalPlaybackSession::start).

use bridge_traits::{BridgeError, PlayError};
use core_library::LibraryError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Book was not found in the catalogue.
    #[error("Book not found: {0}")]
    BookNotFound(String),

    /// No playable URL could be derived for the audio path.
    #[error("Audio source unavailable: {0}")]
    SourceUnavailable(String),

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// The host refused to start playback.
    #[error(transparent)]
    PlayRejected(#[from] PlayError),

    /// A transport control was used before an output was attached.
    #[error("Player not ready")]
    PlayerNotReady,

    /// Operation requires an active book.
    #[error("No book loaded")]
    NoBookLoaded,

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// Progress or catalogue storage failed.
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// Host capability failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::SourceUnavailable(_) | PlaybackError::PlayerNotReady => true,
            PlaybackError::PlayRejected(PlayError::NotAllowed(_)) => true,
            PlaybackError::Bridge(err) => err.is_transport(),
            _ => false,
        }
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        match self {
            PlaybackError::SourceUnavailable(_) => true,
            PlaybackError::Bridge(err) => err.is_transport(),
            PlaybackError::Library(LibraryError::Bridge(err)) => err.is_transport(),
            _ => false,
        }
    }

    /// Returns `true` if the audio format cannot be played on this host.
    pub fn is_format_error(&self) -> bool {
        matches!(self, PlaybackError::PlayRejected(PlayError::NotSupported(_)))
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

//! Authentication Session Abstraction
//!
//! Sign-in, token refresh and profile management are owned by the host. The
//! core only asks "who is listening right now?".

use crate::platform::PlatformSendSync;

/// Authenticated user as seen by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    /// Stable user identifier (primary key of the `profiles` table).
    pub user_id: String,
    /// Access token forwarded to the hosted backend, when available.
    pub access_token: Option<String>,
}

impl UserSession {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// Current-user accessor.
///
/// `None` means anonymous: the core neither restores nor persists listening
/// progress for anonymous listeners.
pub trait SessionProvider: PlatformSendSync {
    fn current_user(&self) -> Option<UserSession>;
}

//! In-process session holder for desktop hosts.

use bridge_traits::auth::{SessionProvider, UserSession};
use std::sync::RwLock;
use tracing::info;

/// Session provider whose user is set by the host's sign-in flow.
#[derive(Debug, Default)]
pub struct StaticSessionProvider {
    session: RwLock<Option<UserSession>>,
}

impl StaticSessionProvider {
    /// Anonymous until [`sign_in`](Self::sign_in) is called.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(session: UserSession) -> Self {
        Self {
            session: RwLock::new(Some(session)),
        }
    }

    pub fn sign_in(&self, session: UserSession) {
        info!(user_id = %session.user_id, "User signed in");
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
    }

    pub fn sign_out(&self) {
        info!("User signed out");
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl SessionProvider for StaticSessionProvider {
    fn current_user(&self) -> Option<UserSession> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_and_out() {
        let provider = StaticSessionProvider::anonymous();
        assert!(provider.current_user().is_none());

        provider.sign_in(UserSession::new("user-1").with_access_token("jwt"));
        let user = provider.current_user().unwrap();
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.access_token.as_deref(), Some("jwt"));

        provider.sign_out();
        assert!(provider.current_user().is_none());
    }
}

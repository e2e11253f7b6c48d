//! Client-side session state.
//!
//! Wraps an `IdentityProvider` and tracks who is signed in. Starts in
//! `Resolving` until `resolve` is called with a persisted token (or none),
//! then moves between `SignedIn` and `SignedOut`. Observers subscribe to a
//! watch channel and see every transition.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::{AuthSession, IdentityError, IdentityProvider, ProfileUpdate, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Initial state before the persisted session has been checked.
    Resolving,
    SignedIn(User),
    SignedOut,
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

pub struct SessionTracker {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<SessionState>,
    token: Mutex<Option<String>>,
}

impl SessionTracker {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::Resolving);
        Self {
            provider,
            state,
            token: Mutex::new(None),
        }
    }

    /// True until the first `resolve` completes.
    pub fn loading(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Resolving)
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.lock() {
            *slot = token;
        }
    }

    fn signed_out(&self) {
        self.set_token(None);
        self.state.send_replace(SessionState::SignedOut);
    }

    fn signed_in(&self, session: &AuthSession) {
        self.set_token(Some(session.token.clone()));
        self.state
            .send_replace(SessionState::SignedIn(session.user.clone()));
    }

    /// Restore a persisted session. An unknown or expired token signs out.
    pub async fn resolve(&self, token: Option<String>) -> Result<Option<User>, IdentityError> {
        let Some(token) = token else {
            self.signed_out();
            return Ok(None);
        };
        match self.provider.lookup(&token).await {
            Ok(Some(user)) => {
                self.signed_in(&AuthSession {
                    token,
                    user: user.clone(),
                });
                Ok(Some(user))
            }
            Ok(None) => {
                self.signed_out();
                Ok(None)
            }
            Err(e) => {
                self.signed_out();
                Err(e)
            }
        }
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, IdentityError> {
        match self.provider.sign_up(email, password, display_name).await {
            Ok(session) => {
                self.signed_in(&session);
                Ok(session.user)
            }
            Err(e) => {
                self.signed_out();
                Err(e)
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User, IdentityError> {
        match self.provider.sign_in(email, password).await {
            Ok(session) => {
                self.signed_in(&session);
                Ok(session.user)
            }
            Err(e) => {
                self.signed_out();
                Err(e)
            }
        }
    }

    /// Local state is cleared even when the provider call fails.
    pub async fn sign_out(&self) -> Result<(), IdentityError> {
        let token = self.token();
        self.signed_out();
        match token {
            Some(token) => self.provider.sign_out(&token).await,
            None => Ok(()),
        }
    }

    pub async fn reset_password(&self, email: &str) -> Result<(), IdentityError> {
        self.provider.send_password_reset(email).await
    }

    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User, IdentityError> {
        let token = self.token().ok_or(IdentityError::NotSignedIn)?;
        let user = self.provider.update_profile(&token, update).await?;
        self.state
            .send_replace(SessionState::SignedIn(user.clone()));
        Ok(user)
    }
}

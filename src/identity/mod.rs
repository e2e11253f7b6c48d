//! Identity adapter: sign-up, sign-in, sign-out, password reset and
//! profile updates against an identity provider.
//!
//! Providers are injected as `Arc<dyn IdentityProvider>`; nothing here is
//! ambient. `SessionTracker` holds client-side session state for callers
//! that need a current user plus a loading flag.

pub mod firebase;
pub mod local;
pub mod session;

pub use firebase::FirebaseIdentity;
pub use local::LocalIdentity;
pub use session::{SessionState, SessionTracker};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// A signed-in user plus the bearer token for subsequent calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account already exists for this email")]
    EmailExists,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Session token invalid or expired")]
    InvalidToken,

    #[error("No user is signed in")]
    NotSignedIn,

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthSession, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError>;

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError>;

    async fn update_profile(
        &self,
        token: &str,
        update: ProfileUpdate,
    ) -> Result<User, IdentityError>;

    /// Resolve a bearer token to its user. `None` for unknown or expired tokens.
    async fn lookup(&self, token: &str) -> Result<Option<User>, IdentityError>;

    /// Provider name for logs and the health endpoint.
    fn name(&self) -> &str;
}

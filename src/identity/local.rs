//! In-process identity provider.
//!
//! Used when no external provider is configured. Accounts live in memory
//! and are gone on restart. Passwords are PBKDF2-SHA256 with a per-account
//! salt; session tokens are random and only their SHA-256 hash is kept.
//! Sessions expire after `SESSION_TTL`, like a Firebase ID token.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;
use zeroize::Zeroize;

use super::{AuthSession, IdentityError, IdentityProvider, ProfileUpdate, User};

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 32;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Derived password hash, zeroed on drop.
#[derive(Zeroize)]
#[zeroize(drop)]
struct PasswordHash {
    bytes: [u8; HASH_LENGTH],
}

impl PasswordHash {
    fn derive(password: &str, salt: &[u8; SALT_LENGTH], iterations: u32) -> Self {
        let mut bytes = [0u8; HASH_LENGTH];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut bytes);
        Self { bytes }
    }

    fn matches(&self, other: &PasswordHash) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

struct Account {
    user: User,
    salt: [u8; SALT_LENGTH],
    hash: PasswordHash,
}

struct Session {
    email_key: String,
    expires: Instant,
}

impl Session {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires
    }
}

#[derive(Default)]
struct LocalState {
    /// Keyed by normalized email.
    accounts: HashMap<String, Account>,
    /// Keyed by token hash.
    sessions: HashMap<[u8; 32], Session>,
}

impl LocalState {
    /// Email key of a live session. An expired session is removed.
    fn session_key(&mut self, token: &str) -> Option<String> {
        let hash = hash_token(token);
        let now = Instant::now();
        let found = self
            .sessions
            .get(&hash)
            .map(|session| session.is_live(now).then(|| session.email_key.clone()));
        match found {
            Some(Some(key)) => Some(key),
            Some(None) => {
                self.sessions.remove(&hash);
                None
            }
            None => None,
        }
    }
}

pub struct LocalIdentity {
    state: Mutex<LocalState>,
    iterations: u32,
    session_ttl: Duration,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self::with_iterations(PBKDF2_ITERATIONS)
    }

    /// Lower iteration counts are for tests only.
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            state: Mutex::new(LocalState::default()),
            iterations,
            session_ttl: SESSION_TTL,
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, LocalState>, IdentityError> {
        self.state
            .lock()
            .map_err(|_| IdentityError::Provider("identity state lock poisoned".into()))
    }

    async fn derive(&self, password: &str, salt: [u8; SALT_LENGTH]) -> Result<PasswordHash, IdentityError> {
        let password = password.to_string();
        let iterations = self.iterations;
        tokio::task::spawn_blocking(move || {
            let mut password = password;
            let hash = PasswordHash::derive(&password, &salt, iterations);
            password.zeroize();
            hash
        })
        .await
        .map_err(|e| IdentityError::Provider(e.to_string()))
    }

    /// Issue a token, pruning expired sessions first.
    fn open_session(&self, state: &mut LocalState, email_key: &str, user: User) -> AuthSession {
        let now = Instant::now();
        state.sessions.retain(|_, session| session.is_live(now));

        let token = generate_token();
        state.sessions.insert(
            hash_token(&token),
            Session {
                email_key: email_key.to_string(),
                expires: now + self.session_ttl,
            },
        );
        AuthSession { token, user }
    }
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_email(email: &str) -> Result<String, IdentityError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(IdentityError::InvalidEmail),
    }
}

/// Hash a bearer token string using SHA-256.
pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn generate_salt() -> [u8; SALT_LENGTH] {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthSession, IdentityError> {
        let key = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(IdentityError::WeakPassword(format!(
                "Password should be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        if self.lock()?.accounts.contains_key(&key) {
            return Err(IdentityError::EmailExists);
        }

        let salt = generate_salt();
        let hash = self.derive(password, salt).await?;
        let user = User {
            uid: Uuid::new_v4().to_string(),
            email: key.clone(),
            display_name: display_name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            photo_url: None,
        };

        let mut state = self.lock()?;
        // Re-check: another sign-up may have won while hashing.
        if state.accounts.contains_key(&key) {
            return Err(IdentityError::EmailExists);
        }
        state.accounts.insert(
            key.clone(),
            Account {
                user: user.clone(),
                salt,
                hash,
            },
        );
        tracing::info!(uid = %user.uid, "Local account created");
        Ok(self.open_session(&mut state, &key, user))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let key = normalize_email(email).map_err(|_| IdentityError::InvalidCredentials)?;
        let salt = {
            let state = self.lock()?;
            match state.accounts.get(&key) {
                Some(account) => account.salt,
                None => return Err(IdentityError::InvalidCredentials),
            }
        };

        let candidate = self.derive(password, salt).await?;
        let mut state = self.lock()?;
        let user = match state.accounts.get(&key) {
            Some(account) if account.hash.matches(&candidate) => account.user.clone(),
            _ => return Err(IdentityError::InvalidCredentials),
        };
        Ok(self.open_session(&mut state, &key, user))
    }

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        self.lock()?.sessions.remove(&hash_token(token));
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        let key = normalize_email(email)?;
        let known = self.lock()?.accounts.contains_key(&key);
        // No mail transport for local accounts; the request is only logged.
        tracing::info!(known, "Password reset requested for local account");
        Ok(())
    }

    async fn update_profile(
        &self,
        token: &str,
        update: ProfileUpdate,
    ) -> Result<User, IdentityError> {
        let mut state = self.lock()?;
        let key = state.session_key(token).ok_or(IdentityError::InvalidToken)?;
        let account = state
            .accounts
            .get_mut(&key)
            .ok_or(IdentityError::InvalidToken)?;

        if let Some(name) = update.display_name {
            account.user.display_name = Some(name);
        }
        if let Some(url) = update.photo_url {
            account.user.photo_url = Some(url);
        }
        Ok(account.user.clone())
    }

    async fn lookup(&self, token: &str) -> Result<Option<User>, IdentityError> {
        let mut state = self.lock()?;
        let Some(key) = state.session_key(token) else {
            return Ok(None);
        };
        Ok(state.accounts.get(&key).map(|account| account.user.clone()))
    }

    fn name(&self) -> &str {
        "local"
    }
}

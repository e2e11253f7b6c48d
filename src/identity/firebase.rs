//! Firebase Authentication over the Identity Toolkit REST API.
//!
//! Email/password only. Firebase ID tokens are stateless on the server, so
//! sign-out is a local no-op: the caller discards its token.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{AuthSession, IdentityError, IdentityProvider, ProfileUpdate, User};

pub const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct FirebaseIdentity {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

/// Account fields shared by the signUp, signInWithPassword, update and
/// lookup responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

impl AccountInfo {
    fn into_user(self) -> User {
        User {
            uid: self.local_id,
            email: self.email.unwrap_or_default(),
            display_name: self.display_name.filter(|n| !n.is_empty()),
            photo_url: self.photo_url.filter(|u| !u.is_empty()),
        }
    }

    fn into_session(mut self) -> Result<AuthSession, IdentityError> {
        let token = self
            .id_token
            .take()
            .ok_or_else(|| IdentityError::Provider("response carried no idToken".into()))?;
        Ok(AuthSession {
            token,
            user: self.into_user(),
        })
    }
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<&'a str>,
    return_secure_token: bool,
}

/// Map an Identity Toolkit error code (`error.message`) to an `IdentityError`.
fn map_error_code(message: &str) -> IdentityError {
    // Codes may carry a detail suffix, e.g. "WEAK_PASSWORD : Password should be ...".
    let (code, detail) = match message.split_once(':') {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (message.trim(), ""),
    };
    match code {
        "EMAIL_EXISTS" => IdentityError::EmailExists,
        "INVALID_EMAIL" | "MISSING_EMAIL" => IdentityError::InvalidEmail,
        "WEAK_PASSWORD" => IdentityError::WeakPassword(detail.to_string()),
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS"
        | "USER_DISABLED" | "MISSING_PASSWORD" => IdentityError::InvalidCredentials,
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => {
            IdentityError::InvalidToken
        }
        _ => IdentityError::Provider(message.to_string()),
    }
}

impl FirebaseIdentity {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_IDENTITY_TOOLKIT_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// POST to `accounts:{method}` and decode the success body.
    async fn call<T: DeserializeOwned>(&self, method: &str, body: &impl Serialize) -> Result<T, IdentityError> {
        let url = format!("{}/accounts:{method}", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| IdentityError::HttpClient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN_ERROR");
            tracing::debug!(method, status = status.as_u16(), message, "Identity Toolkit error");
            return Err(map_error_code(message));
        }

        response
            .json()
            .await
            .map_err(|e| IdentityError::Provider(format!("malformed {method} response: {e}")))
    }

    async fn update_account(
        &self,
        token: &str,
        display_name: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<AccountInfo, IdentityError> {
        self.call(
            "update",
            &UpdateRequest {
                id_token: token,
                display_name,
                photo_url,
                return_secure_token: false,
            },
        )
        .await
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthSession, IdentityError> {
        let account: AccountInfo = self
            .call(
                "signUp",
                &json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let mut session = account.into_session()?;

        if let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) {
            let updated = self.update_account(&session.token, Some(name), None).await?;
            session.user.display_name = updated.display_name.or_else(|| Some(name.to_string()));
        }
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let account: AccountInfo = self
            .call(
                "signInWithPassword",
                &json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        account.into_session()
    }

    async fn sign_out(&self, _token: &str) -> Result<(), IdentityError> {
        tracing::debug!("Firebase sign-out is client-side; token discarded");
        Ok(())
    }

    /// Unknown addresses succeed like known ones.
    async fn send_password_reset(&self, email: &str) -> Result<(), IdentityError> {
        match self
            .call::<Value>(
                "sendOobCode",
                &json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(IdentityError::InvalidCredentials) => {
                tracing::debug!("Password reset for unknown or disabled account ignored");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn update_profile(
        &self,
        token: &str,
        update: ProfileUpdate,
    ) -> Result<User, IdentityError> {
        let account = self
            .update_account(
                token,
                update.display_name.as_deref(),
                update.photo_url.as_deref(),
            )
            .await?;
        Ok(account.into_user())
    }

    async fn lookup(&self, token: &str) -> Result<Option<User>, IdentityError> {
        match self
            .call::<LookupResponse>("lookup", &json!({ "idToken": token }))
            .await
        {
            Ok(resp) => Ok(resp.users.into_iter().next().map(AccountInfo::into_user)),
            Err(IdentityError::InvalidToken) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "firebase"
    }
}

//! Shared types for the HTTP API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::analysis::AnalysisOrchestrator;
use crate::config::AppConfig;
use crate::db::ReportStore;
use crate::api::error::ApiError;
use crate::identity::{IdentityProvider, User};

/// Shared context for all API routes and middleware.
///
/// Every adapter is injected here; handlers never reach for globals.
#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn ReportStore>,
    pub identity: Arc<dyn IdentityProvider>,
    /// `None` when no completion backend is configured.
    pub analysis: Option<Arc<AnalysisOrchestrator>>,
    pub public_base_url: String,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(
        store: Arc<dyn ReportStore>,
        identity: Arc<dyn IdentityProvider>,
        analysis: Option<Arc<AnalysisOrchestrator>>,
        public_base_url: &str,
    ) -> Self {
        Self {
            store,
            identity,
            analysis,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Arc::new(Mutex::new(limiter));
        self
    }

    pub fn share_link(&self, report_id: &str) -> String {
        AppConfig::share_link(&self.public_base_url, report_id)
    }
}

/// Authenticated caller, injected into request extensions by the auth
/// middleware after the bearer token resolved to a user.
///
/// As an extractor it rejects with 401 when no user was resolved;
/// `Option<CurrentUser>` accepts anonymous callers.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl CurrentUser {
    pub fn uid(&self) -> &str {
        &self.user.uid
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}

/// Sliding-window request limiter keyed by caller.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(100, 1000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
        }
    }

    /// Record a request for `key`. Returns `Err(retry_after_secs)` when
    /// either window is full; rejected requests are not counted.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let entries = self.windows.entry(key.to_string()).or_default();

        entries.retain(|ts| now.duration_since(*ts) < Duration::from_secs(3600));

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }
        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the bearer token from an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn rate_limiter_blocks_after_minute_quota() {
        let mut limiter = RateLimiter::with_limits(3, 100);
        for _ in 0..3 {
            assert!(limiter.check("ip:10.0.0.1").is_ok());
        }
        assert_eq!(limiter.check("ip:10.0.0.1"), Err(60));
        // Other callers keep their own window.
        assert!(limiter.check("ip:10.0.0.2").is_ok());
    }

    #[test]
    fn rate_limiter_hour_quota() {
        let mut limiter = RateLimiter::with_limits(100, 2);
        assert!(limiter.check("anonymous").is_ok());
        assert!(limiter.check("anonymous").is_ok());
        assert_eq!(limiter.check("anonymous"), Err(3600));
    }
}

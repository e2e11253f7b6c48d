use std::net::SocketAddr;
use std::path::PathBuf;

use crate::analysis::sonar::{DEFAULT_SONAR_BASE_URL, DEFAULT_SONAR_MODEL};

/// Application-level constants
pub const APP_NAME: &str = "MedLab Analyzer";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DATABASE_FILE: &str = "medlab.db";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medlab=info,medlab_lib=info,tower_http=warn"
}

/// Get the application data directory
/// ~/MedLab/ on all platforms. Falls back to the working directory when no
/// home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("MedLab")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: Option<String>,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SonarConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Runtime configuration read from named environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub public_base_url: String,
    /// `None` selects the in-process identity provider.
    pub firebase: Option<FirebaseConfig>,
    /// `None` disables the analysis routes.
    pub sonar: Option<SonarConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

const WATCHED_KEYS: [&str; 9] = [
    "MEDLAB_BIND_ADDR",
    "MEDLAB_DB_PATH",
    "MEDLAB_PUBLIC_BASE_URL",
    "FIREBASE_API_KEY",
    "FIREBASE_AUTH_DOMAIN",
    "FIREBASE_PROJECT_ID",
    "SONAR_API_KEY",
    "SONAR_BASE_URL",
    "SONAR_MODEL",
];

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = get("MEDLAB_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw.parse().map_err(|e| ConfigError::Invalid {
            key: "MEDLAB_BIND_ADDR",
            reason: format!("{bind_raw}: {e}"),
        })?;

        let db_path = get("MEDLAB_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| app_data_dir().join(DATABASE_FILE));

        let public_base_url = get("MEDLAB_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://{bind_addr}"))
            .trim_end_matches('/')
            .to_string();

        let firebase = get("FIREBASE_API_KEY").map(|api_key| FirebaseConfig {
            api_key,
            auth_domain: get("FIREBASE_AUTH_DOMAIN"),
            project_id: get("FIREBASE_PROJECT_ID"),
        });

        let sonar = get("SONAR_API_KEY").map(|api_key| SonarConfig {
            api_key,
            base_url: get("SONAR_BASE_URL").unwrap_or_else(|| DEFAULT_SONAR_BASE_URL.to_string()),
            model: get("SONAR_MODEL").unwrap_or_else(|| DEFAULT_SONAR_MODEL.to_string()),
        });

        for key in WATCHED_KEYS {
            let mark = if get(key).is_some() { "✓" } else { "✗" };
            tracing::info!("{key}: {mark}");
        }

        Ok(Self {
            bind_addr,
            db_path,
            public_base_url,
            firebase,
            sonar,
        })
    }

    /// Public link for a shared report.
    pub fn share_link(base_url: &str, report_id: &str) -> String {
        format!("{}/report/{report_id}", base_url.trim_end_matches('/'))
    }
}

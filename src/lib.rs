pub mod analysis; // AI explanation fan-out + Sonar client
pub mod api; // HTTP API router, middleware, server
pub mod config;
pub mod db; // SQLite report store
pub mod identity; // Firebase / local identity adapters
pub mod models;
pub mod range; // Reference range classifier

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::analysis::{AnalysisOrchestrator, SonarClient};
use crate::api::ApiContext;
use crate::config::AppConfig;
use crate::db::{ReportStore, SqliteReportStore};
use crate::identity::{FirebaseIdentity, IdentityProvider, LocalIdentity};

/// Wire the adapters named by `config` into an `ApiContext`.
pub fn build_context(config: &AppConfig) -> Result<ApiContext, db::DatabaseError> {
    let store: Arc<dyn ReportStore> = Arc::new(SqliteReportStore::open(&config.db_path)?);
    tracing::info!(path = %config.db_path.display(), "Report store opened");

    let identity: Arc<dyn IdentityProvider> = match &config.firebase {
        Some(firebase) => {
            tracing::info!(
                project = firebase.project_id.as_deref().unwrap_or("unset"),
                "Using Firebase identity provider"
            );
            Arc::new(FirebaseIdentity::new(&firebase.api_key))
        }
        None => {
            tracing::warn!("FIREBASE_API_KEY not set; accounts are in-memory and lost on restart");
            Arc::new(LocalIdentity::new())
        }
    };

    let analysis = match &config.sonar {
        Some(sonar) => {
            tracing::info!(model = %sonar.model, "AI analysis enabled");
            Some(Arc::new(AnalysisOrchestrator::new(Arc::new(SonarClient::new(
                &sonar.api_key,
                &sonar.base_url,
                &sonar.model,
            )))))
        }
        None => {
            tracing::warn!("SONAR_API_KEY not set; analysis routes will answer 503");
            None
        }
    };

    Ok(ApiContext::new(
        store,
        identity,
        analysis,
        &config.public_base_url,
    ))
}

/// Start the server and run until Ctrl-C.
pub async fn run() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env().map_err(|e| e.to_string())?;
    let ctx = build_context(&config).map_err(|e| e.to_string())?;

    let mut server = api::start_api_server(ctx, config.bind_addr).await?;
    tracing::info!(
        addr = %server.info.server_addr,
        public = %config.public_base_url,
        "Listening"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    server.shutdown();
    server.stopped().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn context_falls_back_to_local_identity_without_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("medlab.db");
        let vars: HashMap<&str, String> =
            HashMap::from([("MEDLAB_DB_PATH", db_path.display().to_string())]);
        let config = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        let ctx = build_context(&config).unwrap();
        assert_eq!(ctx.identity.name(), "local");
        assert!(ctx.analysis.is_none());
        assert!(db_path.exists());
    }

    #[test]
    fn context_uses_configured_adapters() {
        let tmp = tempfile::tempdir().unwrap();
        let vars: HashMap<&str, String> = HashMap::from([
            ("MEDLAB_DB_PATH", tmp.path().join("medlab.db").display().to_string()),
            ("FIREBASE_API_KEY", "AIza-test".to_string()),
            ("SONAR_API_KEY", "pplx-test".to_string()),
            ("MEDLAB_PUBLIC_BASE_URL", "https://medlab.example".to_string()),
        ]);
        let config = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        let ctx = build_context(&config).unwrap();
        assert_eq!(ctx.identity.name(), "firebase");
        assert_eq!(ctx.analysis.as_ref().unwrap().client_name(), "sonar");
        assert_eq!(ctx.share_link("r1"), "https://medlab.example/report/r1");
    }
}

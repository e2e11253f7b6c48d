pub mod report_store;
pub mod sqlite;

pub use report_store::*;
pub use sqlite::*;

use thiserror::Error;

use crate::models::{AnalysisDraft, NewReport, Report, ReportAnalysis, ReportPatch};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid stored document in {column}: {reason}")]
    InvalidDocument { column: String, reason: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl DatabaseError {
    pub(crate) fn report_not_found(id: &str) -> Self {
        Self::NotFound {
            entity_type: "report".into(),
            id: id.into(),
        }
    }
}

/// CRUD over report documents.
///
/// Reads never enforce visibility except `get_public`, which is the only
/// gate for anonymous access. Updates carry no concurrency token: the last
/// write wins.
pub trait ReportStore: Send + Sync {
    /// Insert a report owned by `user_id`; assigns id and upload date.
    fn create(&self, user_id: &str, report: NewReport) -> Result<String, DatabaseError>;

    fn get(&self, id: &str) -> Result<Option<Report>, DatabaseError>;

    /// Like `get`, but `None` unless the report is public.
    fn get_public(&self, id: &str) -> Result<Option<Report>, DatabaseError> {
        Ok(self.get(id)?.filter(|r| r.is_public))
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<Report>, DatabaseError>;

    fn update(&self, id: &str, patch: ReportPatch) -> Result<(), DatabaseError>;

    /// Attach an analysis, stamping `created_at` at write time.
    fn set_analysis(&self, id: &str, draft: AnalysisDraft)
        -> Result<ReportAnalysis, DatabaseError>;

    fn delete(&self, id: &str) -> Result<(), DatabaseError>;
}

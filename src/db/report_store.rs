//! SQLite-backed report document store.
//!
//! One row per report. Embedded `content` and `analysis` are JSON documents,
//! so the schema never follows the shape of lab data. Row order (`seq`) is
//! the store-default listing order.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{open_database, open_memory_database, DatabaseError, ReportStore};
use crate::models::{AnalysisDraft, NewReport, Report, ReportAnalysis, ReportContent, ReportPatch};

pub struct SqliteReportStore {
    conn: Mutex<Connection>,
}

impl SqliteReportStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(open_memory_database()?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

const REPORT_COLUMNS: &str = "id, user_id, title, upload_date, content, is_public, analysis";

/// Raw row tuple, decoded outside the rusqlite closure so JSON errors map
/// to `DatabaseError::InvalidDocument`.
struct ReportRow {
    id: String,
    user_id: String,
    title: String,
    upload_date: DateTime<Utc>,
    content: String,
    is_public: bool,
    analysis: Option<String>,
}

fn report_row(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        upload_date: row.get(3)?,
        content: row.get(4)?,
        is_public: row.get(5)?,
        analysis: row.get(6)?,
    })
}

fn report_from_row(row: ReportRow) -> Result<Report, DatabaseError> {
    let content: ReportContent =
        serde_json::from_str(&row.content).map_err(|e| DatabaseError::InvalidDocument {
            column: "content".into(),
            reason: e.to_string(),
        })?;
    let analysis = row
        .analysis
        .as_deref()
        .map(serde_json::from_str::<ReportAnalysis>)
        .transpose()
        .map_err(|e| DatabaseError::InvalidDocument {
            column: "analysis".into(),
            reason: e.to_string(),
        })?;

    Ok(Report {
        id: row.id,
        user_id: row.user_id,
        title: row.title,
        upload_date: row.upload_date,
        content,
        is_public: row.is_public,
        analysis,
    })
}

fn to_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::InvalidDocument {
        column: column.into(),
        reason: e.to_string(),
    })
}

fn load(conn: &Connection, id: &str) -> Result<Option<Report>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = ?1"),
            params![id],
            report_row,
        )
        .optional()?;
    row.map(report_from_row).transpose()
}

impl ReportStore for SqliteReportStore {
    fn create(&self, user_id: &str, report: NewReport) -> Result<String, DatabaseError> {
        if user_id.trim().is_empty() {
            return Err(DatabaseError::ConstraintViolation(
                "report requires a user id".into(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let content = to_json("content", &report.content)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO reports (id, user_id, title, upload_date, content, is_public)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, user_id, report.title, Utc::now(), content, report.is_public],
        )
        .inspect_err(|e| tracing::error!(error = %e, "Error adding report"))?;

        tracing::debug!(report_id = %id, user_id, "Report created");
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<Report>, DatabaseError> {
        let conn = self.lock()?;
        load(&conn, id).inspect_err(|e| tracing::error!(error = %e, report_id = id, "Error getting report"))
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<Report>, DatabaseError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE user_id = ?1 ORDER BY seq"
        ))?;
        let rows = stmt.query_map(params![user_id], report_row)?;

        let mut reports = Vec::new();
        for row in rows {
            reports.push(report_from_row(row?)?);
        }
        Ok(reports)
    }

    fn update(&self, id: &str, patch: ReportPatch) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        let mut report = load(&conn, id)?.ok_or_else(|| DatabaseError::report_not_found(id))?;
        if patch.is_empty() {
            return Ok(());
        }
        patch.apply(&mut report);

        let content = to_json("content", &report.content)?;
        let analysis = report
            .analysis
            .as_ref()
            .map(|a| to_json("analysis", a))
            .transpose()?;
        conn.execute(
            "UPDATE reports SET title = ?2, content = ?3, is_public = ?4, analysis = ?5
             WHERE id = ?1",
            params![id, report.title, content, report.is_public, analysis],
        )
        .inspect_err(|e| tracing::error!(error = %e, report_id = id, "Error updating report"))?;
        Ok(())
    }

    fn set_analysis(
        &self,
        id: &str,
        draft: AnalysisDraft,
    ) -> Result<ReportAnalysis, DatabaseError> {
        let analysis = draft.stamp(Utc::now());
        let json = to_json("analysis", &analysis)?;
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE reports SET analysis = ?2 WHERE id = ?1",
                params![id, json],
            )
            .inspect_err(|e| {
                tracing::error!(error = %e, report_id = id, "Error adding report analysis")
            })?;
        if changed == 0 {
            return Err(DatabaseError::report_not_found(id));
        }
        Ok(analysis)
    }

    fn delete(&self, id: &str) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM reports WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DatabaseError::report_not_found(id));
        }
        tracing::debug!(report_id = id, "Report deleted");
        Ok(())
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored lab report. Owned by `user_id`, readable anonymously only while `is_public`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub upload_date: DateTime<Utc>,
    pub content: ReportContent,
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ReportAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportContent {
    pub test_results: Vec<TestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_info: Option<PatientInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_info: Option<LabInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub name: String,
    pub value: TestValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
}

impl TestResult {
    pub fn new(name: &str, value: impl Into<TestValue>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            unit: None,
            reference_range: None,
            flagged: None,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn with_range(mut self, range: &str) -> Self {
        self.reference_range = Some(range.to_string());
        self
    }

    /// A result is worth keeping when both its name and value are non-blank.
    pub fn is_filled_in(&self) -> bool {
        !self.name.trim().is_empty() && !self.value.is_blank()
    }
}

/// Lab values arrive either as JSON numbers or as free text ("16.2", "positive").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestValue {
    Number(f64),
    Text(String),
}

impl TestValue {
    /// Numeric reading of the value. Text must parse completely once trimmed;
    /// non-finite numbers are rejected.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for TestValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for TestValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for TestValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requesting_doctor: Option<String>,
}

/// AI explanation attached to a report. Re-analysis overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportAnalysis {
    pub summary: String,
    pub abnormal_results: Vec<TestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// Analysis as produced by the orchestrator, before the store stamps `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisDraft {
    pub summary: String,
    pub abnormal_results: Vec<TestResult>,
    pub recommendations: Option<Vec<String>>,
}

impl AnalysisDraft {
    pub fn stamp(self, created_at: DateTime<Utc>) -> ReportAnalysis {
        ReportAnalysis {
            summary: self.summary,
            abnormal_results: self.abnormal_results,
            recommendations: self.recommendations,
            created_at,
        }
    }
}

/// Client-supplied fields of a new report. `id`, `upload_date` and the owner
/// are assigned on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub title: String,
    pub content: ReportContent,
    #[serde(default)]
    pub is_public: bool,
}

/// Partial update. The owner is deliberately not patchable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportPatch {
    pub title: Option<String>,
    pub content: Option<ReportContent>,
    pub is_public: Option<bool>,
    pub analysis: Option<ReportAnalysis>,
}

impl ReportPatch {
    pub fn visibility(is_public: bool) -> Self {
        Self {
            is_public: Some(is_public),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.is_public.is_none()
            && self.analysis.is_none()
    }

    /// Merge into `report`, last write wins field by field.
    pub fn apply(self, report: &mut Report) {
        if let Some(title) = self.title {
            report.title = title;
        }
        if let Some(content) = self.content {
            report.content = content;
        }
        if let Some(is_public) = self.is_public {
            report.is_public = is_public;
        }
        if let Some(analysis) = self.analysis {
            report.analysis = Some(analysis);
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{AssignmentType, QueryParams};

/// Lifecycle status of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Success => "SUCCESS",
            RunStatus::Partial => "PARTIAL",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn from_str_id(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(RunStatus::Running),
            "SUCCESS" => Some(RunStatus::Success),
            "PARTIAL" => Some(RunStatus::Partial),
            "FAILED" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

/// The audit row for one run. Created RUNNING before any network work
/// and finalized exactly once; `run()` hands it back in every outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionAudit {
    pub run_id: String,
    pub city: String,
    pub district: String,
    pub start_date_roc: String,
    pub end_date_roc: String,
    pub assignment_type: AssignmentType,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    /// Records successfully parsed and upserted.
    pub records_count: u32,
    /// Rows that failed parsing and were skipped.
    pub parse_failures: u32,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl ExecutionAudit {
    pub fn begin(params: &QueryParams) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            city: params.city.clone(),
            district: params.district.clone(),
            start_date_roc: params.start_date_roc.clone(),
            end_date_roc: params.end_date_roc.clone(),
            assignment_type: params.assignment_type,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: None,
            records_count: 0,
            parse_failures: 0,
            error_type: None,
            error_message: None,
        }
    }

    pub fn finalize(
        &mut self,
        status: RunStatus,
        error_type: Option<String>,
        error_message: Option<String>,
    ) {
        let finished = Utc::now();
        self.status = status;
        self.finished_at = Some(finished);
        self.duration_secs =
            Some((finished - self.started_at).num_milliseconds().max(0) as f64 / 1000.0);
        self.error_type = error_type;
        self.error_message = error_message;
    }

    pub fn is_finalized(&self) -> bool {
        self.status != RunStatus::Running && self.finished_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> QueryParams {
        QueryParams {
            city: "桃園市".to_string(),
            district: "中壢區".to_string(),
            start_date_roc: "114-01-01".to_string(),
            end_date_roc: "114-01-31".to_string(),
            assignment_type: AssignmentType::Initial,
        }
    }

    #[test]
    fn test_begin_is_running() {
        let audit = ExecutionAudit::begin(&params());
        assert_eq!(audit.status, RunStatus::Running);
        assert!(!audit.is_finalized());
        assert!(audit.finished_at.is_none());
        assert!(!audit.run_id.is_empty());
    }

    #[test]
    fn test_finalize_sets_duration_and_error() {
        let mut audit = ExecutionAudit::begin(&params());
        audit.finalize(
            RunStatus::Failed,
            Some("NETWORK_ERROR".to_string()),
            Some("timed out".to_string()),
        );
        assert!(audit.is_finalized());
        assert_eq!(audit.status, RunStatus::Failed);
        assert!(audit.duration_secs.unwrap() >= 0.0);
        assert_eq!(audit.error_type.as_deref(), Some("NETWORK_ERROR"));
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = ExecutionAudit::begin(&params());
        let b = ExecutionAudit::begin(&params());
        assert_ne!(a.run_id, b.run_id);
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            RunStatus::Running,
            RunStatus::Success,
            RunStatus::Partial,
            RunStatus::Failed,
        ] {
            assert_eq!(RunStatus::from_str_id(s.as_str()), Some(s));
        }
    }
}

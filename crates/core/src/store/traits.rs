use thiserror::Error;

use crate::orchestrator::ExecutionAudit;
use crate::record::StructuredAddressRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached at all. A run must not start in this
    /// state; there would be nowhere to put its records.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Taxonomy string recorded in audit rows.
    pub fn error_type(&self) -> &'static str {
        "STORE_UNAVAILABLE"
    }
}

/// Whether an upsert created a new row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Persistence of structured address records.
///
/// The natural key is (city, district, full_address, assignment_date);
/// re-ingesting the same logical record must never duplicate it.
pub trait RecordStore: Send + Sync {
    /// Cheap connectivity check, run before a run starts.
    fn ping(&self) -> Result<(), StoreError>;

    /// Insert or refresh one record by its natural key.
    fn upsert(&self, record: &StructuredAddressRecord) -> Result<UpsertOutcome, StoreError>;

    /// Total stored records, mostly for tests and operator queries.
    fn count_records(&self) -> Result<i64, StoreError>;
}

/// Persistence of per-run audit rows.
pub trait ExecutionStore: Send + Sync {
    /// Write the initial RUNNING row for a run.
    fn insert_execution(&self, audit: &ExecutionAudit) -> Result<(), StoreError>;

    /// Overwrite the run's row with its current audit state.
    fn update_execution(&self, audit: &ExecutionAudit) -> Result<(), StoreError>;

    fn get_execution(&self, run_id: &str) -> Result<Option<ExecutionAudit>, StoreError>;

    /// Most recent runs first.
    fn list_executions(&self, limit: i64) -> Result<Vec<ExecutionAudit>, StoreError>;
}

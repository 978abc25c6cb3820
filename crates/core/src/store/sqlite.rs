use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::orchestrator::{ExecutionAudit, RunStatus};
use crate::record::{AssignmentType, StructuredAddressRecord};

use super::{ExecutionStore, RecordStore, StoreError, UpsertOutcome};

/// SQLite-backed store for address records and run audit rows.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS address_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        city TEXT NOT NULL,
        district TEXT NOT NULL,
        full_address TEXT NOT NULL,
        village TEXT,
        neighborhood TEXT,
        road TEXT,
        section TEXT,
        lane TEXT,
        alley TEXT,
        number TEXT,
        floor TEXT,
        floor_dash TEXT,
        assignment_type TEXT NOT NULL,
        assignment_date TEXT NOT NULL,
        assignment_date_roc TEXT NOT NULL,
        raw_data TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(city, district, full_address, assignment_date)
    );

    CREATE INDEX IF NOT EXISTS idx_address_records_district
        ON address_records(city, district);
    CREATE INDEX IF NOT EXISTS idx_address_records_date
        ON address_records(assignment_date);

    CREATE TABLE IF NOT EXISTS ingest_executions (
        run_id TEXT PRIMARY KEY,
        city TEXT NOT NULL,
        district TEXT NOT NULL,
        start_date_roc TEXT NOT NULL,
        end_date_roc TEXT NOT NULL,
        assignment_type TEXT NOT NULL,
        status TEXT NOT NULL,
        started_at TEXT NOT NULL,
        finished_at TEXT,
        duration_secs REAL,
        records_count INTEGER NOT NULL DEFAULT 0,
        parse_failures INTEGER NOT NULL DEFAULT 0,
        error_type TEXT,
        error_message TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_ingest_executions_started_at
        ON ingest_executions(started_at);
"#;

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn map_execution_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawExecutionRow> {
        Ok(RawExecutionRow {
            run_id: row.get(0)?,
            city: row.get(1)?,
            district: row.get(2)?,
            start_date_roc: row.get(3)?,
            end_date_roc: row.get(4)?,
            assignment_type: row.get(5)?,
            status: row.get(6)?,
            started_at: row.get(7)?,
            finished_at: row.get(8)?,
            duration_secs: row.get(9)?,
            records_count: row.get(10)?,
            parse_failures: row.get(11)?,
            error_type: row.get(12)?,
            error_message: row.get(13)?,
        })
    }
}

/// Intermediate row shape before the string columns are decoded.
struct RawExecutionRow {
    run_id: String,
    city: String,
    district: String,
    start_date_roc: String,
    end_date_roc: String,
    assignment_type: String,
    status: String,
    started_at: String,
    finished_at: Option<String>,
    duration_secs: Option<f64>,
    records_count: u32,
    parse_failures: u32,
    error_type: Option<String>,
    error_message: Option<String>,
}

impl RawExecutionRow {
    fn decode(self) -> Result<ExecutionAudit, StoreError> {
        let assignment_type = AssignmentType::from_str_id(&self.assignment_type)
            .ok_or_else(|| {
                StoreError::Database(format!("unknown assignment type: {}", self.assignment_type))
            })?;
        let status = RunStatus::from_str_id(&self.status)
            .ok_or_else(|| StoreError::Database(format!("unknown status: {}", self.status)))?;
        let started_at = parse_timestamp(&self.started_at)?;
        let finished_at = self
            .finished_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        Ok(ExecutionAudit {
            run_id: self.run_id,
            city: self.city,
            district: self.district,
            start_date_roc: self.start_date_roc,
            end_date_roc: self.end_date_roc,
            assignment_type,
            status,
            started_at,
            finished_at,
            duration_secs: self.duration_secs,
            records_count: self.records_count,
            parse_failures: self.parse_failures,
            error_type: self.error_type,
            error_message: self.error_message,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("invalid timestamp: {e}")))
}

impl RecordStore for SqliteStore {
    fn ping(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    fn upsert(&self, record: &StructuredAddressRecord) -> Result<UpsertOutcome, StoreError> {
        let conn = self.conn.lock().unwrap();

        let raw_json = serde_json::to_string(&record.raw_data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let assignment_date = record.assignment_date.to_string();
        let now = Utc::now().to_rfc3339();

        // ON CONFLICT DO UPDATE reports one changed row either way, so
        // the outcome is decided by a lookup under the same lock.
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM address_records
                 WHERE city = ? AND district = ? AND full_address = ? AND assignment_date = ?
                 LIMIT 1",
                params![
                    record.city,
                    record.district,
                    record.full_address,
                    assignment_date
                ],
                |_| Ok(true),
            )
            .map(|_| true)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(false),
                other => Err(StoreError::Database(other.to_string())),
            })?;

        conn.execute(
            r#"INSERT INTO address_records (
                city, district, full_address,
                village, neighborhood, road, section, lane, alley, number, floor, floor_dash,
                assignment_type, assignment_date, assignment_date_roc,
                raw_data, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(city, district, full_address, assignment_date) DO UPDATE SET
                village = excluded.village,
                neighborhood = excluded.neighborhood,
                road = excluded.road,
                section = excluded.section,
                lane = excluded.lane,
                alley = excluded.alley,
                number = excluded.number,
                floor = excluded.floor,
                floor_dash = excluded.floor_dash,
                assignment_type = excluded.assignment_type,
                assignment_date_roc = excluded.assignment_date_roc,
                raw_data = excluded.raw_data,
                updated_at = excluded.updated_at"#,
            params![
                record.city,
                record.district,
                record.full_address,
                record.parts.village,
                record.parts.neighborhood,
                record.parts.road,
                record.parts.section,
                record.parts.lane,
                record.parts.alley,
                record.parts.number,
                record.parts.floor,
                record.parts.floor_dash,
                record.assignment_type.as_str(),
                assignment_date,
                record.assignment_date_roc,
                raw_json,
                now,
                now,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(if exists {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn count_records(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM address_records", [], |row| row.get(0))
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

impl ExecutionStore for SqliteStore {
    fn insert_execution(&self, audit: &ExecutionAudit) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"INSERT INTO ingest_executions (
                run_id, city, district, start_date_roc, end_date_roc, assignment_type,
                status, started_at, finished_at, duration_secs,
                records_count, parse_failures, error_type, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                audit.run_id,
                audit.city,
                audit.district,
                audit.start_date_roc,
                audit.end_date_roc,
                audit.assignment_type.as_str(),
                audit.status.as_str(),
                audit.started_at.to_rfc3339(),
                audit.finished_at.map(|t| t.to_rfc3339()),
                audit.duration_secs,
                audit.records_count,
                audit.parse_failures,
                audit.error_type,
                audit.error_message,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn update_execution(&self, audit: &ExecutionAudit) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"UPDATE ingest_executions SET
                status = ?, finished_at = ?, duration_secs = ?,
                records_count = ?, parse_failures = ?, error_type = ?, error_message = ?
               WHERE run_id = ?"#,
            params![
                audit.status.as_str(),
                audit.finished_at.map(|t| t.to_rfc3339()),
                audit.duration_secs,
                audit.records_count,
                audit.parse_failures,
                audit.error_type,
                audit.error_message,
                audit.run_id,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    fn get_execution(&self, run_id: &str) -> Result<Option<ExecutionAudit>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                r#"SELECT run_id, city, district, start_date_roc, end_date_roc, assignment_type,
                          status, started_at, finished_at, duration_secs,
                          records_count, parse_failures, error_type, error_message
                   FROM ingest_executions WHERE run_id = ?"#,
                params![run_id],
                Self::map_execution_row,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StoreError::Database(other.to_string())),
            })?;

        row.map(RawExecutionRow::decode).transpose()
    }

    fn list_executions(&self, limit: i64) -> Result<Vec<ExecutionAudit>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"SELECT run_id, city, district, start_date_roc, end_date_roc, assignment_type,
                          status, started_at, finished_at, duration_secs,
                          records_count, parse_failures, error_type, error_message
                   FROM ingest_executions ORDER BY started_at DESC LIMIT ?"#,
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit], Self::map_execution_row)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut audits = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| StoreError::Database(e.to_string()))?;
            audits.push(raw.decode()?);
        }
        Ok(audits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AddressParts, QueryParams};
    use chrono::NaiveDate;
    use serde_json::json;

    fn store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    fn sample_record(full_address: &str) -> StructuredAddressRecord {
        StructuredAddressRecord {
            city: "桃園市".to_string(),
            district: "中壢區".to_string(),
            full_address: full_address.to_string(),
            parts: AddressParts {
                road: Some("中正路".to_string()),
                number: Some("5".to_string()),
                ..Default::default()
            },
            assignment_type: AssignmentType::Initial,
            assignment_date: NaiveDate::from_ymd_opt(2025, 11, 7).unwrap(),
            assignment_date_roc: "114-11-07".to_string(),
            raw_data: json!({"full_address": full_address}),
        }
    }

    fn sample_audit() -> ExecutionAudit {
        ExecutionAudit::begin(&QueryParams {
            city: "桃園市".to_string(),
            district: "中壢區".to_string(),
            start_date_roc: "114-01-01".to_string(),
            end_date_roc: "114-01-31".to_string(),
            assignment_type: AssignmentType::Initial,
        })
    }

    #[test]
    fn test_ping() {
        assert!(store().ping().is_ok());
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let store = store();
        let record = sample_record("中正路5號");

        let outcome = store.upsert(&record).unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);
        assert_eq!(store.count_records().unwrap(), 1);

        let mut changed = record.clone();
        changed.parts.floor = Some("3".to_string());
        let outcome = store.upsert(&changed).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(store.count_records().unwrap(), 1);
    }

    #[test]
    fn test_upsert_different_key_inserts() {
        let store = store();
        store.upsert(&sample_record("中正路5號")).unwrap();
        store.upsert(&sample_record("中正路7號")).unwrap();
        assert_eq!(store.count_records().unwrap(), 2);
    }

    #[test]
    fn test_upsert_same_address_different_date_inserts() {
        let store = store();
        let record = sample_record("中正路5號");
        store.upsert(&record).unwrap();

        let mut later = record.clone();
        later.assignment_date = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        later.assignment_date_roc = "114-12-01".to_string();
        assert_eq!(store.upsert(&later).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(store.count_records().unwrap(), 2);
    }

    #[test]
    fn test_execution_insert_update_get() {
        let store = store();
        let mut audit = sample_audit();
        store.insert_execution(&audit).unwrap();

        let loaded = store.get_execution(&audit.run_id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Running);
        assert_eq!(loaded.city, "桃園市");

        audit.records_count = 42;
        audit.finalize(RunStatus::Success, None, None);
        store.update_execution(&audit).unwrap();

        let loaded = store.get_execution(&audit.run_id).unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Success);
        assert_eq!(loaded.records_count, 42);
        assert!(loaded.finished_at.is_some());
        assert!(loaded.duration_secs.is_some());
    }

    #[test]
    fn test_get_execution_missing() {
        assert!(store().get_execution("nope").unwrap().is_none());
    }

    #[test]
    fn test_list_executions_most_recent_first() {
        let store = store();
        let mut first = sample_audit();
        first.started_at = Utc::now() - chrono::Duration::hours(1);
        store.insert_execution(&first).unwrap();

        let second = sample_audit();
        store.insert_execution(&second).unwrap();

        let listed = store.list_executions(10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].run_id, second.run_id);

        let limited = store.list_executions(1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_file_based_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doorplate.db");

        let store = SqliteStore::new(&path).unwrap();
        store.upsert(&sample_record("中正路5號")).unwrap();
        assert!(path.exists());

        // Reopen and verify the row survived.
        drop(store);
        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.count_records().unwrap(), 1);
    }
}

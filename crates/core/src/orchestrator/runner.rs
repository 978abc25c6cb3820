//! The ingestion run lifecycle.
//!
//! `run()` drives one district's query end to end: store gate, source
//! session, per-page extraction, per-row parsing and upsert, audit
//! finalization, notifications. It never returns an error; every
//! outcome, including a failed store ping, comes back as a finalized
//! [`ExecutionAudit`] so schedulers and the CLI see one result shape.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::captcha::CaptchaOracle;
use crate::extractor::{extract_page, ExtractError};
use crate::metrics;
use crate::notifier::{Notifier, NotifyEvent};
use crate::parser::{
    clean_text, parse_address, parse_minguo_date, to_minguo_string, ParseFailure,
    ParseFailureReason,
};
use crate::record::{AssignmentType, QueryParams, RawAddressTuple, StructuredAddressRecord};
use crate::session::{RegistryClient, SessionConfig, SourceSession};
use crate::store::{ExecutionStore, RecordStore, UpsertOutcome};

use super::{ExecutionAudit, RunStatus};

/// Why the page loop stopped before the session was done.
struct StopCause {
    error_type: String,
    error_message: String,
}

pub struct IngestOrchestrator {
    records: Arc<dyn RecordStore>,
    executions: Arc<dyn ExecutionStore>,
    client: Arc<dyn RegistryClient>,
    oracle: Arc<dyn CaptchaOracle>,
    notifier: Arc<dyn Notifier>,
    session_config: SessionConfig,
    cancel: Arc<AtomicBool>,
}

impl IngestOrchestrator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        executions: Arc<dyn ExecutionStore>,
        client: Arc<dyn RegistryClient>,
        oracle: Arc<dyn CaptchaOracle>,
        notifier: Arc<dyn Notifier>,
        session_config: SessionConfig,
    ) -> Self {
        Self {
            records,
            executions,
            client,
            oracle,
            notifier,
            session_config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag checked between page fetches; set it to stop the run
    /// cooperatively.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Execute one ingestion run. Always returns a finalized audit.
    pub async fn run(&self, params: QueryParams) -> ExecutionAudit {
        metrics::RUNS_STARTED.inc();
        let mut audit = ExecutionAudit::begin(&params);
        info!(
            run_id = %audit.run_id,
            city = %params.city,
            district = %params.district,
            start = %params.start_date_roc,
            end = %params.end_date_roc,
            "Starting ingestion run"
        );

        // Store gate: nowhere to put records means the run never starts.
        if let Err(e) = self.records.ping() {
            warn!(run_id = %audit.run_id, error = %e, "Store unavailable, aborting run");
            audit.finalize(
                RunStatus::Failed,
                Some(e.error_type().to_string()),
                Some(e.to_string()),
            );
            // Best effort: the same store backs the audit rows.
            if let Err(e) = self.executions.insert_execution(&audit) {
                warn!(run_id = %audit.run_id, error = %e, "Could not write audit row");
            }
            self.finish(&audit, None).await;
            return audit;
        }

        if let Err(e) = self.executions.insert_execution(&audit) {
            warn!(run_id = %audit.run_id, error = %e, "Could not create audit row, aborting run");
            audit.finalize(
                RunStatus::Failed,
                Some(e.error_type().to_string()),
                Some(e.to_string()),
            );
            self.finish(&audit, None).await;
            return audit;
        }

        let mut session = SourceSession::new(
            Arc::clone(&self.client),
            Arc::clone(&self.oracle),
            params.clone(),
            self.session_config.clone(),
        );

        let stop_cause = self.page_loop(&params, &mut session, &mut audit).await;

        let status = match &stop_cause {
            Some(_) if audit.records_count > 0 => RunStatus::Partial,
            Some(_) => RunStatus::Failed,
            None if audit.parse_failures > 0 => RunStatus::Partial,
            None => RunStatus::Success,
        };
        let (error_type, error_message) = match &stop_cause {
            Some(cause) => (
                Some(cause.error_type.clone()),
                Some(cause.error_message.clone()),
            ),
            None => (None, None),
        };
        audit.finalize(status, error_type, error_message);

        if let Err(e) = self.executions.update_execution(&audit) {
            warn!(run_id = %audit.run_id, error = %e, "Could not finalize audit row");
        }

        let empty_result = stop_cause.is_none() && session.rows_seen() == 0;
        self.emit_events(&audit, &session, empty_result).await;
        self.finish(&audit, Some(&session)).await;
        audit
    }

    /// Fetch, extract, parse, and upsert until the session is done or
    /// something stops the run. Returns the stop cause, if any.
    async fn page_loop(
        &self,
        params: &QueryParams,
        session: &mut SourceSession,
        audit: &mut ExecutionAudit,
    ) -> Option<StopCause> {
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                info!(run_id = %audit.run_id, "Run cancelled between page fetches");
                return Some(StopCause {
                    error_type: "CANCELLED".to_string(),
                    error_message: "run cancelled before completion".to_string(),
                });
            }

            let page = match session.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => return None,
                Err(e) => {
                    return Some(StopCause {
                        error_type: e.error_type().to_string(),
                        error_message: e.to_string(),
                    });
                }
            };

            let (tuples, meta) = match extract_page(&page.body) {
                Ok(extracted) => extracted,
                Err(e @ ExtractError::StructureChanged(_)) => {
                    // Layout drift invalidates every remaining page.
                    warn!(
                        run_id = %audit.run_id,
                        page = page.page_number,
                        error = %e,
                        "Stopping run on structure change"
                    );
                    return Some(StopCause {
                        error_type: "STRUCTURE_CHANGED".to_string(),
                        error_message: e.to_string(),
                    });
                }
            };
            session.record_page_meta(&meta);
            debug!(
                run_id = %audit.run_id,
                page = page.page_number,
                rows = meta.rows_on_page,
                total = meta.total_rows_reported,
                "Processing page"
            );

            for tuple in &tuples {
                match self.process_tuple(params, tuple) {
                    Ok(record) => match self.records.upsert(&record) {
                        Ok(outcome) => {
                            audit.records_count += 1;
                            let label = match outcome {
                                UpsertOutcome::Inserted => "inserted",
                                UpsertOutcome::Updated => "updated",
                            };
                            metrics::RECORDS_UPSERTED.with_label_values(&[label]).inc();
                        }
                        Err(e) => {
                            // The store went away mid-run; nothing more
                            // can be persisted.
                            return Some(StopCause {
                                error_type: e.error_type().to_string(),
                                error_message: e.to_string(),
                            });
                        }
                    },
                    Err(failure) => {
                        audit.parse_failures += 1;
                        metrics::PARSE_FAILURES
                            .with_label_values(&[failure.reason.as_str()])
                            .inc();
                        debug!(
                            run_id = %audit.run_id,
                            reason = failure.reason.as_str(),
                            raw = %failure.raw_input,
                            "Row skipped"
                        );
                    }
                }
            }

            // Progress checkpoint; a failed update is not worth a stop.
            if let Err(e) = self.executions.update_execution(audit) {
                warn!(run_id = %audit.run_id, error = %e, "Audit progress update failed");
            }
        }
    }

    /// Turn one scraped row into a persistable record.
    fn process_tuple(
        &self,
        params: &QueryParams,
        tuple: &RawAddressTuple,
    ) -> Result<StructuredAddressRecord, ParseFailure> {
        let full_address = clean_text(&tuple.full_address);
        if full_address.is_empty() {
            return Err(ParseFailure::new(
                ParseFailureReason::MissingField,
                &tuple.full_address,
            ));
        }

        let parts = parse_address(&full_address)?;

        let assignment_date = parse_minguo_date(&tuple.register_date).ok_or_else(|| {
            ParseFailure::new(ParseFailureReason::DateFormat, &tuple.register_date)
        })?;

        // Rows normally echo the queried kind; trust the row when it
        // carries a recognizable label of its own.
        let assignment_type = AssignmentType::from_label(&clean_text(&tuple.register_type))
            .unwrap_or(params.assignment_type);

        Ok(StructuredAddressRecord {
            city: params.city.clone(),
            district: params.district.clone(),
            full_address,
            parts,
            assignment_type,
            assignment_date,
            assignment_date_roc: to_minguo_string(assignment_date),
            raw_data: serde_json::to_value(tuple).unwrap_or_default(),
        })
    }

    /// Emit the alert-worthy events for a finalized run.
    async fn emit_events(&self, audit: &ExecutionAudit, session: &SourceSession, empty: bool) {
        match audit.status {
            RunStatus::Failed => {
                self.notifier
                    .emit(NotifyEvent::RunFailed {
                        run_id: audit.run_id.clone(),
                        city: audit.city.clone(),
                        district: audit.district.clone(),
                        error_type: audit
                            .error_type
                            .clone()
                            .unwrap_or_else(|| "UNKNOWN".to_string()),
                        error_message: audit.error_message.clone().unwrap_or_default(),
                    })
                    .await;
            }
            RunStatus::Partial => {
                self.notifier
                    .emit(NotifyEvent::RunPartial {
                        run_id: audit.run_id.clone(),
                        city: audit.city.clone(),
                        district: audit.district.clone(),
                        records_count: audit.records_count,
                        parse_failures: audit.parse_failures,
                        error_type: audit.error_type.clone(),
                    })
                    .await;
            }
            RunStatus::Success | RunStatus::Running => {}
        }

        if audit.error_type.as_deref() == Some("CAPTCHA_EXHAUSTED") {
            self.notifier
                .emit(NotifyEvent::CaptchaExhausted {
                    run_id: audit.run_id.clone(),
                    city: audit.city.clone(),
                    district: audit.district.clone(),
                    attempts: session.captcha_attempts(),
                })
                .await;
        }

        if empty {
            self.notifier
                .emit(NotifyEvent::EmptyResult {
                    run_id: audit.run_id.clone(),
                    city: audit.city.clone(),
                    district: audit.district.clone(),
                    start_date_roc: audit.start_date_roc.clone(),
                    end_date_roc: audit.end_date_roc.clone(),
                })
                .await;
        }
    }

    async fn finish(&self, audit: &ExecutionAudit, session: Option<&SourceSession>) {
        metrics::RUNS_FINISHED
            .with_label_values(&[audit.status.as_str()])
            .inc();
        if let Some(duration) = audit.duration_secs {
            metrics::RUN_DURATION
                .with_label_values(&[audit.status.as_str()])
                .observe(duration);
        }

        // The store-gate path has no session and already skipped events.
        if session.is_none() && audit.status == RunStatus::Failed {
            self.notifier
                .emit(NotifyEvent::RunFailed {
                    run_id: audit.run_id.clone(),
                    city: audit.city.clone(),
                    district: audit.district.clone(),
                    error_type: audit
                        .error_type
                        .clone()
                        .unwrap_or_else(|| "UNKNOWN".to_string()),
                    error_message: audit.error_message.clone().unwrap_or_default(),
                })
                .await;
        }

        info!(
            run_id = %audit.run_id,
            status = audit.status.as_str(),
            records = audit.records_count,
            parse_failures = audit.parse_failures,
            duration_secs = audit.duration_secs,
            "Run finished"
        );
    }
}

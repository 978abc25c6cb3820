//! Prometheus metrics for the ingestion pipeline.
//!
//! Counters cover runs, records, parsing, captcha attempts, network
//! retries, and notifications. There is no exposition endpoint here;
//! embedders register [`all_metrics`] wherever they scrape from.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

/// Ingestion runs started.
pub static RUNS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("doorplate_runs_started_total", "Total ingestion runs started").unwrap()
});

/// Ingestion runs finished by final status.
pub static RUNS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "doorplate_runs_finished_total",
            "Total ingestion runs finished",
        ),
        &["status"], // "SUCCESS", "PARTIAL", "FAILED"
    )
    .unwrap()
});

/// Run duration in seconds by final status.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("doorplate_run_duration_seconds", "Duration of ingestion runs")
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["status"],
    )
    .unwrap()
});

/// Records upserted by outcome.
pub static RECORDS_UPSERTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("doorplate_records_upserted_total", "Total records upserted"),
        &["outcome"], // "inserted", "updated"
    )
    .unwrap()
});

/// Rows that failed parsing by failure reason.
pub static PARSE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("doorplate_parse_failures_total", "Total per-row parse failures"),
        &["reason"], // "NO_MARKERS", "DATE_FORMAT", "MISSING_FIELD"
    )
    .unwrap()
});

/// Result pages fetched.
pub static PAGES_FETCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("doorplate_pages_fetched_total", "Total result pages fetched").unwrap()
});

/// Captcha attempts by outcome.
pub static CAPTCHA_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("doorplate_captcha_attempts_total", "Total captcha attempts"),
        &["outcome"], // "accepted", "rejected", "error"
    )
    .unwrap()
});

/// Network retries by operation.
pub static NETWORK_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("doorplate_network_retries_total", "Total network retries"),
        &["operation"],
    )
    .unwrap()
});

/// Notifications by event type and delivery result.
pub static NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("doorplate_notifications_total", "Total notifications emitted"),
        &["event_type", "result"], // result: "delivered", "rejected", "failed"
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RUNS_STARTED.clone()),
        Box::new(RUNS_FINISHED.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(RECORDS_UPSERTED.clone()),
        Box::new(PARSE_FAILURES.clone()),
        Box::new(PAGES_FETCHED.clone()),
        Box::new(CAPTCHA_ATTEMPTS.clone()),
        Box::new(NETWORK_RETRIES.clone()),
        Box::new(NOTIFICATIONS.clone()),
    ]
}

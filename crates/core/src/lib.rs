//! Core library for the door-plate registry ingestion pipeline.
//!
//! The pipeline scrapes door-plate assignment announcements from a
//! government household-registration site, parses the Chinese addresses
//! into structured parts, and persists them idempotently in sqlite. The
//! [`orchestrator::IngestOrchestrator`] ties the pieces together; the
//! seams between them are trait objects so tests can script the remote
//! side.

pub mod captcha;
pub mod config;
pub mod extractor;
pub mod metrics;
pub mod notifier;
pub mod orchestrator;
pub mod parser;
pub mod record;
pub mod session;
pub mod store;
pub mod testing;

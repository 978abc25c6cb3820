//! Command-line entry point: one invocation ingests one city's worth of
//! door-plate assignments, running the configured districts concurrently
//! against independent registry sessions over a shared sqlite store.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use sha2::{Digest, Sha256};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use doorplate_core::captcha::HttpCaptchaOracle;
use doorplate_core::config::{load_config, validate_config, SanitizedConfig};
use doorplate_core::notifier::{LogNotifier, Notifier, WebhookNotifier};
use doorplate_core::orchestrator::{IngestOrchestrator, RunStatus};
use doorplate_core::record::{AssignmentType, QueryParams};
use doorplate_core::session::HttpRegistryClient;
use doorplate_core::store::SqliteStore;

#[derive(Parser, Debug)]
#[command(
    name = "doorplate",
    version,
    about = "Ingest door-plate assignment announcements from the household registry"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "doorplate.toml")]
    config: PathBuf,

    /// City to query (e.g. 桃園市)
    #[arg(long)]
    city: String,

    /// Districts to query, comma separated (e.g. 中壢區,平鎮區)
    #[arg(long, value_delimiter = ',', required = true)]
    districts: Vec<String>,

    /// Start of the date range in the Minguo calendar (e.g. 114-01-01)
    #[arg(long)]
    start_date: String,

    /// End of the date range in the Minguo calendar
    #[arg(long)]
    end_date: String,

    /// Assignment kind: initial, extension, renumbering or revocation
    #[arg(long, default_value = "initial")]
    assignment_type: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Ingestion aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let assignment_type = AssignmentType::from_str_id(&cli.assignment_type)
        .with_context(|| format!("unknown assignment type {:?}", cli.assignment_type))?;
    if cli.districts.is_empty() {
        bail!("at least one district is required");
    }

    let raw_config = std::fs::read(&cli.config)
        .with_context(|| format!("cannot read config file {}", cli.config.display()))?;
    let config = load_config(&cli.config)?;
    validate_config(&config)?;

    let config_hash = format!("{:x}", Sha256::digest(&raw_config));
    info!(
        config = %serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default(),
        config_hash = %&config_hash[..12],
        "Configuration loaded"
    );

    let store = Arc::new(SqliteStore::new(&config.database.path)?);

    let notifier: Arc<dyn Notifier> = match &config.notifier {
        Some(notifier_config) => Arc::new(
            WebhookNotifier::new(notifier_config.clone()).map_err(anyhow::Error::msg)?,
        ),
        None => Arc::new(LogNotifier),
    };

    let mut cancel_flags = Vec::new();
    let mut tasks = Vec::new();
    for district in &cli.districts {
        let params = QueryParams {
            city: cli.city.clone(),
            district: district.clone(),
            start_date_roc: cli.start_date.clone(),
            end_date_roc: cli.end_date.clone(),
            assignment_type,
        };

        // Each district gets its own registry session; the cookie jar
        // holds per-query state on the remote side.
        let client = Arc::new(HttpRegistryClient::new(config.registry.clone())?);
        let oracle = Arc::new(HttpCaptchaOracle::new(config.captcha.clone())?);

        let orchestrator = IngestOrchestrator::new(
            Arc::clone(&store) as _,
            Arc::clone(&store) as _,
            client,
            oracle,
            Arc::clone(&notifier),
            config.session.clone(),
        );
        cancel_flags.push(orchestrator.cancel_flag());
        tasks.push(tokio::spawn(
            async move { orchestrator.run(params).await },
        ));
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling runs after the current page");
            for flag in &cancel_flags {
                flag.store(true, Ordering::SeqCst);
            }
        }
    });

    let mut all_ok = true;
    for task in tasks {
        let audit = task.await.context("ingestion task panicked")?;
        info!(
            run_id = %audit.run_id,
            district = %audit.district,
            status = audit.status.as_str(),
            records = audit.records_count,
            parse_failures = audit.parse_failures,
            "Run summary"
        );
        println!(
            "{}\t{}\t{} records, {} parse failures{}",
            audit.district,
            audit.status.as_str(),
            audit.records_count,
            audit.parse_failures,
            audit
                .error_message
                .as_deref()
                .map(|m| format!(" ({m})"))
                .unwrap_or_default()
        );
        if audit.status == RunStatus::Failed {
            all_ok = false;
        }
    }

    Ok(all_ok)
}

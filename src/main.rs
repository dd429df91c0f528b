// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand};
use fhir_ingest::utils::logging::{
    format_error, format_failure, format_info, format_step, format_success, format_warning,
};
use fhir_ingest::{
    CancellationHandle, CancellationSignal, Config, ConnectionManager, DocumentProcessor,
    FileScanner, FileSettingsProvider, HealthStatus, InMemorySettingsProvider,
    IngestionFailure, IngestionOrchestrator, IngestionOutcome, LanceRecordStore,
    MemoryRecordStore, ObjectImportOptions, ObjectStoreRetriever, RawDocument, ReadinessPolicy,
    RecordSink, SearchCriteria, SettingsProvider, Validator, parse_timestamp,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "fhir-ingest")]
#[command(version)]
#[command(about = "Ingest FHIR prescriptions, extract PZN codes and store them in LanceDB", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest local XML/JSON files or directories
    Ingest {
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Keep records in memory instead of writing them
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        no_progress: bool,
    },

    /// Download objects from an S3 bucket and ingest them
    Import {
        #[arg(long)]
        prefix: Option<String>,

        /// Exact object key; repeat for several. Disables prefix listing.
        #[arg(long = "key", value_name = "KEY")]
        keys: Vec<String>,

        #[arg(long, value_name = "NUM")]
        max_keys: Option<i64>,

        #[arg(long)]
        bucket: Option<String>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Search stored records by PZN and issue date
    Search {
        #[arg(long)]
        code: Option<String>,

        /// Earliest issue date (inclusive)
        #[arg(long, value_name = "DATE")]
        from: Option<String>,

        /// Latest issue date (inclusive)
        #[arg(long, value_name = "DATE")]
        to: Option<String>,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Print full records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that the database location and table exist
    Verify {
        #[arg(long)]
        create: bool,
    },

    /// Test the store connection
    Health,

    /// Show the effective connection settings
    Settings {
        /// Write the settings to the configured settings file
        #[arg(long)]
        persist: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    fhir_ingest::utils::logging::init_logger(cli.color, cli.verbose);
    colored::control::set_override(cli.color);

    info!("FHIR prescription ingestion");
    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::default_config()
    };

    let cancel = CancellationHandle::new();
    let signal = cancel.signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested, finishing current work");
            cancel.cancel();
        }
    });

    let settings = settings_provider(&config);

    match cli.command {
        Commands::Ingest {
            paths,
            dry_run,
            no_progress,
        } => cmd_ingest(&config, settings, paths, dry_run, !no_progress, &signal).await,
        Commands::Import {
            prefix,
            keys,
            max_keys,
            bucket,
            dry_run,
        } => {
            cmd_import(
                &config, settings, prefix, keys, max_keys, bucket, dry_run, &signal,
            )
            .await
        }
        Commands::Search {
            code,
            from,
            to,
            limit,
            json,
        } => cmd_search(&config, settings, code, from, to, limit, json).await,
        Commands::Verify { create } => cmd_verify(&config, settings, create, &signal).await,
        Commands::Health => cmd_health(&config, settings).await,
        Commands::Settings { persist } => cmd_settings(&config, settings, persist).await,
    }
}

fn settings_provider(config: &Config) -> Arc<dyn SettingsProvider> {
    match &config.store.settings_path {
        Some(path) => Arc::new(FileSettingsProvider::new(path, config.settings())),
        None => Arc::new(InMemorySettingsProvider::new(config.settings())),
    }
}

fn lance_store(config: &Config, settings: Arc<dyn SettingsProvider>) -> LanceRecordStore {
    LanceRecordStore::new(
        settings,
        Arc::new(ConnectionManager::new()),
        config.store.batch_size,
    )
    .with_readiness(ReadinessPolicy {
        attempts: config.store.readiness_attempts,
        delay: Duration::from_millis(config.store.readiness_delay_ms),
    })
}

fn record_sink(
    config: &Config,
    settings: Arc<dyn SettingsProvider>,
    dry_run: bool,
) -> Arc<dyn RecordSink> {
    if dry_run {
        info!("Dry run: records are kept in memory only");
        Arc::new(MemoryRecordStore::new())
    } else {
        Arc::new(lance_store(config, settings))
    }
}

async fn run_ingestion(
    config: &Config,
    sink: Arc<dyn RecordSink>,
    documents: Vec<RawDocument>,
    show_progress: bool,
    signal: &CancellationSignal,
) -> Result<IngestionOutcome> {
    let processor = DocumentProcessor::new(&config.pipeline);
    IngestionOrchestrator::new(processor, sink, &config.pipeline)
        .with_progress(show_progress)
        .ingest(documents, signal)
        .await
        .context("Failed to store prescription records")
}

async fn cmd_ingest(
    config: &Config,
    settings: Arc<dyn SettingsProvider>,
    paths: Vec<PathBuf>,
    dry_run: bool,
    show_progress: bool,
    signal: &CancellationSignal,
) -> Result<()> {
    println!("{}", format_step(1, 2, "Reading files"));
    let pipeline = config.pipeline.clone();
    let scanned = tokio::task::spawn_blocking(move || FileScanner::new(pipeline).scan(&paths))
        .await
        .context("File scanning task failed")?;

    println!(
        "{}",
        format_step(
            2,
            2,
            &format!("Ingesting {} document(s)", scanned.documents.len())
        )
    );
    let sink = record_sink(config, settings, dry_run);
    let mut outcome = run_ingestion(config, sink, scanned.documents, show_progress, signal).await?;
    outcome.failures.splice(0..0, scanned.failures);

    print_outcome(&outcome);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_import(
    config: &Config,
    settings: Arc<dyn SettingsProvider>,
    prefix: Option<String>,
    keys: Vec<String>,
    max_keys: Option<i64>,
    bucket: Option<String>,
    dry_run: bool,
    signal: &CancellationSignal,
) -> Result<()> {
    let mut object_settings = settings
        .get()
        .await
        .context("Failed to read settings")?
        .object_store;
    if let Some(bucket) = bucket {
        object_settings.bucket_name = bucket;
    }

    let mut options = ObjectImportOptions::from_settings(object_settings)
        .with_keys(keys)
        .with_max_keys(max_keys.unwrap_or(config.object_store.max_keys));
    if prefix.is_some() {
        options = options.with_prefix(prefix);
    }

    println!("{}", format_step(1, 2, "Downloading objects"));
    let fetched = ObjectStoreRetriever::load(options, signal).await;
    info!(
        "Downloaded {} object(s), {} failure(s)",
        fetched.files.len(),
        fetched.failures.len()
    );

    let mut outcome = if fetched.files.is_empty() {
        IngestionOutcome::default()
    } else {
        println!(
            "{}",
            format_step(
                2,
                2,
                &format!("Ingesting {} document(s)", fetched.files.len())
            )
        );
        let sink = record_sink(config, settings, dry_run);
        run_ingestion(config, sink, fetched.files, true, signal).await?
    };

    outcome.failures.splice(
        0..0,
        fetched.failures.into_iter().map(|f| IngestionFailure {
            file_name: f.object_key,
            error_message: f.error_message,
        }),
    );
    outcome.warnings.splice(0..0, fetched.warnings);

    print_outcome(&outcome);
    Ok(())
}

fn parse_date_arg(value: Option<String>, flag: &str) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|raw| {
            parse_timestamp(&raw).ok_or_else(|| anyhow!("Could not parse --{} date '{}'", flag, raw))
        })
        .transpose()
}

async fn cmd_search(
    config: &Config,
    settings: Arc<dyn SettingsProvider>,
    code: Option<String>,
    from: Option<String>,
    to: Option<String>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let criteria = SearchCriteria {
        code: code.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        issue_date_from: parse_date_arg(from, "from")?,
        issue_date_to: parse_date_arg(to, "to")?,
    };
    Validator::validate_date_range(criteria.issue_date_from, criteria.issue_date_to)?;

    let store = lance_store(config, settings);
    let mut records = store.search(&criteria).await.context("Search failed")?;
    let total = records.len();
    records.truncate(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{}", format_info("No matching records"));
        return Ok(());
    }

    println!("\nFound {} record(s), showing {}\n", total, records.len());
    println!("{}", "=".repeat(80));
    for (idx, record) in records.iter().enumerate() {
        println!("\n{}. {} ({})", idx + 1, record.file_name, record.id);
        println!(
            "   Primary PZN: {}",
            record.primary_code.as_deref().unwrap_or("-")
        );
        if record.codes.len() > 1 {
            println!("   All PZNs: {}", record.codes.join(", "));
        }
        println!(
            "   Issued: {}",
            record
                .issue_date
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        println!(
            "   Uploaded: {}",
            record.uploaded_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    println!("\n{}", "=".repeat(80));

    Ok(())
}

async fn cmd_verify(
    config: &Config,
    settings: Arc<dyn SettingsProvider>,
    create: bool,
    signal: &CancellationSignal,
) -> Result<()> {
    let store = lance_store(config, settings);
    let status = store
        .check_structure()
        .await
        .context("Failed to inspect database structure")?;

    println!("Database: {} ({})", status.database_uri, presence(status.database_exists));
    println!("Table:    {} ({})", status.table_name, presence(status.table_exists));

    if status.is_complete() {
        println!("{}", format_success("Database structure is complete"));
        return Ok(());
    }

    if !create {
        println!("{}", format_info("Use --create to create missing structures"));
        return Ok(());
    }

    let status = store
        .create_missing_structures(signal)
        .await
        .context("Failed to create database structures")?;
    if status.is_complete() {
        println!("{}", format_success("Created missing structures"));
        Ok(())
    } else {
        Err(anyhow!("Structures are still incomplete after creation"))
    }
}

fn presence(exists: bool) -> &'static str {
    if exists { "present" } else { "missing" }
}

async fn cmd_health(config: &Config, settings: Arc<dyn SettingsProvider>) -> Result<()> {
    let report = lance_store(config, settings).test_connection().await;
    println!("{}", report.format());

    if report.overall_status == HealthStatus::Unhealthy {
        return Err(anyhow!("Store is unhealthy"));
    }
    Ok(())
}

async fn cmd_settings(
    config: &Config,
    settings: Arc<dyn SettingsProvider>,
    persist: bool,
) -> Result<()> {
    let current = settings.get().await.context("Failed to read settings")?;
    println!("{}", serde_json::to_string_pretty(&current.redacted())?);

    if persist {
        match &config.store.settings_path {
            Some(path) => {
                settings.save(current).await.context("Failed to save settings")?;
                println!("{}", format_success(&format!("Saved to {}", path.display())));
            }
            None => println!(
                "{}",
                format_warning("No store.settings_path configured, nothing saved")
            ),
        }
    }
    Ok(())
}

fn print_outcome(outcome: &IngestionOutcome) {
    println!();
    println!(
        "{}",
        format_success(&format!("Stored {} record(s)", outcome.stored_records.len()))
    );

    for warning in &outcome.warnings {
        println!("{}", format_warning(warning));
    }

    if !outcome.failures.is_empty() {
        println!(
            "{}",
            format_error(&format!("{} file(s) failed", outcome.failures.len()))
        );
        for failure in &outcome.failures {
            println!(
                "  {}",
                format_failure(
                    &failure.file_name,
                    &Validator::truncate_text(&failure.error_message, 200)
                )
            );
        }
    }

    if outcome.cancelled {
        println!("{}", format_warning("Ingestion was cancelled"));
    }
}

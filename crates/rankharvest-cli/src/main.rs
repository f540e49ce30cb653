use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rankharvest_client::{ElasticsearchSink, SheetsConnector};
use rankharvest_core::keywords::load_keywords;
use rankharvest_core::session::SessionConfig;
use rankharvest_core::traits::{PersistenceSink, SurfaceConnector};
use rankharvest_core::{
    HarvestConfig, KeywordTask, NullSink, PoolReport, RetryQueue, SessionPool,
    TracingSessionReporter, run_date,
};

/// Exit status when no worksheet could be opened.
const EXIT_NO_SESSION: u8 = 1;
/// Exit status when the run could not be initialized.
const EXIT_INIT_FAILED: u8 = 2;

#[derive(Parser)]
#[command(name = "rankharvest", version, about = "Keyword ranking harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every keyword and index the results in Elasticsearch
    Run {
        #[command(flatten)]
        connect: ConnectArgs,

        /// Scrape but do not write anything to Elasticsearch
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Validate configuration, keyword file and credentials without scraping
    Check {
        #[command(flatten)]
        connect: ConnectArgs,
    },
}

#[derive(Args)]
struct ConnectArgs {
    /// Path to the JSON harvest configuration
    #[arg(short, long, env = "RANKHARVEST_CONFIG", default_value = "harvest.json")]
    config: PathBuf,

    /// OAuth access token with read/write access to the spreadsheets
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Elasticsearch basic auth user
    #[arg(long, env = "ELASTICSEARCH_USERNAME")]
    es_username: Option<String>,

    /// Elasticsearch basic auth password
    #[arg(long, env = "ELASTICSEARCH_PASSWORD", hide_env_values = true)]
    es_password: Option<String>,
}

/// Everything a run needs, gathered before the first keyword is scraped.
struct Harvest {
    config: HarvestConfig,
    keywords: Vec<KeywordTask>,
    connector: SheetsConnector,
    store: Option<ElasticsearchSink>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rankharvest=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { connect, dry_run } => cmd_run(&connect, dry_run).await,
        Commands::Check { connect } => cmd_check(&connect).await,
    }
}

/// Load configuration and keywords and reach the store. Any failure here
/// aborts the process before scraping begins.
async fn init(args: &ConnectArgs, with_store: bool) -> Result<Harvest> {
    let config = HarvestConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration {}", args.config.display()))?;

    let (keywords, store) = tokio::try_join!(load_keywords(&config.keywords_file), async {
        if with_store {
            connect_store(&config, args).await.map(Some)
        } else {
            Ok(None)
        }
    })?;

    let connector = SheetsConnector::new(&args.access_token, &config.worksheet_name)
        .context("Failed to create Sheets client")?;

    Ok(Harvest {
        config,
        keywords,
        connector,
        store,
    })
}

async fn connect_store(
    config: &HarvestConfig,
    args: &ConnectArgs,
) -> Result<ElasticsearchSink, rankharvest_core::HarvestError> {
    tracing::info!(url = %config.elasticsearch_url, "Logging into Elasticsearch");
    let mut sink = ElasticsearchSink::new(
        &config.elasticsearch_url,
        &config.elasticsearch_index,
        &config.elasticsearch_doc_type,
    )?;
    if let Some(user) = &args.es_username {
        sink = sink.with_basic_auth(user, args.es_password.clone().unwrap_or_default());
    }
    sink.ping().await?;
    Ok(sink)
}

async fn cmd_run(args: &ConnectArgs, dry_run: bool) -> ExitCode {
    let started = Instant::now();
    let date = run_date(Utc::now());

    let harvest = match init(args, !dry_run).await {
        Ok(harvest) => harvest,
        Err(e) => {
            tracing::error!("Error init: {e:#}");
            return ExitCode::from(EXIT_INIT_FAILED);
        }
    };

    let Harvest {
        config,
        keywords,
        connector,
        store,
    } = harvest;

    let queue = RetryQueue::with_tasks(config.retry_policy(), keywords);
    let session_config = config.session_config(date);
    let worksheets = config.spreadsheet_ids.clone();

    let report = match store {
        Some(sink) => run_pool(connector, sink, queue, worksheets, session_config).await,
        None => {
            tracing::info!("Dry run, results will not be saved");
            run_pool(connector, NullSink, queue, worksheets, session_config).await
        }
    };

    print_report(&report, started);

    if report.no_session_ran() {
        ExitCode::from(EXIT_NO_SESSION)
    } else {
        ExitCode::SUCCESS
    }
}

async fn run_pool<P: PersistenceSink + 'static>(
    connector: SheetsConnector,
    sink: P,
    queue: RetryQueue,
    worksheets: Vec<String>,
    config: SessionConfig,
) -> PoolReport {
    SessionPool::new(connector, sink, queue, worksheets, config)
        .run(Arc::new(TracingSessionReporter))
        .await
}

fn print_report(report: &PoolReport, started: Instant) {
    println!("Finished in {:.1}s", started.elapsed().as_secs_f64());
    println!(
        "  keywords scraped: {}  records saved: {}  write errors: {}  unsettled attempts: {}",
        report.succeeded(),
        report.records_written(),
        report.write_errors(),
        report.settle_failures()
    );

    for failure in &report.construction_failures {
        println!("  worksheet {} not scraped: {}", failure.worksheet, failure.reason);
    }
    if report.unprocessed > 0 {
        println!("  keywords left in queue: {}", report.unprocessed);
    }

    if report.failed_keywords.is_empty() {
        println!("  failed keywords: none");
    } else {
        println!("  failed keywords ({}):", report.failed_keywords.len());
        for task in &report.failed_keywords {
            println!("    {}\t{}", task.keyword, task.group);
        }
    }
}

async fn cmd_check(args: &ConnectArgs) -> ExitCode {
    let harvest = match init(args, true).await {
        Ok(harvest) => harvest,
        Err(e) => {
            tracing::error!("Error init: {e:#}");
            return ExitCode::from(EXIT_INIT_FAILED);
        }
    };

    println!("Configuration OK: {}", args.config.display());
    println!("Keywords: {}", harvest.keywords.len());
    println!("Elasticsearch: reachable");

    let mut all_ok = true;
    for worksheet in &harvest.config.spreadsheet_ids {
        match harvest.connector.connect(worksheet).await {
            Ok(_) => println!("Spreadsheet {worksheet}: OK"),
            Err(e) => {
                all_ok = false;
                println!("Spreadsheet {worksheet}: {e}");
            }
        }
    }

    if all_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NO_SESSION)
    }
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use sheetbridge_audit::AuditStore;
use sheetbridge_cli::{serve, HttpRowSink, LocalSink, Settings};
use sheetbridge_crm::CrmClient;
use sheetbridge_ingest::IngestPipeline;
use sheetbridge_protocol::WatchedSource;
use sheetbridge_watcher::{run_bridge, BridgeConfig, RowSink};

#[derive(Parser)]
#[command(
    name = "sheetbridge",
    about = "Spreadsheet to CRM contact bridge",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion API server
    Serve(ServeArgs),
    /// Watch a spreadsheet file and forward changed rows
    Watch(WatchArgs),
    /// List recent ingestion events
    Logs(LogsArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: String,
}

#[derive(Args)]
struct WatchArgs {
    /// Spreadsheet file to watch
    #[arg(long)]
    file: PathBuf,

    /// Ingest endpoint URL (defaults to API_URL or the local server)
    #[arg(long)]
    api_url: Option<String>,

    /// Spreadsheet identifier recorded with every row
    #[arg(long, default_value = "excel-desktop")]
    spreadsheet_id: String,

    /// Sheet name recorded with every row
    #[arg(long, default_value = "Sheet1")]
    sheet_name: String,

    /// Quiet window between accepted change bursts, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    debounce_ms: u64,

    /// Skip HTTP and run rows through an in-process pipeline
    #[arg(long)]
    direct: bool,
}

#[derive(Args)]
struct LogsArgs {
    /// Maximum number of events to list
    #[arg(long, default_value_t = 30)]
    limit: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Watch(args) => run_watch(args).await,
        Commands::Logs(args) => run_logs(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env();
    serve(settings, &args.bind).await
}

async fn run_watch(args: WatchArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env();
    let source = WatchedSource::new(args.spreadsheet_id, args.sheet_name);
    let mut config = BridgeConfig::new(args.file, source);
    config.debounce = Duration::from_millis(args.debounce_ms);

    let sink: Arc<dyn RowSink> = if args.direct {
        let store = open_store(&settings).await?;
        let crm = CrmClient::new(settings.crm_config());
        Arc::new(LocalSink::new(IngestPipeline::new(store, crm)))
    } else {
        let url = args
            .api_url
            .unwrap_or_else(|| settings.api_url.clone());
        Arc::new(HttpRowSink::new(url, settings.bridge_secret.clone()))
    };

    run_bridge(config, sink).await.context("file bridge failed")
}

async fn run_logs(args: LogsArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env();
    let store = open_store(&settings).await?;
    let events = store.recent(args.limit).await?;

    if events.is_empty() {
        eprintln!("No ingestion events recorded yet.");
        return Ok(());
    }
    for event in events {
        println!(
            "{} {:<9} {}/{} row {} crm={} {}",
            event.ts.format("%Y-%m-%d %H:%M:%S"),
            event.action.as_str(),
            event.spreadsheet_id,
            event.sheet_name,
            event.row_index,
            event.crm_id.as_deref().unwrap_or("-"),
            event.detail,
        );
    }
    Ok(())
}

async fn open_store(settings: &Settings) -> anyhow::Result<AuditStore> {
    AuditStore::open(&settings.db_path).await.with_context(|| {
        format!(
            "could not open audit store at {}",
            settings.db_path.display()
        )
    })
}

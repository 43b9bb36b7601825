use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import modules from the library crate
use postloop_scheduler_server::config;
use postloop_scheduler_server::content_store::{ContentStore, SqliteContentStore};
use postloop_scheduler_server::dispatch::HttpUploadDispatcher;
use postloop_scheduler_server::scheduler::{create_scheduler, SystemClock};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the scheduler database (scheduler.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// URL of the uploader agent that performs the actual publishing.
    #[clap(long, default_value = "http://localhost:5000")]
    pub uploader_url: String,

    /// Timeout in seconds for uploader requests.
    #[clap(long, default_value_t = 300)]
    pub uploader_timeout_sec: u64,

    /// Interval in seconds between due-schedule checks.
    #[clap(long, default_value_t = 60)]
    pub check_interval_secs: u64,

    /// IANA timezone used to match daily schedule times.
    #[clap(long, default_value = "UTC")]
    pub timezone: String,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            uploader_url: args.uploader_url.clone(),
            uploader_timeout_sec: args.uploader_timeout_sec,
            check_interval_secs: args.check_interval_secs,
            timezone: args.timezone.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  uploader_url: {}", app_config.uploader_url);
    info!(
        "  check interval: {}s, timezone: {}",
        app_config.scheduler.check_interval_secs, app_config.scheduler.timezone
    );

    // Create content store (will create DB if not exists)
    if !app_config.scheduler_db_path().exists() {
        info!(
            "Creating new scheduler database at {:?}",
            app_config.scheduler_db_path()
        );
    }
    let store: Arc<dyn ContentStore> =
        Arc::new(SqliteContentStore::new(app_config.scheduler_db_path())?);

    let dispatcher = Arc::new(HttpUploadDispatcher::new(
        app_config.uploader_url.clone(),
        app_config.uploader_timeout_sec,
    ));
    match dispatcher.health_check().await {
        Ok(()) => info!("Uploader agent reachable at {}", dispatcher.base_url()),
        Err(e) => warn!("Uploader agent not reachable at startup: {}", e),
    }

    let shutdown_token = CancellationToken::new();
    let (mut scheduler, _scheduler_handle) = create_scheduler(
        store,
        dispatcher,
        Arc::new(SystemClock),
        app_config.scheduler.timezone,
        app_config.scheduler.check_interval(),
        shutdown_token.clone(),
    );

    // Run the scheduler until it stops on its own or Ctrl+C arrives
    tokio::select! {
        _ = scheduler.run() => {
            info!("Scheduler stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            // Give the scheduler a moment to shut down gracefully
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    Ok(())
}

mod file_config;

pub use file_config::{FileConfig, SchedulerConfig};

use anyhow::{anyhow, bail, Result};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub uploader_url: String,
    pub uploader_timeout_sec: u64,
    pub check_interval_secs: u64,
    pub timezone: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            uploader_url: "http://localhost:5000".to_string(),
            uploader_timeout_sec: 300,
            check_interval_secs: 60,
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub uploader_url: String,
    pub uploader_timeout_sec: u64,

    // Feature configs (with defaults)
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub check_interval_secs: u64,
    pub timezone: Tz,
}

impl SchedulerSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let uploader_url = file
            .uploader_url
            .unwrap_or_else(|| cli.uploader_url.clone());
        if uploader_url.is_empty() {
            bail!("uploader_url must not be empty");
        }

        let uploader_timeout_sec = file
            .uploader_timeout_sec
            .unwrap_or(cli.uploader_timeout_sec);

        // Scheduler settings - merge file config with CLI values
        let sched_file = file.scheduler.unwrap_or_default();
        let check_interval_secs = sched_file
            .check_interval_secs
            .unwrap_or(cli.check_interval_secs);
        if check_interval_secs == 0 {
            bail!("check_interval_secs must be greater than zero");
        }

        let timezone_name = sched_file.timezone.unwrap_or_else(|| cli.timezone.clone());
        let timezone = parse_timezone(&timezone_name)?;

        Ok(Self {
            db_dir,
            uploader_url,
            uploader_timeout_sec,
            scheduler: SchedulerSettings {
                check_interval_secs,
                timezone,
            },
        })
    }

    pub fn scheduler_db_path(&self) -> PathBuf {
        self.db_dir.join("scheduler.db")
    }
}

/// Parses an IANA timezone name.
fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| anyhow!("Unknown timezone: {}", name))
}

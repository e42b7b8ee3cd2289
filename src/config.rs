use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "realty-desk", about = "Mortgage, listing and valuation desk for the terminal")]
pub struct CliArgs {
    /// File that submitted listings are appended to, one JSON document per line
    #[arg(long, env = "REALTY_DESK_OUTBOX", default_value = "listings.jsonl")]
    pub outbox: PathBuf,

    /// Directory amortization schedules are exported into
    #[arg(long, env = "REALTY_DESK_EXPORT_DIR", default_value = ".")]
    pub export_dir: PathBuf,

    /// File diagnostics are written to while the terminal UI is running
    #[arg(long, env = "REALTY_DESK_LOG_FILE", default_value = "realty-desk.log")]
    pub log_file: PathBuf,

    /// Log filter directive, e.g. `info` or `realty_desk=debug`
    #[arg(long, env = "REALTY_DESK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub outbox: PathBuf,
    pub export_dir: PathBuf,
    pub log_file: PathBuf,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            outbox,
            export_dir,
            log_file,
            log_level,
        } = args;

        if outbox.as_os_str().is_empty() {
            bail!("--outbox must not be empty");
        }
        if export_dir.exists() && !export_dir.is_dir() {
            bail!("export directory {} is not a directory", export_dir.display());
        }
        if log_file.is_dir() {
            bail!("log file {} is a directory", log_file.display());
        }

        Ok(Self {
            outbox,
            export_dir,
            log_file,
            log_level,
        })
    }

    pub fn schedule_export_path(&self) -> PathBuf {
        self.export_dir.join("mortgage_schedule.csv")
    }
}

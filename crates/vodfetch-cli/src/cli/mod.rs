//! CLI for vodfetch.

mod commands;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;
use vodfetch_core::config::{self, VodConfig};
use vodfetch_core::session::Stream;

use commands::{run_completions, run_config, run_dates, run_download};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "vodfetch")]
#[command(about = "Download a full day of recordings from a Reolink NVR or camera", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Device connection flags; each overrides the config file and `REOLINK_*` variables.
#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// Device IP or hostname (optionally host:port).
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long, short = 'u')]
    pub username: Option<String>,
    #[arg(long, short = 'p')]
    pub password: Option<String>,
    /// Camera channel (0-based).
    #[arg(long, short = 'c')]
    pub channel: Option<u8>,
    /// Stream quality.
    #[arg(long, short = 'q', value_enum)]
    pub quality: Option<Quality>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Quality {
    /// Main stream, full resolution.
    High,
    /// Sub stream, reduced resolution.
    Low,
}

impl From<Quality> for Stream {
    fn from(q: Quality) -> Self {
        match q {
            Quality::High => Stream::Main,
            Quality::Low => Stream::Sub,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every recording of one day in fixed-length chunks.
    Download {
        #[command(flatten)]
        conn: ConnectionArgs,
        /// Day to download (YYYY-MM-DD, device local time).
        #[arg(long, short = 'd')]
        date: NaiveDate,
        /// Directory chunks are written to.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Parallel workers, each with its own device session.
        #[arg(long, short = 'w', value_name = "N")]
        workers: Option<usize>,
        /// Chunk length in minutes.
        #[arg(long, value_name = "MIN")]
        chunk_minutes: Option<u32>,
    },

    /// List recent days that have recordings.
    Dates {
        #[command(flatten)]
        conn: ConnectionArgs,
        /// How many days back to scan, today included.
        #[arg(long, default_value = "30", value_name = "N")]
        days: u32,
    },

    /// Show the effective configuration and where it is stored.
    Config,

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl ConnectionArgs {
    fn apply(&self, cfg: &mut VodConfig) {
        if let Some(host) = &self.host {
            cfg.host = Some(host.clone());
        }
        if let Some(username) = &self.username {
            cfg.username = username.clone();
        }
        if let Some(password) = &self.password {
            cfg.password = Some(password.clone());
        }
        if let Some(channel) = self.channel {
            cfg.channel = channel;
        }
        if let Some(quality) = self.quality {
            cfg.stream = quality.into();
        }
    }
}

/// Config file, then `.env` / environment, then flags.
fn effective_config(conn: &ConnectionArgs) -> Result<VodConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("loaded environment from {}", path.display());
    }
    let mut cfg = config::load_or_init()?;
    cfg.apply_env()?;
    conn.apply(&mut cfg);
    Ok(cfg)
}

impl CliCommand {
    /// Parse arguments and run the command. Returns the process exit code.
    pub async fn run_from_args() -> Result<i32> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Download {
                conn,
                date,
                output,
                workers,
                chunk_minutes,
            } => {
                let mut cfg = effective_config(&conn)?;
                if let Some(output) = output {
                    cfg.output_dir = output;
                }
                if let Some(workers) = workers {
                    cfg.workers = workers;
                }
                if let Some(minutes) = chunk_minutes {
                    cfg.chunk_minutes = minutes;
                }
                tracing::debug!("effective config: {:?}", cfg.redacted());
                run_download(cfg, date).await
            }
            CliCommand::Dates { conn, days } => {
                let cfg = effective_config(&conn)?;
                run_dates(cfg, days).await?;
                Ok(0)
            }
            CliCommand::Config => {
                let cfg = effective_config(&ConnectionArgs::default())?;
                run_config(&cfg)?;
                Ok(0)
            }
            CliCommand::Completions { shell } => {
                run_completions(shell);
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests;

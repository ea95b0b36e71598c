//! `vodfetch config` – show where the config lives and what is in effect.

use anyhow::{Context, Result};
use vodfetch_core::config::{config_path, VodConfig};
use vodfetch_core::logging::log_file_path;

pub fn run_config(cfg: &VodConfig) -> Result<()> {
    println!("Config file: {}", config_path()?.display());
    if let Ok(log) = log_file_path() {
        println!("Log file:    {}", log.display());
    }
    println!();
    let shown = toml::to_string_pretty(&cfg.redacted()).context("render config")?;
    print!("{}", shown);
    Ok(())
}

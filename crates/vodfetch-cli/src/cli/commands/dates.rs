//! `vodfetch dates` – list recent days that have recordings.

use anyhow::{Context, Result};
use chrono::Local;
use vodfetch_core::config::VodConfig;
use vodfetch_core::dates::scan_recording_dates;
use vodfetch_core::session::reolink::{ReolinkOptions, ReolinkSession};
use vodfetch_core::session::{RetrievalSession, SessionGuard};

pub async fn run_dates(cfg: VodConfig, days: u32) -> Result<()> {
    let options = ReolinkOptions::from_config(&cfg)?;
    let today = Local::now().date_naive();
    println!(
        "Scanning the last {} day(s) on channel {} ({})...",
        days,
        cfg.channel,
        cfg.stream.label()
    );

    let found = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut session = SessionGuard::new(ReolinkSession::new(options));
        session.authenticate().context("login failed")?;
        Ok(scan_recording_dates(
            &mut *session,
            cfg.channel,
            cfg.stream,
            today,
            days,
        ))
    })
    .await
    .context("date scan task join")??;

    if found.is_empty() {
        println!("No recordings found in the last {} day(s)", days);
        return Ok(());
    }
    for day in found {
        let age = match (today - day).num_days() {
            0 => "today".to_string(),
            1 => "yesterday".to_string(),
            n => format!("{} days ago", n),
        };
        println!("  {}  {}", day.format("%Y-%m-%d (%A)"), age);
    }
    Ok(())
}

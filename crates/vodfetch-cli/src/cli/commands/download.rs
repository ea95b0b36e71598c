//! `vodfetch download` – fetch every recording of one day.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::sync::mpsc;
use vodfetch_core::config::VodConfig;
use vodfetch_core::control::CancelToken;
use vodfetch_core::orchestrator::{prepare_day, run_plan, RunSettings};
use vodfetch_core::progress::{TaskReport, TaskStatus};
use vodfetch_core::session::reolink::{ReolinkFactory, ReolinkOptions};

const MIB: f64 = 1_048_576.0;

/// Exit code after Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

fn print_report(r: &TaskReport) {
    let p = &r.progress;
    let chunk = r.outcome.task.label();
    let mib = r.outcome.bytes as f64 / MIB;
    match r.outcome.status {
        TaskStatus::Downloaded => println!(
            "  [W{}] ✓ {} ({:.1} MB) [{}/{}]",
            r.worker,
            chunk,
            mib,
            p.completed(),
            p.total
        ),
        TaskStatus::Exists => println!(
            "  [W{}] ⏭ {} (exists: {:.1} MB) [{}/{}]",
            r.worker,
            chunk,
            mib,
            p.completed(),
            p.total
        ),
        TaskStatus::Failed => println!(
            "  [W{}] ✗ {} (failed) [{}/{}]",
            r.worker,
            chunk,
            p.completed(),
            p.total
        ),
    }
}

/// Run the download and return the process exit code.
pub async fn run_download(cfg: VodConfig, date: NaiveDate) -> Result<i32> {
    let factory = ReolinkFactory::new(ReolinkOptions::from_config(&cfg)?);
    let settings = RunSettings::from_config(&cfg, date);

    println!("Downloading recordings from {}", date);
    println!("  Channel:    {}", settings.channel);
    println!("  Quality:    {}", settings.stream.label());
    println!("  Chunk size: {} minutes", cfg.chunk_minutes);
    println!("  Workers:    {}", settings.workers.max(1));
    println!();

    let plan = tokio::task::spawn_blocking({
        let factory = factory.clone();
        let settings = settings.clone();
        move || prepare_day(&factory, &settings)
    })
    .await
    .context("listing task join")??;

    if plan.is_empty() {
        println!("No recordings found for {}", date);
        return Ok(0);
    }
    println!("Found {} recording segment(s)", plan.segments.len());
    println!("  Total chunks:   {}", plan.tasks.len());
    println!(
        "  Estimated size: ~{:.1} GB",
        plan.estimated_bytes as f64 / MIB / 1024.0
    );
    println!();

    let cancel = CancelToken::new();
    let (tx, rx) = mpsc::channel::<TaskReport>();
    let printer = std::thread::spawn(move || {
        for report in rx {
            print_report(&report);
        }
    });

    let mut run = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        move || run_plan(&factory, &settings, plan, Some(tx), &cancel)
    });
    let joined = tokio::select! {
        res = &mut run => res,
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted, stopping after in-flight chunks...");
            tracing::info!("ctrl-c received, cancelling run");
            cancel.cancel();
            run.await
        }
    };
    let summary = joined.context("download task join")??;
    let _ = printer.join();

    if summary.auth_failures > 0 {
        println!(
            "Warning: {} worker(s) could not log in; the others took over their chunks.",
            summary.auth_failures
        );
    }

    println!();
    println!("{}", "=".repeat(60));
    println!("{}", summary);
    println!("{}", "=".repeat(60));

    let code = if summary.cancelled {
        EXIT_INTERRUPTED
    } else if summary.is_complete() {
        0
    } else {
        1
    };
    Ok(code)
}

//! `run`: executes a whole report job in-process.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use circrep_core::AppConfig;
use circrep_engine::{
    default_exporters, download_name, CircuitOutcome, EngineConfig, JobEngine, JobSnapshot,
    JobStatus,
};
use circrep_telemetry::SoapTelemetryClient;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Submits `input` to an in-process engine, streams its progress, and copies
/// the archive into `output` under its download name.
///
/// Ctrl-C requests cancellation; the job stops before its next circuit.
///
/// # Errors
///
/// Returns an error if the spreadsheet cannot be read, the telemetry client
/// cannot be built, the job fails or is canceled, or the archive cannot be
/// copied.
pub(crate) async fn run_report_job(
    config: &AppConfig,
    input: &Path,
    output: &Path,
) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let client = SoapTelemetryClient::new(config)?;
    let engine = JobEngine::new(
        client,
        EngineConfig::from(config),
        default_exporters(config.report_font_path.as_deref()),
    );

    let id = engine.submit(bytes, file_name);
    tracing::info!(job_id = %id, input = %input.display(), "report job started");

    let snapshot = loop {
        for line in engine.drain_logs(id).unwrap_or_default() {
            println!("{line}");
        }
        let snapshot = engine
            .status(id)
            .ok_or_else(|| anyhow::anyhow!("job {id} disappeared"))?;
        if snapshot.completed {
            break snapshot;
        }
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c")?;
                println!("cancelling after the current circuit...");
                engine.cancel(id);
            }
            () = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    };
    for line in engine.drain_logs(id).unwrap_or_default() {
        println!("{line}");
    }

    print_outcomes(&snapshot.outcomes);
    println!("{}", summary_line(&snapshot));

    match snapshot.status {
        JobStatus::Completed => {
            let archive = engine
                .archive_path(id)
                .ok_or_else(|| anyhow::anyhow!("job {id} completed without an archive"))?;
            let dest = copy_archive(&archive, output).await?;
            println!("archive written to {}", dest.display());
            Ok(())
        }
        JobStatus::Canceled => anyhow::bail!("job {id} was canceled"),
        _ => anyhow::bail!(
            "job {id} failed: {}",
            snapshot.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

async fn copy_archive(archive: &Path, output: &Path) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(output)
        .await
        .with_context(|| format!("failed to create {}", output.display()))?;
    let dest = output.join(download_name(archive));
    tokio::fs::copy(archive, &dest)
        .await
        .with_context(|| format!("failed to copy archive to {}", dest.display()))?;
    if let Err(e) = tokio::fs::remove_file(archive).await {
        tracing::warn!(archive = %archive.display(), error = %e, "failed to remove staged archive");
    }
    Ok(dest)
}

fn print_outcomes(outcomes: &[CircuitOutcome]) {
    if outcomes.is_empty() {
        return;
    }
    println!(
        "{:<6}{:<12}{:<14}{:<5}{:<5}NODE NAME / ERROR",
        "ROW", "NODE", "INTERFACE", "CSV", "PDF"
    );
    for outcome in outcomes {
        println!("{}", outcome_line(outcome));
    }
}

fn outcome_line(outcome: &CircuitOutcome) -> String {
    let mark = |ok: bool| if ok { "ok" } else { "-" };
    let detail = outcome.error.as_deref().unwrap_or(&outcome.node_name);
    format!(
        "{:<6}{:<12}{:<14}{:<5}{:<5}{}",
        outcome.row_number,
        outcome.node_id,
        outcome.interface_id,
        mark(outcome.csv_success),
        mark(outcome.pdf_success),
        detail
    )
}

fn summary_line(snapshot: &JobSnapshot) -> String {
    let failed = snapshot
        .outcomes
        .iter()
        .filter(|o| o.error.is_some())
        .count();
    let total = if snapshot.total < 0 {
        "?".to_string()
    } else {
        snapshot.total.to_string()
    };
    format!(
        "job {}: {} ({}/{} processed, {} with errors)",
        snapshot.job_id, snapshot.status, snapshot.processed, total, failed
    )
}

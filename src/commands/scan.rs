// ABOUTME: Scan command handler for large image batches.
// ABOUTME: Selects work from the checkpoint mode, pulls concurrently and saves progress.

use parking_lot::Mutex;
use pullwarden::batch::BatchJob;
use pullwarden::checkpoint::{Checkpoint, CheckpointRecord, CheckpointStore, ScanMode, select_work};
use pullwarden::config::Config;
use pullwarden::diagnostics::{Diagnostics, Warning};
use pullwarden::error::Result;
use pullwarden::output::Output;
use pullwarden::pull::{PullOptions, SupportMode};
use pullwarden::types::ImageReference;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::services::{Services, report_diagnostics};

pub struct ScanArgs {
    pub images: PathBuf,
    pub checkpoint: Option<PathBuf>,
    pub resume: bool,
    pub retry_failures: bool,
    pub skip_permanent_failures: bool,
    pub concurrency: usize,
    pub allow_private_fallback: bool,
}

/// Read one reference per line, skipping blanks and `#` comments.
fn read_image_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Returns whether every selected image succeeded.
pub async fn scan(config: Config, args: ScanArgs, output: &mut Output) -> Result<bool> {
    let checkpoint_path = args
        .checkpoint
        .clone()
        .unwrap_or_else(|| config.checkpoint.path.clone());
    let mode = ScanMode::from_flags(
        args.resume,
        args.retry_failures,
        args.skip_permanent_failures,
        &checkpoint_path,
    )?;

    let all_images = read_image_list(&args.images)?;
    let store = CheckpointStore::new(&checkpoint_path);
    let checkpoint = if mode.reads_checkpoint() && store.exists() {
        store.load()?
    } else {
        Checkpoint::new()
    };
    let work = select_work(&all_images, Some(&checkpoint), mode);

    output.start_timer();
    output.progress(&format!(
        "Scanning {} of {} image(s) ({:?}), checkpoint at {}",
        work.len(),
        all_images.len(),
        mode,
        checkpoint_path.display()
    ));

    let services = Services::new(config);
    let mut diagnostics = Diagnostics::default();
    let puller = Arc::new(services.puller(output, &mut diagnostics).await);
    let tokens = Arc::new(services.token_manager());
    let support = Arc::new(Mutex::new(SupportMode::default()));
    let warnings = Arc::new(Mutex::new(Diagnostics::default()));

    let job = BatchJob::new(store, args.concurrency)
        .with_flush_every(services.config.checkpoint.flush_every)
        .with_token_manager(tokens.clone());

    let cancel = job.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight pulls");
            cancel.cancel();
        }
    });

    let allow_private_fallback = args.allow_private_fallback;
    let pull_one = |raw: String| {
        let puller = puller.clone();
        let tokens = tokens.clone();
        let support = support.clone();
        let warnings = warnings.clone();
        async move {
            let image = match ImageReference::parse(&raw) {
                Ok(image) => image,
                Err(e) => {
                    warnings.lock().warn(Warning::invalid_image(&raw, &e));
                    return CheckpointRecord::invalid(raw, e);
                }
            };

            let host = image.registry_or_default().to_string();
            if let Err(e) = tokens.refresh_if_needed(&host).await {
                warnings.lock().warn(Warning::token_refresh(&host, e));
            }

            let snapshot = support.lock().clone();
            let options = PullOptions {
                allow_private_fallback,
                ..PullOptions::default()
            };
            let result = puller.pull_with_fallback(&image, &options, &snapshot).await;
            if result.triggered_support_mode() {
                support.lock().apply(&result.delta);
            }
            tokens.record_use(&host);

            CheckpointRecord::from_pull(raw, &result)
        }
    };

    let report = job.run(work, checkpoint, pull_one).await?;

    diagnostics.extend(report.diagnostics);
    diagnostics.extend(std::mem::take(&mut *warnings.lock()));

    let summary = report.summary;
    let human = format!(
        "Processed {} image(s): {} succeeded, {} permanent failure(s), {} recoverable failure(s){}",
        report.processed,
        summary.success,
        summary.permanent_failure,
        summary.recoverable_failure,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    output.result("scan_complete", &human, &summary);
    report_diagnostics(output, &diagnostics);

    Ok(!report.cancelled && summary.permanent_failure == 0 && summary.recoverable_failure == 0)
}

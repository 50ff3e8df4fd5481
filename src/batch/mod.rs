// ABOUTME: Bounded-concurrency batch driver that records every outcome in the checkpoint.
// ABOUTME: Cancellation stops new work between images, lets in-flight work finish, then flushes.

use futures::StreamExt;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::checkpoint::{Checkpoint, CheckpointError, CheckpointRecord, CheckpointStore, Summary};
use crate::diagnostics::{Diagnostics, Warning};
use crate::token::TokenManager;
use crate::types::ImageReference;

/// Result of one batch run.
#[derive(Debug)]
pub struct BatchReport {
    /// Outcomes recorded during this run.
    pub processed: usize,
    /// Totals over the whole checkpoint, including earlier runs.
    pub summary: Summary,
    pub cancelled: bool,
    pub diagnostics: Diagnostics,
    pub checkpoint: Checkpoint,
}

pub struct BatchJob {
    store: CheckpointStore,
    concurrency: usize,
    flush_every: usize,
    cancel: CancellationToken,
    token_manager: Option<Arc<TokenManager>>,
}

impl BatchJob {
    pub fn new(store: CheckpointStore, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
            flush_every: 25,
            cancel: CancellationToken::new(),
            token_manager: None,
        }
    }

    pub fn with_flush_every(mut self, flush_every: usize) -> Self {
        self.flush_every = flush_every.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_token_manager(mut self, token_manager: Arc<TokenManager>) -> Self {
        self.token_manager = Some(token_manager);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Refresh ageing credentials for every registry the batch will touch.
    pub async fn prepare_credentials(&self, images: &[String], diagnostics: &mut Diagnostics) {
        let Some(ref tm) = self.token_manager else {
            return;
        };

        let hosts: BTreeSet<String> = images
            .iter()
            .filter_map(|raw| ImageReference::parse(raw).ok())
            .map(|image| image.registry_or_default().to_string())
            .collect();

        for host in hosts {
            if tm.needs_proactive_refresh(&host)
                && let Err(e) = tm.refresh_proactively(&host).await
            {
                diagnostics.warn(Warning::token_refresh(&host, e));
            }
            tm.record_use(&host);
        }
    }

    /// Run `work` over `images`, merging each record into `checkpoint`.
    ///
    /// Intermediate flush failures become diagnostics; only the final flush is an error.
    pub async fn run<F, Fut>(
        &self,
        images: Vec<String>,
        mut checkpoint: Checkpoint,
        work: F,
    ) -> Result<BatchReport, CheckpointError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = CheckpointRecord>,
    {
        let mut diagnostics = Diagnostics::default();
        self.prepare_credentials(&images, &mut diagnostics).await;

        let total = images.len();
        tracing::info!(
            "Processing {} image(s) with concurrency {}",
            total,
            self.concurrency
        );

        let cancel = self.cancel.clone();
        let mut outcomes = futures::stream::iter(images)
            .take_while(move |_| std::future::ready(!cancel.is_cancelled()))
            .map(&work)
            .buffer_unordered(self.concurrency);

        let mut processed = 0usize;
        while let Some(record) = outcomes.next().await {
            tracing::debug!("{} -> {:?}", record.reference, record.outcome);
            checkpoint.merge([record]);
            processed += 1;

            if processed % self.flush_every == 0 {
                if let Err(e) = self.store.save(&checkpoint) {
                    diagnostics.warn(Warning::checkpoint_flush(e));
                } else {
                    tracing::debug!("Checkpoint flushed after {}/{} images", processed, total);
                }
            }
        }

        let cancelled = self.cancel.is_cancelled() && processed < total;
        if cancelled {
            tracing::warn!(
                "Batch cancelled after {}/{} images, saving checkpoint to {}",
                processed,
                total,
                self.store.path().display()
            );
        }
        self.store.save(&checkpoint)?;

        Ok(BatchReport {
            processed,
            summary: checkpoint.summary(),
            cancelled,
            diagnostics,
            checkpoint,
        })
    }
}

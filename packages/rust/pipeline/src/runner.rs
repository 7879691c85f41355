//! The monitoring pass orchestrator.
//!
//! One pass iterates every active target and drives each through
//! fetch → detect → (summarize) → persist → notify. Targets fail
//! independently: a fetch or storage error on one target is recorded in the
//! pass report and the batch continues. Only a registry listing failure
//! aborts the pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use pagewatch_fetcher::Fetcher;
use pagewatch_notifier::Notifier;
use pagewatch_shared::{
    ChangeSummary, PagewatchError, Result, Snapshot, SnapshotId, Target, TargetId,
};
use pagewatch_storage::Storage;
use pagewatch_summarizer::Summarizer;

use crate::detector;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// How a single target's check ended.
#[derive(Debug)]
pub enum TargetOutcome {
    /// Fingerprint matched the baseline; nothing written, nobody notified.
    Unchanged,
    /// A new snapshot was persisted.
    Changed {
        snapshot_id: SnapshotId,
        /// True for a target's first observation (no prior baseline).
        initial: bool,
        /// False when the alert could not be delivered; the snapshot stays
        /// persisted and is not re-notified.
        notified: bool,
    },
}

/// Per-target entry in the pass report.
#[derive(Debug)]
pub struct TargetReport {
    pub target_id: TargetId,
    pub url: String,
    pub result: std::result::Result<TargetOutcome, PagewatchError>,
}

/// Aggregate result of one monitoring pass.
#[derive(Debug)]
pub struct PassReport {
    /// Targets processed (all active targets).
    pub checked: usize,
    /// Targets that produced a new snapshot.
    pub changed: usize,
    /// Targets that failed (fetch or persistence).
    pub failed: usize,
    /// Per-target outcomes, in registry order.
    pub outcomes: Vec<TargetReport>,
    /// Total pass duration.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pass status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each target finishes (in completion order).
    fn target_checked(&self, url: &str, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn target_checked(&self, _url: &str, _current: usize, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The monitoring pipeline with its injected capabilities.
///
/// Capabilities are resolved once at process start, configured or degraded,
/// and passed in.
pub struct Pipeline {
    fetcher: Fetcher,
    summarizer: Summarizer,
    notifier: Notifier,
    concurrency: u32,
}

impl Pipeline {
    pub fn new(
        fetcher: Fetcher,
        summarizer: Summarizer,
        notifier: Notifier,
        concurrency: u32,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            notifier,
            concurrency: concurrency.max(1),
        }
    }

    /// Run one full pass over all active targets.
    ///
    /// Returns an error only when the registry listing itself fails; every
    /// per-target failure is isolated into the report.
    #[instrument(skip_all)]
    pub async fn run_pass(
        &self,
        storage: &Storage,
        progress: &dyn ProgressReporter,
    ) -> Result<PassReport> {
        let start = std::time::Instant::now();

        progress.phase("Listing active targets");
        let targets = storage.list_active_targets().await?;
        let total = targets.len();

        info!(targets = total, concurrency = self.concurrency, "starting pass");

        // Fetches run concurrently; everything after the fetch is driven
        // sequentially in registry order below.
        progress.phase("Checking targets");
        let semaphore = Arc::new(Semaphore::new(self.concurrency as usize));

        let mut handles = Vec::with_capacity(total);
        for target in &targets {
            let fetcher = self.fetcher.clone();
            let sem = semaphore.clone();
            let url = target.url.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                fetcher.fetch(&url).await
            }));
        }

        let mut outcomes = Vec::with_capacity(total);
        let mut changed = 0;
        let mut failed = 0;

        for (i, (target, handle)) in targets.iter().zip(handles).enumerate() {
            let fetched = match handle.await {
                Ok(result) => result,
                Err(e) => Err(PagewatchError::Network(format!(
                    "{}: fetch task failed: {e}",
                    target.url
                ))),
            };

            let result = match fetched {
                Ok(text) => self.check_target(storage, target, text).await,
                Err(e) => Err(e),
            };

            match &result {
                Ok(TargetOutcome::Unchanged) => {
                    info!(url = %target.url, "no change");
                }
                Ok(TargetOutcome::Changed {
                    initial, notified, ..
                }) => {
                    info!(url = %target.url, initial, notified, "change detected");
                    changed += 1;
                }
                Err(e) => {
                    warn!(url = %target.url, error = %e, "target check failed");
                    failed += 1;
                }
            }

            progress.target_checked(&target.url, i + 1, total);
            outcomes.push(TargetReport {
                target_id: target.id.clone(),
                url: target.url.clone(),
                result,
            });
        }

        let report = PassReport {
            checked: total,
            changed,
            failed,
            outcomes,
            duration: start.elapsed(),
        };

        info!(
            checked = report.checked,
            changed = report.changed,
            failed = report.failed,
            duration_ms = report.duration.as_millis(),
            "pass completed"
        );

        Ok(report)
    }

    /// Drive one fetched target through detect → summarize → persist → notify.
    async fn check_target(
        &self,
        storage: &Storage,
        target: &Target,
        text: String,
    ) -> Result<TargetOutcome> {
        let target_id = target.id.to_string();
        let latest = storage.latest_snapshot(&target_id).await?;

        let detection = detector::detect(latest.as_ref(), &text);
        if !detection.changed {
            self.touch(storage, &target_id).await;
            return Ok(TargetOutcome::Unchanged);
        }

        // First observation gets the fixed pair; the backend is not asked to
        // diff against nothing.
        let change = match &latest {
            Some(baseline) => {
                self.summarizer
                    .summarize(&baseline.clean_content, &text)
                    .await
            }
            None => ChangeSummary::initial(),
        };

        let snapshot = Snapshot {
            id: SnapshotId::new(),
            target_id: target.id.clone(),
            content_hash: detection.fingerprint,
            clean_content: text,
            summary: change.summary.clone(),
            diff_description: change.description.clone(),
            created_at: Utc::now(),
        };

        // A change that cannot be durably recorded fails the target; it must
        // not be silently reported as "no change".
        storage.insert_snapshot(&snapshot).await?;

        // The snapshot stays persisted even when delivery fails; no
        // rollback, no retry.
        let notified = match self
            .notifier
            .send(
                &target.owner_email,
                &alert_subject(target),
                &alert_body(target, &change),
            )
            .await
        {
            Ok(delivery) => delivery.delivered,
            Err(e) => {
                warn!(url = %target.url, error = %e, "alert delivery failed");
                false
            }
        };

        self.touch(storage, &target_id).await;

        Ok(TargetOutcome::Changed {
            snapshot_id: snapshot.id,
            initial: latest.is_none(),
            notified,
        })
    }

    /// Best-effort `last_checked` update.
    async fn touch(&self, storage: &Storage, target_id: &str) {
        if let Err(e) = storage.touch_last_checked(target_id).await {
            warn!(target_id, error = %e, "failed to update last_checked");
        }
    }
}

// ---------------------------------------------------------------------------
// Alert formatting
// ---------------------------------------------------------------------------

/// Subject line for a change alert.
pub fn alert_subject(target: &Target) -> String {
    format!("Change Detected: {}", target.display_name())
}

/// HTML body for a change alert.
pub fn alert_body(target: &Target, change: &ChangeSummary) -> String {
    format!(
        "<h2>Change Detected on {}</h2>\n\
         <p><strong>Summary:</strong> {}</p>\n\
         <p><strong>Details:</strong> {}</p>\n\
         <a href=\"{}\">Visit Site</a>",
        target.display_name(),
        change.summary,
        change.description,
        target.url,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

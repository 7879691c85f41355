//! The periodic monitoring pipeline.
//!
//! This crate provides:
//! - [`detector`] — content fingerprinting and change detection
//! - [`runner`] — the pass orchestrator driving
//!   fetch → detect → summarize → persist → notify per target
//!
//! The pipeline does not decide *when* it runs; an external trigger (cron or
//! the CLI) invokes [`Pipeline::run_pass`] for one full pass over all active
//! targets.

pub mod detector;
pub mod runner;

pub use detector::{Detection, detect, fingerprint};
pub use runner::{
    PassReport, Pipeline, ProgressReporter, SilentProgress, TargetOutcome, TargetReport,
    alert_body, alert_subject,
};

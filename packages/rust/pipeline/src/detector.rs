//! Content change detection.
//!
//! A fingerprint is a SHA-256 digest of the normalized page text. Equal
//! fingerprints are treated as "no change" — distinct markup that normalizes
//! to identical text is indistinguishable here, an accepted false-negative
//! surface.

use sha2::{Digest, Sha256};

use pagewatch_shared::Snapshot;

/// Outcome of comparing a fetch against the stored baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// True when no baseline exists (first observation) or the baseline
    /// fingerprint differs.
    pub changed: bool,
    /// Fingerprint of the current text.
    pub fingerprint: String,
}

/// Compute the SHA-256 hex fingerprint of normalized text.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compare current text against the latest stored snapshot, if any.
/// Pure; no side effects.
pub fn detect(latest: Option<&Snapshot>, current_text: &str) -> Detection {
    let fingerprint = fingerprint(current_text);
    let changed = match latest {
        Some(snapshot) => snapshot.content_hash != fingerprint,
        None => true,
    };
    Detection {
        changed,
        fingerprint,
    }
}

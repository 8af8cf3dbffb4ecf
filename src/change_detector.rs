//! Trigger gating for the capture pipeline.
//!
//! Observer notifications can arrive in storms (every scroll frame, every
//! content tweak). The change detector decides whether a freshly captured
//! text should be sent for analysis:
//!
//! - a minimum interval between dispatches (0 disables it); the caller keeps
//!   the latest throttled text and retries at [`ChangeDetector::next_allowed`]
//! - optionally, skipping text identical to the last dispatched text

use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};
use tracing::trace;

/// Outcome of [`ChangeDetector::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDecision {
    /// Send the text for analysis
    Dispatch,
    /// Too soon after the previous dispatch
    Throttled,
    /// Same text as the previous dispatch
    Unchanged,
}

/// Tracks the last dispatch to gate new ones
pub struct ChangeDetector {
    min_interval: Duration,
    skip_unchanged: bool,
    last_dispatch: Option<Instant>,
    last_hash: Option<[u8; 32]>,
}

impl ChangeDetector {
    pub fn new(min_interval: Duration, skip_unchanged: bool) -> Self {
        Self {
            min_interval,
            skip_unchanged,
            last_dispatch: None,
            last_hash: None,
        }
    }

    /// Decide whether `text` should be dispatched at `now`.
    ///
    /// Records the dispatch when the answer is [`DispatchDecision::Dispatch`].
    pub fn check(&mut self, text: &str, now: Instant) -> DispatchDecision {
        if let Some(last) = self.last_dispatch {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.min_interval {
                trace!(
                    "Throttled: {:?} since last dispatch (min {:?})",
                    elapsed,
                    self.min_interval
                );
                return DispatchDecision::Throttled;
            }
        }

        let hash = content_hash(text);
        if self.skip_unchanged && self.last_hash == Some(hash) {
            trace!("Captured text unchanged since last dispatch");
            return DispatchDecision::Unchanged;
        }

        self.last_dispatch = Some(now);
        self.last_hash = Some(hash);
        DispatchDecision::Dispatch
    }

    /// Earliest instant the next dispatch can pass the throttle
    pub fn next_allowed(&self) -> Option<Instant> {
        self.last_dispatch.map(|last| last + self.min_interval)
    }

    /// Forget the previous dispatch
    pub fn reset(&mut self) {
        self.last_dispatch = None;
        self.last_hash = None;
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(Duration::ZERO, false)
    }
}

/// SHA-256 of the text
fn content_hash(text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

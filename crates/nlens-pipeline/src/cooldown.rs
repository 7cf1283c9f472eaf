//! Request pacing after success and failure.
//!
//! The inference stage never retries a failed request. It closes a
//! `Cooldown` gate instead and the next frame is tried once the gate
//! reopens.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

/// Time gate that keeps a stage from starting until a deadline passes.
#[derive(Debug, Clone, Default)]
pub struct Cooldown {
    resume_at: Option<Instant>,
}

impl Cooldown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether work may start at `now`.
    pub fn is_open(&self, now: Instant) -> bool {
        self.resume_at.map_or(true, |at| now >= at)
    }

    /// Keep the gate closed for `duration` from `now`.
    ///
    /// An existing later deadline is kept.
    pub fn hold_for(&mut self, now: Instant, duration: Duration) {
        let until = now + duration;
        self.resume_at = Some(match self.resume_at {
            Some(at) if at > until => at,
            _ => until,
        });
    }

    /// Time left before the gate opens.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.resume_at
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or_default()
    }
}

/// State tracker for repeated operations that may fail intermittently.
///
/// Suppresses log spam while the detection service stays down.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_logged_failures,
            suppressed: false,
        }
    }

    /// Record a successful operation (resets failure count).
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 && self.suppressed {
            debug!(
                "Operation recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
    }

    /// Record a failed operation.
    ///
    /// Returns `true` if this failure should be logged (not suppressed).
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else if self.consecutive_failures == self.max_logged_failures + 1 {
            self.suppressed = true;
            warn!(
                "Suppressing further failure logs after {} consecutive failures",
                self.max_logged_failures
            );
            false
        } else {
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}

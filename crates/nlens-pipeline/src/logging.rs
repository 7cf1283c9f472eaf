//! Structured stage logging utilities.
//!
//! Every stage logs through a `StageLogger` so records carry the same
//! `session` and `stage` fields regardless of which stage emitted them.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::FailureKind;
use crate::stage::Stage;

/// Stage logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct StageLogger {
    session: String,
    stage: Stage,
}

impl StageLogger {
    /// Create a logger for one stage of a pipeline session.
    pub fn new(session: &str, stage: Stage) -> Self {
        Self {
            session: session.to_string(),
            stage,
        }
    }

    /// Log a stage picking up work after waiting `idle`.
    pub fn log_start(&self, idle: Duration) {
        debug!(
            session = %self.session,
            stage = %self.stage,
            idle_ms = idle.as_secs_f64() * 1000.0,
            "Stage started"
        );
    }

    /// Log a stage finishing one unit of work.
    pub fn log_completion(&self, run: Duration, message: &str) {
        debug!(
            session = %self.session,
            stage = %self.stage,
            run_ms = run.as_secs_f64() * 1000.0,
            "Stage completed: {}", message
        );
    }

    /// Log a notable event, such as a new annotation.
    pub fn log_event(&self, message: &str) {
        info!(
            session = %self.session,
            stage = %self.stage,
            "{}", message
        );
    }

    /// Log a recoverable failure.
    pub fn log_failure(&self, kind: FailureKind, message: &str) {
        warn!(
            session = %self.session,
            stage = %self.stage,
            kind = %kind,
            "Stage failure: {}", message
        );
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }
}

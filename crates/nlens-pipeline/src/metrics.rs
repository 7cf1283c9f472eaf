//! Pipeline metrics collection.
//!
//! Provides standardized metrics for monitoring the recognition loop:
//! - Per-stage idle and run time histograms
//! - Failure counters by kind
//! - Annotation outcome counters

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{FailureKind, PipelineError, PipelineResult};
use crate::stage::{Stage, StageTiming};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Time a stage spent waiting before it started work, by stage.
    pub const STAGE_IDLE_SECONDS: &str = "nlens_stage_idle_seconds";

    /// Time a stage spent on one unit of work, by stage.
    pub const STAGE_RUN_SECONDS: &str = "nlens_stage_run_seconds";

    /// Recoverable failures by kind.
    pub const FAILURES_TOTAL: &str = "nlens_failures_total";

    /// Placement outcomes (created, merged, duplicate, evicted).
    pub const ANNOTATIONS_TOTAL: &str = "nlens_annotations_total";
}

/// Annotation outcome labels.
pub mod outcome {
    pub const CREATED: &str = "created";
    pub const MERGED: &str = "merged";
    pub const DUPLICATE: &str = "duplicate";
    pub const EVICTED: &str = "evicted";
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> PipelineResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| PipelineError::config_error(format!("metrics exporter: {}", e)))
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record idle and run time for one completed stage cycle.
pub fn record_stage_timing(stage: Stage, timing: &StageTiming) {
    histogram!(
        names::STAGE_IDLE_SECONDS,
        "stage" => stage.as_str()
    )
    .record(timing.idle.as_secs_f64());

    histogram!(
        names::STAGE_RUN_SECONDS,
        "stage" => stage.as_str()
    )
    .record(timing.run.as_secs_f64());
}

/// Record a recoverable failure.
pub fn record_failure(kind: FailureKind) {
    counter!(
        names::FAILURES_TOTAL,
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a placement outcome.
pub fn record_annotation(outcome: &'static str) {
    counter!(
        names::ANNOTATIONS_TOTAL,
        "outcome" => outcome
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================

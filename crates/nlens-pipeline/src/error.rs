//! Pipeline error types.

use std::fmt;

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Handoff slot '{0}' is already occupied")]
    SlotOccupied(&'static str),

    #[error("Catalog error: {0}")]
    Catalog(#[from] nlens_models::ModelError),

    #[error("Detection service error: {0}")]
    Detection(#[from] nlens_ml_client::MlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn capture_failed(msg: impl Into<String>) -> Self {
        Self::CaptureFailed(msg.into())
    }
}

/// Failure classes each stage recovers from on its own.
///
/// None of these stop the pipeline; they only show up in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Capture device did not deliver a frame; retried next tick.
    TransientCapture,
    /// Detection request or response parsing failed; triggers the cooldown.
    NetworkOrParse,
    /// A detection corner did not hit the environment surface.
    GeometryMiss,
    /// The catalog has no record for the detected class.
    UnknownClassId,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TransientCapture => "transient_capture",
            FailureKind::NetworkOrParse => "network_or_parse",
            FailureKind::GeometryMiss => "geometry_miss",
            FailureKind::UnknownClassId => "unknown_class_id",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

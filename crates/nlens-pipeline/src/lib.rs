//! Recognition pipeline.
//!
//! This crate provides:
//! - Frame producer, encoder, inference and placement stages
//! - Capacity-one handoff slots between the stages
//! - A single-task scheduler with pause and shutdown control
//! - Reprojection of detections onto the environment surface
//! - Tracking that keeps one annotation per physical object

pub mod capture;
pub mod config;
pub mod cooldown;
pub mod encoder;
pub mod environment;
pub mod error;
pub mod handoff;
pub mod inference;
pub mod logging;
pub mod metrics;
pub mod placer;
pub mod producer;
pub mod render;
pub mod scheduler;
pub mod stage;

#[cfg(test)]
mod testing;

pub use capture::{CaptureSource, StillImageSource};
pub use config::PipelineConfig;
pub use environment::{EnvironmentSurface, PlaneSurface};
pub use error::{FailureKind, PipelineError, PipelineResult};
pub use handoff::HandoffSlot;
pub use logging::StageLogger;
pub use placer::{AnnotationPlacer, PlacementSummary, PlacerConfig};
pub use render::{AnnotationRenderer, IndicatorState, LabelVisual, MarkerVisual, TracingRenderer};
pub use scheduler::{BoundaryStatus, PipelineHandle, PipelineParts, PipelineScheduler, TickReport};
pub use stage::{Stage, StageTiming};

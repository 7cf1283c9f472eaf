//! Shared data models for the NutriLens recognition pipeline.
//!
//! This crate provides the types that flow between pipeline stages:
//! - Captured frames and camera poses
//! - Detections and detection sets returned by the inference service
//! - World-anchored tracked annotations
//! - The static product catalog with nutrition grades

pub mod annotation;
pub mod catalog;
pub mod detection;
pub mod error;
pub mod frame;
pub mod geometry;

// Re-export common types
pub use annotation::{AnnotationId, TrackedAnnotation};
pub use catalog::{Nutrient, Nutrients, NutriGrade, ProductCatalog, ProductRecord, Rgba, StaticCatalog};
pub use detection::{Detection, DetectionSet, NormalizedBox};
pub use error::{ModelError, ModelResult};
pub use frame::Frame;
pub use geometry::{CameraPose, Viewpoint};

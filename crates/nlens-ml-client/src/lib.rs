//! Client for the remote object-detection service.
//!
//! This crate provides the JSON wire types for the prediction endpoint
//! (`{"inputs":[{"b64": ...}]}` in, `{"outputs": {...}}` out), a reqwest
//! client that sends one request at a time, and the `DetectionService`
//! trait the pipeline is written against.

pub mod client;
pub mod error;
pub mod types;

pub use client::{DetectionClient, DetectionClientConfig, DetectionService};
pub use error::{MlError, MlResult};
pub use types::{DetectionRequest, DetectionResponse, ImageInput, Outputs};

//! Frame sources.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use nalgebra::Matrix4;

use nlens_models::{Frame, Viewpoint};

use crate::error::{PipelineError, PipelineResult};

/// A camera that delivers one frame per call.
///
/// A capture may take longer than a scheduler tick; the producer polls it
/// without blocking. Errors are transient and the producer simply asks
/// again on a later tick.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    async fn capture_frame(&self, width: u32, height: u32) -> PipelineResult<Frame>;
}

/// Serves the same encoded image on every capture.
///
/// Stands in for a device camera when running on a workstation.
#[derive(Debug, Clone)]
pub struct StillImageSource {
    image: Arc<Vec<u8>>,
    camera_to_world: Option<Matrix4<f64>>,
    projection: Option<Matrix4<f64>>,
    viewpoint: Viewpoint,
}

impl StillImageSource {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image: Arc::new(image),
            camera_to_world: None,
            projection: None,
            viewpoint: Viewpoint::default(),
        }
    }

    /// Load the image from disk.
    pub async fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let image = tokio::fs::read(path).await?;
        if image.is_empty() {
            return Err(PipelineError::config_error(format!(
                "image file {} is empty",
                path.display()
            )));
        }
        Ok(Self::new(image))
    }

    /// Attach a fixed camera pose to every frame.
    pub fn with_pose(mut self, camera_to_world: Matrix4<f64>, projection: Matrix4<f64>) -> Self {
        self.camera_to_world = Some(camera_to_world);
        self.projection = Some(projection);
        self
    }
}

#[async_trait]
impl CaptureSource for StillImageSource {
    async fn capture_frame(&self, width: u32, height: u32) -> PipelineResult<Frame> {
        let mut frame =
            Frame::new(self.image.to_vec(), width, height).with_viewpoint(self.viewpoint);
        if let (Some(c2w), Some(proj)) = (self.camera_to_world, self.projection) {
            frame = frame.with_pose(c2w, proj);
        }
        Ok(frame)
    }
}

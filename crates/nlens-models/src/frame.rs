//! Captured camera frames.

use nalgebra::Matrix4;

use crate::geometry::{CameraPose, Viewpoint};

/// One camera exposure.
///
/// The frame owns its image buffer; handing it to the encoder by value
/// releases the buffer once encoding is done.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Compressed image bytes as produced by the capture device (JPEG)
    pub image: Vec<u8>,
    /// Capture resolution width in pixels
    pub width: u32,
    /// Capture resolution height in pixels
    pub height: u32,
    /// Camera-to-world transform, if the device could report one
    pub camera_to_world: Option<Matrix4<f64>>,
    /// Projection matrix, if the device could report one
    pub projection: Option<Matrix4<f64>>,
    /// Head pose of the wearer at capture time
    pub viewpoint: Option<Viewpoint>,
}

impl Frame {
    /// Create a frame without any pose information.
    pub fn new(image: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            image,
            width,
            height,
            camera_to_world: None,
            projection: None,
            viewpoint: None,
        }
    }

    pub fn with_pose(mut self, camera_to_world: Matrix4<f64>, projection: Matrix4<f64>) -> Self {
        self.camera_to_world = Some(camera_to_world);
        self.projection = Some(projection);
        self
    }

    pub fn with_viewpoint(mut self, viewpoint: Viewpoint) -> Self {
        self.viewpoint = Some(viewpoint);
        self
    }

    /// Both matrices are needed for reprojection; either one missing means no pose.
    pub fn pose(&self) -> Option<CameraPose> {
        match (self.camera_to_world, self.projection) {
            (Some(c2w), Some(proj)) => Some(CameraPose::new(c2w, proj)),
            _ => None,
        }
    }

    pub fn has_pose(&self) -> bool {
        self.pose().is_some()
    }
}

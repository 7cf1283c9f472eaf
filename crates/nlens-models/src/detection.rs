//! Detection results returned by the inference service.

use serde::{Deserialize, Serialize};

use crate::geometry::{CameraPose, Viewpoint};

/// A box in normalized image coordinates (0.0 to 1.0), origin top-left.
///
/// Wire order is `[top, left, bottom, right]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

impl NormalizedBox {
    pub fn new(top: f64, left: f64, bottom: f64, right: f64) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Build from the `[top, left, bottom, right]` wire layout.
    pub fn from_tlbr(tlbr: [f64; 4]) -> Self {
        Self::new(tlbr[0], tlbr[1], tlbr[2], tlbr[3])
    }

    /// Top-left corner as an image point `(x, y)`; the label anchor.
    pub fn left_top(&self) -> (f64, f64) {
        (self.left, self.top)
    }

    /// Bottom-right corner as an image point `(x, y)`; the marker anchor.
    pub fn right_bottom(&self) -> (f64, f64) {
        (self.right, self.bottom)
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

/// A single scored prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub score: f64,
    pub class_id: u32,
    pub bbox: NormalizedBox,
}

impl Detection {
    pub fn new(score: f64, class_id: u32, bbox: NormalizedBox) -> Self {
        Self {
            score,
            class_id,
            bbox,
        }
    }
}

/// All predictions from one inference response.
///
/// Detections keep the service's order, which is expected to be sorted by
/// descending score. Nothing here re-sorts them.
#[derive(Debug, Clone, Default)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
    /// Pose of the frame the detections came from
    pub pose: Option<CameraPose>,
    /// Wearer viewpoint at capture time, for fallback placement
    pub viewpoint: Option<Viewpoint>,
}

impl DetectionSet {
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn has_pose(&self) -> bool {
        self.pose.is_some()
    }
}

//! Camera pose and wearer viewpoint.

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Camera extrinsics and intrinsics at the moment a frame was exposed.
///
/// Matrices use row/column indexing as `m[(row, col)]`, so the row-major
/// `projection[0][2]` is `projection[(0, 2)]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    /// Camera space to world space transform
    pub camera_to_world: Matrix4<f64>,
    /// Projection matrix of the capture camera
    pub projection: Matrix4<f64>,
}

impl CameraPose {
    pub fn new(camera_to_world: Matrix4<f64>, projection: Matrix4<f64>) -> Self {
        Self {
            camera_to_world,
            projection,
        }
    }

    /// World-space position of the camera-space origin.
    pub fn origin(&self) -> Point3<f64> {
        let o = self.camera_to_world * Vector4::new(0.0, 0.0, 0.0, 1.0);
        Point3::new(o.x, o.y, o.z)
    }

    /// Rotate a camera-space direction into world space (translation ignored).
    pub fn direction_to_world(&self, direction: &Vector3<f64>) -> Vector3<f64> {
        let d = self.camera_to_world * direction.push(0.0);
        Vector3::new(d.x, d.y, d.z)
    }
}

/// Position and orientation of the wearer's head when a frame was captured.
///
/// Used by the fallback placement path when the camera pose is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewpoint {
    pub position: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Viewpoint {
    pub fn new(position: Point3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Map a point expressed in the viewpoint's local frame into world space.
    pub fn local_to_world(&self, local: &Vector3<f64>) -> Point3<f64> {
        self.position + self.orientation * local
    }
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self::new(Point3::origin(), UnitQuaternion::identity())
    }
}

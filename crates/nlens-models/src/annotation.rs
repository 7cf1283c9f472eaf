//! World-anchored annotations tracked across frames.

use std::fmt;
use std::time::Instant;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Identifier shared by an annotation's label and marker visuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationId(pub u64);

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "annotation-{}", self.0)
    }
}

/// A recognized object placed in world space.
///
/// The label sits at the box's top-left corner and the marker at its
/// bottom-right corner, so together they span the object on the world X/Y
/// plane.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedAnnotation {
    pub id: AnnotationId,
    pub class_id: u32,
    pub label_position: Point3<f64>,
    pub marker_position: Point3<f64>,
    pub marker_scale: Vector3<f64>,
    pub last_update: Instant,
}

impl TrackedAnnotation {
    /// Horizontal extent as `(left, right)`.
    pub fn x_span(&self) -> (f64, f64) {
        (self.label_position.x, self.marker_position.x)
    }

    /// Vertical extent as `(bottom, top)`.
    pub fn y_span(&self) -> (f64, f64) {
        (self.marker_position.y, self.label_position.y)
    }

    /// Whether a world X/Y point lies inside the label-to-marker rectangle.
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        let (left, right) = self.x_span();
        let (bottom, top) = self.y_span();
        x >= left && x <= right && y >= bottom && y <= top
    }
}

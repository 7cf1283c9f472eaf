//! World geometry the annotations are anchored to.

use nalgebra::{Point3, Unit, Vector3};

/// Something a ray can hit, typically the spatial mesh of the room.
pub trait EnvironmentSurface: Send + Sync {
    /// First intersection of the ray within `max_distance` of `origin`.
    fn raycast(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
    ) -> Option<Point3<f64>>;
}

/// An infinite plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSurface {
    point: Point3<f64>,
    normal: Unit<Vector3<f64>>,
}

impl PlaneSurface {
    pub fn new(point: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            point,
            normal: Unit::new_normalize(normal),
        }
    }

    /// The plane `z = distance`, facing back toward the origin.
    pub fn facing_origin(distance: f64) -> Self {
        Self::new(Point3::new(0.0, 0.0, distance), -Vector3::z())
    }
}

impl EnvironmentSurface for PlaneSurface {
    fn raycast(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
    ) -> Option<Point3<f64>> {
        let dir = direction.try_normalize(f64::EPSILON)?;
        let denom = self.normal.dot(&dir);
        if denom.abs() < 1e-9 {
            return None;
        }

        let t = self.normal.dot(&(self.point - origin)) / denom;
        if t < 0.0 || t > max_distance {
            return None;
        }

        Some(origin + dir * t)
    }
}

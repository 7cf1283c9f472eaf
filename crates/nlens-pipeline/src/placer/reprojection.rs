//! Image-space to world-space reprojection.

use nalgebra::{Matrix4, Point3, Vector2, Vector3};

use nlens_models::{CameraPose, NormalizedBox, Viewpoint};

const EPSILON: f64 = 1e-9;
const LOCAL_SCALE_SIZER: f64 = 0.008;
const BOX_UNIT: f64 = 0.1;

/// A half-line in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

/// Ray from the capture camera through a normalized image point.
///
/// `point` is `(x, y)` in `[0, 1]` with `y` growing downward. Returns
/// `None` when the pose matrices cannot be inverted along the way
/// (`camera_to_world[(2, 2)]` or a focal term of zero).
pub fn camera_ray(pose: &CameraPose, point: (f64, f64)) -> Option<Ray> {
    let (x, y) = point;
    let proj = Vector3::new(x * 2.0 - 1.0, 1.0 - y * 2.0, 1.0);

    let m22 = pose.camera_to_world[(2, 2)];
    let p = &pose.projection;
    if m22.abs() < EPSILON || p[(0, 0)].abs() < EPSILON || p[(1, 1)].abs() < EPSILON {
        return None;
    }

    let w = proj.z / m22;
    let unprojected = Vector3::new(
        (proj.x - w * p[(0, 2)]) / p[(0, 0)],
        (proj.y - w * p[(1, 2)]) / p[(1, 1)],
        w,
    );

    Some(Ray {
        origin: pose.origin(),
        direction: pose.direction_to_world(&unprojected),
    })
}

/// Projection matrix with the focal terms of a symmetric frustum.
pub fn projection_from_fov(horizontal_fov_deg: f64, aspect: f64) -> Matrix4<f64> {
    let fx = 1.0 / (horizontal_fov_deg.to_radians() / 2.0).tan();
    let mut projection = Matrix4::identity();
    projection[(0, 0)] = fx;
    projection[(1, 1)] = fx * aspect;
    projection
}

/// The virtual quad floating ahead of the wearer that boxes are mapped
/// onto when the frame has no camera pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackOverlay {
    /// Quad centre in the viewpoint's local frame
    pub offset: Vector3<f64>,
    /// Quad width and height
    pub size: Vector2<f64>,
}

impl Default for FallbackOverlay {
    fn default() -> Self {
        Self {
            offset: Vector3::new(0.11, -0.08, 3.0),
            size: Vector2::new(2.5, 1.4),
        }
    }
}

impl FallbackOverlay {
    /// World position of a normalized image point on the quad.
    pub fn point_on_overlay(&self, viewpoint: &Viewpoint, point: (f64, f64)) -> Point3<f64> {
        let (x, y) = point;
        let local = self.offset
            + Vector3::new((x - 0.5) * self.size.x, (0.5 - y) * self.size.y, 0.0);
        viewpoint.local_to_world(&local)
    }

    /// Ray from the viewpoint through the overlay point.
    pub fn ray(&self, viewpoint: &Viewpoint, point: (f64, f64)) -> Ray {
        let target = self.point_on_overlay(viewpoint, point);
        Ray {
            origin: viewpoint.position,
            direction: target - viewpoint.position,
        }
    }

    /// Marker scale for a detection box, relative to the quad.
    pub fn marker_scale(&self, bbox: &NormalizedBox) -> Vector3<f64> {
        let ws = bbox.width() / BOX_UNIT;
        let hs = bbox.height() / BOX_UNIT;
        let n = self.size.normalize();

        Vector3::new(
            ws * LOCAL_SCALE_SIZER * (n.x + ws * 0.01),
            hs * LOCAL_SCALE_SIZER * (n.y - hs * 0.01),
            LOCAL_SCALE_SIZER,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{EnvironmentSurface, PlaneSurface};
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn identity_pose() -> CameraPose {
        CameraPose::new(Matrix4::identity(), projection_from_fov(60.0, 16.0 / 9.0))
    }

    #[test]
    fn test_center_maps_to_forward_axis() {
        let ray = camera_ray(&identity_pose(), (0.5, 0.5)).unwrap();

        assert_relative_eq!(ray.origin, Point3::origin());
        assert_relative_eq!(ray.direction, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_center_hits_plane_at_distance() {
        let d = 2.5;
        let plane = PlaneSurface::facing_origin(d);
        let ray = camera_ray(&identity_pose(), (0.5, 0.5)).unwrap();

        let hit = plane.raycast(&ray.origin, &ray.direction, 30.0).unwrap();
        assert_relative_eq!(hit, Point3::new(0.0, 0.0, d), epsilon = 1e-9);
    }

    #[test]
    fn test_corner_uses_focal_terms() {
        let mut projection = Matrix4::identity();
        projection[(0, 0)] = 2.0;
        projection[(1, 1)] = 4.0;
        let pose = CameraPose::new(Matrix4::identity(), projection);

        // top-left corner: proj = (-1, 1, 1)
        let ray = camera_ray(&pose, (0.0, 0.0)).unwrap();
        assert_relative_eq!(ray.direction, Vector3::new(-0.5, 0.25, 1.0), epsilon = 1e-12);

        let hit = PlaneSurface::facing_origin(1.0)
            .raycast(&ray.origin, &ray.direction, 30.0)
            .unwrap();
        assert_relative_eq!(hit, Point3::new(-0.5, 0.25, 1.0), epsilon = 1e-9);
    }

    #[test]
    fn test_principal_point_offset() {
        let mut projection = Matrix4::identity();
        projection[(0, 2)] = 0.1;
        projection[(1, 2)] = -0.2;
        let pose = CameraPose::new(Matrix4::identity(), projection);

        let ray = camera_ray(&pose, (0.5, 0.5)).unwrap();
        assert_relative_eq!(ray.direction, Vector3::new(-0.1, 0.2, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_translated_camera_origin() {
        let c2w = Translation3::new(1.0, 2.0, 3.0).to_homogeneous();
        let pose = CameraPose::new(c2w, Matrix4::identity());

        let ray = camera_ray(&pose, (0.5, 0.5)).unwrap();
        assert_relative_eq!(ray.origin, Point3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(ray.direction, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_pose_has_no_ray() {
        let mut c2w = Matrix4::identity();
        c2w[(2, 2)] = 0.0;
        let pose = CameraPose::new(c2w, Matrix4::identity());
        assert!(camera_ray(&pose, (0.5, 0.5)).is_none());
    }

    #[test]
    fn test_fallback_ray_through_overlay() {
        let overlay = FallbackOverlay::default();
        let viewpoint = Viewpoint::default();

        let center = overlay.point_on_overlay(&viewpoint, (0.5, 0.5));
        assert_relative_eq!(center, Point3::new(0.11, -0.08, 3.0), epsilon = 1e-12);

        let ray = overlay.ray(&viewpoint, (0.0, 0.0));
        assert_relative_eq!(ray.origin, Point3::origin());
        assert_relative_eq!(
            ray.direction,
            Vector3::new(0.11 - 1.25, -0.08 + 0.7, 3.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_fallback_follows_viewpoint_orientation() {
        let overlay = FallbackOverlay::default();
        let viewpoint = Viewpoint::new(
            Point3::new(0.0, 1.6, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2),
        );

        let center = overlay.point_on_overlay(&viewpoint, (0.5, 0.5));
        // +90 degrees about Y turns local +Z into world +X
        assert_relative_eq!(center, Point3::new(3.0, 1.52, -0.11), epsilon = 1e-9);
    }

    #[test]
    fn test_marker_scale() {
        let overlay = FallbackOverlay::default();
        let bbox = NormalizedBox::new(0.1, 0.1, 0.2, 0.2);
        let n = Vector2::new(2.5, 1.4).normalize();

        let scale = overlay.marker_scale(&bbox);
        assert_relative_eq!(scale.x, 0.008 * (n.x + 0.01), epsilon = 1e-12);
        assert_relative_eq!(scale.y, 0.008 * (n.y - 0.01), epsilon = 1e-12);
        assert_relative_eq!(scale.z, 0.008);
    }
}

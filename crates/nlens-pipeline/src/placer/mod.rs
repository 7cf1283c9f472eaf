//! Annotation placer stage.
//!
//! Turns a detection set into world-anchored annotations:
//! 1. Evict stale annotations when a TTL is configured.
//! 2. Walk detections in service order, stopping at the first one whose
//!    score does not exceed the probability threshold.
//! 3. Resolve the label (top-left) and marker (bottom-right) corners in
//!    world space, by camera reprojection when the set has a pose and by
//!    the fallback overlay otherwise.
//! 4. Reconcile the candidate against tracked annotations and tell the
//!    renderer what changed.

pub mod reprojection;
pub mod tracking;

use std::sync::Arc;
use std::time::Duration;

use nalgebra::Point3;
use tokio::time::Instant;
use tracing::debug;

use nlens_models::{
    CameraPose, DetectionSet, ProductCatalog, ProductRecord, TrackedAnnotation, Viewpoint,
};

use crate::environment::EnvironmentSurface;
use crate::error::FailureKind;
use crate::metrics::{self, outcome};
use crate::render::{AnnotationRenderer, IndicatorState, LabelVisual, MarkerVisual};
use crate::stage::{Stage, StageState, StageTiming};

pub use reprojection::{camera_ray, projection_from_fov, FallbackOverlay, Ray};
pub use tracking::{
    classify_overlap, AnnotationRegistry, Candidate, OverlapDecision, ReconcileOutcome,
};

/// Placement settings.
#[derive(Debug, Clone)]
pub struct PlacerConfig {
    pub probability_threshold: f64,
    pub max_ray_distance: f64,
    pub annotation_ttl: Option<Duration>,
    pub overlay: FallbackOverlay,
}

impl Default for PlacerConfig {
    fn default() -> Self {
        Self {
            probability_threshold: 0.8,
            max_ray_distance: 30.0,
            annotation_ttl: None,
            overlay: FallbackOverlay::default(),
        }
    }
}

/// Counts for one placement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementSummary {
    /// Detections above the threshold that were looked at
    pub considered: usize,
    pub created: usize,
    pub merged: usize,
    pub duplicates: usize,
    pub geometry_misses: usize,
    pub unknown_classes: usize,
    pub evicted: usize,
}

pub struct AnnotationPlacer {
    config: PlacerConfig,
    catalog: Arc<dyn ProductCatalog>,
    surface: Arc<dyn EnvironmentSurface>,
    renderer: Box<dyn AnnotationRenderer>,
    registry: AnnotationRegistry,
    cached_viewpoint: Viewpoint,
    state: StageState,
}

impl AnnotationPlacer {
    pub fn new(
        session: &str,
        config: PlacerConfig,
        catalog: Arc<dyn ProductCatalog>,
        surface: Arc<dyn EnvironmentSurface>,
        mut renderer: Box<dyn AnnotationRenderer>,
        now: Instant,
    ) -> Self {
        renderer.show_indicator(IndicatorState::Loading);
        Self {
            config,
            catalog,
            surface,
            renderer,
            registry: AnnotationRegistry::new(),
            cached_viewpoint: Viewpoint::default(),
            state: StageState::new(session, Stage::Place, now),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.wants_more()
    }

    pub fn registry(&self) -> &AnnotationRegistry {
        &self.registry
    }

    pub fn passes(&self) -> u64 {
        self.state.completed()
    }

    pub fn last_timing(&self) -> Option<StageTiming> {
        self.state.last_timing()
    }

    pub fn show_indicator(&mut self, state: IndicatorState) {
        self.renderer.show_indicator(state);
    }

    /// Run one placement pass over a detection set.
    pub fn place(&mut self, set: DetectionSet, now: Instant) -> PlacementSummary {
        self.state.begin(now);
        let wall_now = now.into_std();
        let mut summary = PlacementSummary::default();

        if let Some(viewpoint) = set.viewpoint {
            self.cached_viewpoint = viewpoint;
        }

        if let Some(ttl) = self.config.annotation_ttl {
            for id in self.registry.evict_stale(wall_now, ttl) {
                self.renderer.remove(id);
                metrics::record_annotation(outcome::EVICTED);
                summary.evicted += 1;
            }
        }

        for detection in &set.detections {
            // detections arrive sorted by score, so the first low one ends the pass
            if detection.score <= self.config.probability_threshold {
                break;
            }
            summary.considered += 1;

            let Some(product) = self.catalog.lookup(detection.class_id) else {
                metrics::record_failure(FailureKind::UnknownClassId);
                self.state.logger().log_failure(
                    FailureKind::UnknownClassId,
                    &format!("no catalog record for class {}", detection.class_id),
                );
                summary.unknown_classes += 1;
                continue;
            };

            let label = self.resolve_anchor(set.pose.as_ref(), detection.bbox.left_top());
            let marker = self.resolve_anchor(set.pose.as_ref(), detection.bbox.right_bottom());
            let (Some(label_position), Some(marker_position)) = (label, marker) else {
                metrics::record_failure(FailureKind::GeometryMiss);
                debug!(
                    class_id = detection.class_id,
                    "Detection corner missed the environment surface"
                );
                summary.geometry_misses += 1;
                continue;
            };

            let label_visual = LabelVisual::for_product(product);
            let marker_scale = self.config.overlay.marker_scale(&detection.bbox);
            let marker_visual = MarkerVisual::for_product(product, marker_scale);
            let candidate = Candidate {
                class_id: detection.class_id,
                label_position,
                marker_position,
                marker_scale,
            };

            match self.registry.reconcile(candidate, wall_now) {
                ReconcileOutcome::Created(id) => {
                    self.renderer.place_label(id, label_position, &label_visual);
                    self.renderer.place_marker(id, marker_position, &marker_visual);
                    self.state.logger().log_event(&format!(
                        "{} placed for '{}' (grade {})",
                        id, product.name, product.grade
                    ));
                    metrics::record_annotation(outcome::CREATED);
                    summary.created += 1;
                }
                ReconcileOutcome::Merged(id) => {
                    if let Some(tracked) = self.registry.get(id) {
                        self.renderer
                            .update_label(id, tracked.label_position, label_visual.scale);
                        self.renderer
                            .update_marker(id, tracked.marker_position, tracked.marker_scale);
                    }
                    metrics::record_annotation(outcome::MERGED);
                    summary.merged += 1;
                }
                ReconcileOutcome::Duplicate(_) => {
                    metrics::record_annotation(outcome::DUPLICATE);
                    summary.duplicates += 1;
                }
            }
        }

        self.renderer.show_indicator(IndicatorState::Ready);
        self.state.end(
            Instant::now(),
            &format!(
                "{} considered, {} created, {} merged",
                summary.considered, summary.created, summary.merged
            ),
        );
        summary
    }

    /// World position of a normalized image point, or `None` on a raycast miss.
    fn resolve_anchor(&self, pose: Option<&CameraPose>, point: (f64, f64)) -> Option<Point3<f64>> {
        let ray = match pose {
            Some(pose) => camera_ray(pose, point)?,
            None => self.config.overlay.ray(&self.cached_viewpoint, point),
        };
        self.surface
            .raycast(&ray.origin, &ray.direction, self.config.max_ray_distance)
    }

    /// The annotation under a world X/Y point and its product.
    pub fn inspect(&self, x: f64, y: f64) -> Option<(&TrackedAnnotation, &ProductRecord)> {
        let annotation = self.registry.hit_test(x, y)?;
        let product = self.catalog.lookup(annotation.class_id)?;
        Some((annotation, product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::PlaneSurface;
    use crate::testing::{RecordingRenderer, SceneEvent};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Vector3};
    use nlens_models::{AnnotationId, Detection, NormalizedBox, Rgba, StaticCatalog};

    /// Surface that never reports a hit.
    struct Void;

    impl EnvironmentSurface for Void {
        fn raycast(&self, _: &Point3<f64>, _: &Vector3<f64>, _: f64) -> Option<Point3<f64>> {
            None
        }
    }

    fn placer_with(
        config: PlacerConfig,
        surface: Arc<dyn EnvironmentSurface>,
    ) -> (AnnotationPlacer, RecordingRenderer) {
        let renderer = RecordingRenderer::default();
        let catalog = Arc::new(StaticCatalog::builtin().unwrap());
        let placer = AnnotationPlacer::new(
            "test",
            config,
            catalog,
            surface,
            Box::new(renderer.clone()),
            Instant::now(),
        );
        (placer, renderer)
    }

    fn posed_set(detections: Vec<Detection>) -> DetectionSet {
        DetectionSet {
            detections,
            pose: Some(CameraPose::new(Matrix4::identity(), Matrix4::identity())),
            viewpoint: None,
        }
    }

    fn boxed(score: f64, class_id: u32, left: f64) -> Detection {
        Detection::new(score, class_id, NormalizedBox::new(0.1, left, 0.2, left + 0.1))
    }

    #[tokio::test]
    async fn test_places_label_and_marker_on_plane() {
        let (mut placer, renderer) =
            placer_with(PlacerConfig::default(), Arc::new(PlaneSurface::facing_origin(1.0)));

        let summary = placer.place(
            posed_set(vec![Detection::new(
                0.99,
                16,
                NormalizedBox::new(0.1, 0.1, 0.2, 0.2),
            )]),
            Instant::now(),
        );
        assert_eq!(summary.created, 1);

        let events = renderer.events();
        assert_eq!(events[0], SceneEvent::Indicator(IndicatorState::Loading));
        let SceneEvent::Label(id, label_at, ref text) = events[1] else {
            panic!("expected label, got {:?}", events[1]);
        };
        assert_eq!(text, "A");
        // identity projection: x = 2 * 0.1 - 1, y = 1 - 2 * 0.1
        assert_relative_eq!(label_at, Point3::new(-0.8, 0.8, 1.0), epsilon = 1e-9);

        let SceneEvent::Marker(marker_id, marker_at, color) = events[2] else {
            panic!("expected marker, got {:?}", events[2]);
        };
        assert_eq!(marker_id, id);
        assert_relative_eq!(marker_at, Point3::new(-0.6, 0.6, 1.0), epsilon = 1e-9);
        assert_eq!(color, Rgba::from_rgb8(3, 129, 65, 0.8));
        assert_eq!(events[3], SceneEvent::Indicator(IndicatorState::Ready));
    }

    #[tokio::test]
    async fn test_stops_at_first_low_score() {
        let (mut placer, _renderer) =
            placer_with(PlacerConfig::default(), Arc::new(PlaneSurface::facing_origin(1.0)));

        // scores are not monotonic; the 0.99 after the 0.5 must be ignored
        let set = posed_set(vec![
            boxed(0.95, 16, 0.0),
            boxed(0.9, 1, 0.3),
            boxed(0.5, 2, 0.6),
            boxed(0.99, 3, 0.85),
        ]);
        let summary = placer.place(set, Instant::now());

        assert_eq!(summary.considered, 2);
        assert_eq!(summary.created, 2);
        let classes: Vec<u32> = placer.registry().iter().map(|a| a.class_id).collect();
        assert_eq!(classes, vec![16, 1]);
    }

    #[tokio::test]
    async fn test_score_equal_to_threshold_stops() {
        let (mut placer, _renderer) =
            placer_with(PlacerConfig::default(), Arc::new(PlaneSurface::facing_origin(1.0)));

        let summary = placer.place(posed_set(vec![boxed(0.8, 16, 0.0)]), Instant::now());
        assert_eq!(summary.considered, 0);
        assert!(placer.registry().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_class_is_skipped() {
        let (mut placer, _renderer) =
            placer_with(PlacerConfig::default(), Arc::new(PlaneSurface::facing_origin(1.0)));

        let set = posed_set(vec![boxed(0.99, 999, 0.0), boxed(0.95, 16, 0.5)]);
        let summary = placer.place(set, Instant::now());

        assert_eq!(summary.unknown_classes, 1);
        assert_eq!(summary.created, 1);
    }

    #[tokio::test]
    async fn test_geometry_miss_discards_detection() {
        let (mut placer, renderer) = placer_with(PlacerConfig::default(), Arc::new(Void));

        let summary = placer.place(posed_set(vec![boxed(0.99, 16, 0.0)]), Instant::now());

        assert_eq!(summary.geometry_misses, 1);
        assert!(placer.registry().is_empty());
        assert!(!renderer
            .events()
            .iter()
            .any(|e| matches!(e, SceneEvent::Label(..) | SceneEvent::Marker(..))));
    }

    #[tokio::test]
    async fn test_same_object_twice_is_merged() {
        let (mut placer, renderer) =
            placer_with(PlacerConfig::default(), Arc::new(PlaneSurface::facing_origin(1.0)));

        placer.place(posed_set(vec![boxed(0.99, 16, 0.1)]), Instant::now());
        let summary = placer.place(posed_set(vec![boxed(0.99, 16, 0.1)]), Instant::now());

        assert_eq!(summary.merged, 1);
        assert_eq!(placer.registry().len(), 1);
        let events = renderer.events();
        assert!(events.contains(&SceneEvent::UpdateLabel(AnnotationId(0))));
        assert!(events.contains(&SceneEvent::UpdateMarker(AnnotationId(0))));
    }

    #[tokio::test]
    async fn test_fallback_uses_viewpoint_without_pose() {
        let (mut placer, _renderer) =
            placer_with(PlacerConfig::default(), Arc::new(PlaneSurface::facing_origin(3.0)));

        let set = DetectionSet {
            detections: vec![Detection::new(0.99, 16, NormalizedBox::new(0.5, 0.5, 0.6, 0.6))],
            pose: None,
            viewpoint: Some(Viewpoint::default()),
        };
        let summary = placer.place(set, Instant::now());
        assert_eq!(summary.created, 1);

        let tracked = placer.registry().get(AnnotationId(0)).unwrap();
        // the overlay sits on the plane, so the hit is the overlay point itself
        assert_relative_eq!(
            tracked.label_position,
            Point3::new(0.11, -0.08, 3.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            tracked.marker_position,
            Point3::new(0.11 + 0.25, -0.08 - 0.14, 3.0),
            epsilon = 1e-9
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_eviction_removes_visuals() {
        let config = PlacerConfig {
            annotation_ttl: Some(Duration::from_secs(2)),
            ..Default::default()
        };
        let (mut placer, renderer) =
            placer_with(config, Arc::new(PlaneSurface::facing_origin(1.0)));

        placer.place(posed_set(vec![boxed(0.99, 16, 0.1)]), Instant::now());
        tokio::time::advance(Duration::from_secs(3)).await;

        let summary = placer.place(posed_set(Vec::new()), Instant::now());
        assert_eq!(summary.evicted, 1);
        assert!(placer.registry().is_empty());
        assert!(renderer
            .events()
            .contains(&SceneEvent::Remove(AnnotationId(0))));
    }

    #[tokio::test]
    async fn test_inspect_returns_product() {
        let (mut placer, _renderer) =
            placer_with(PlacerConfig::default(), Arc::new(PlaneSurface::facing_origin(1.0)));

        placer.place(
            posed_set(vec![Detection::new(
                0.99,
                16,
                NormalizedBox::new(0.1, 0.1, 0.2, 0.2),
            )]),
            Instant::now(),
        );

        let (annotation, product) = placer.inspect(-0.7, 0.7).unwrap();
        assert_eq!(annotation.id, AnnotationId(0));
        assert_eq!(product.id, 16);
        assert!(placer.inspect(0.5, 0.5).is_none());
    }
}

//! Deduplication of placed annotations across frames.
//!
//! A candidate is compared with every tracked annotation on the world X/Y
//! plane. Enough overlap with an existing annotation means the same
//! physical object was seen again, so the candidate is merged into it (or
//! just dropped) instead of creating a second annotation.

use std::time::{Duration, Instant};

use nalgebra::{Point3, Vector3};

use nlens_models::{AnnotationId, TrackedAnnotation};

/// Above this the candidate refreshes the tracked annotation.
pub const MERGE_THRESHOLD: f64 = 0.5;
/// Above this the candidate is a duplicate and is dropped.
pub const DUPLICATE_THRESHOLD: f64 = 0.1;
/// Weight of the candidate in the merged position and scale.
pub const SMOOTHING_WEIGHT: f64 = 0.2;

/// A detection resolved into world space but not yet tracked.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub class_id: u32,
    pub label_position: Point3<f64>,
    pub marker_position: Point3<f64>,
    pub marker_scale: Vector3<f64>,
}

impl Candidate {
    fn x_span(&self) -> (f64, f64) {
        (self.label_position.x, self.marker_position.x)
    }

    fn y_span(&self) -> (f64, f64) {
        (self.marker_position.y, self.label_position.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapDecision {
    Merge,
    Duplicate,
    Distinct,
}

/// Thresholds are strict: exactly 0.5 is not a merge, exactly 0.1 is distinct.
pub fn classify_overlap(combined: f64) -> OverlapDecision {
    if combined > MERGE_THRESHOLD {
        OverlapDecision::Merge
    } else if combined > DUPLICATE_THRESHOLD {
        OverlapDecision::Duplicate
    } else {
        OverlapDecision::Distinct
    }
}

/// Fraction of the candidate's extent covered by the tracked extent on one axis.
///
/// Full containment counts as 1. Disjoint extents give a negative value.
/// A candidate without positive extent yields `None`.
pub fn axis_overlap(new_lo: f64, new_hi: f64, old_lo: f64, old_hi: f64) -> Option<f64> {
    let extent = new_hi - new_lo;
    if !(extent > 0.0) {
        return None;
    }

    let overlap = if new_lo > old_lo {
        if new_hi < old_hi {
            1.0
        } else {
            (old_hi - new_lo) / extent
        }
    } else if new_hi > old_hi {
        1.0
    } else {
        (new_hi - old_lo) / extent
    };

    Some(overlap)
}

/// Product of the X and Y overlaps, or `None` when the two do not overlap
/// on some axis.
pub fn combined_overlap(candidate: &Candidate, tracked: &TrackedAnnotation) -> Option<f64> {
    let (new_left, new_right) = candidate.x_span();
    let (old_left, old_right) = tracked.x_span();
    let x = axis_overlap(new_left, new_right, old_left, old_right)?;
    if x < 0.0 {
        return None;
    }

    let (new_bottom, new_top) = candidate.y_span();
    let (old_bottom, old_top) = tracked.y_span();
    let y = axis_overlap(new_bottom, new_top, old_bottom, old_top)?;
    if y < 0.0 {
        return None;
    }

    Some(x * y)
}

fn smooth<const D: usize>(
    new: &nalgebra::SVector<f64, D>,
    old: &nalgebra::SVector<f64, D>,
) -> nalgebra::SVector<f64, D> {
    (new * SMOOTHING_WEIGHT + old) / (1.0 + SMOOTHING_WEIGHT)
}

/// What happened to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A new annotation was tracked.
    Created(AnnotationId),
    /// An existing annotation was moved toward the candidate.
    Merged(AnnotationId),
    /// The candidate repeats an existing annotation and was dropped.
    Duplicate(AnnotationId),
}

/// All annotations placed in the current session, in creation order.
#[derive(Debug, Default)]
pub struct AnnotationRegistry {
    annotations: Vec<TrackedAnnotation>,
    next_id: u64,
}

impl AnnotationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedAnnotation> {
        self.annotations.iter()
    }

    pub fn get(&self, id: AnnotationId) -> Option<&TrackedAnnotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    /// Merge, drop or track a candidate.
    ///
    /// Tracked annotations are visited in creation order and the first
    /// one overlapping by more than the duplicate threshold decides. Class
    /// ids are not compared.
    pub fn reconcile(&mut self, candidate: Candidate, now: Instant) -> ReconcileOutcome {
        for tracked in self.annotations.iter_mut() {
            let Some(overlap) = combined_overlap(&candidate, tracked) else {
                continue;
            };

            match classify_overlap(overlap) {
                OverlapDecision::Merge => {
                    tracked.label_position = Point3::from(smooth(
                        &candidate.label_position.coords,
                        &tracked.label_position.coords,
                    ));
                    tracked.marker_position = Point3::from(smooth(
                        &candidate.marker_position.coords,
                        &tracked.marker_position.coords,
                    ));
                    tracked.marker_scale = smooth(&candidate.marker_scale, &tracked.marker_scale);
                    tracked.last_update = now;
                    return ReconcileOutcome::Merged(tracked.id);
                }
                OverlapDecision::Duplicate => return ReconcileOutcome::Duplicate(tracked.id),
                OverlapDecision::Distinct => {}
            }
        }

        let id = AnnotationId(self.next_id);
        self.next_id += 1;
        self.annotations.push(TrackedAnnotation {
            id,
            class_id: candidate.class_id,
            label_position: candidate.label_position,
            marker_position: candidate.marker_position,
            marker_scale: candidate.marker_scale,
            last_update: now,
        });
        ReconcileOutcome::Created(id)
    }

    /// Drop annotations not refreshed within `ttl` and return their ids.
    pub fn evict_stale(&mut self, now: Instant, ttl: Duration) -> Vec<AnnotationId> {
        let mut evicted = Vec::new();
        self.annotations.retain(|a| {
            let fresh = now.saturating_duration_since(a.last_update) <= ttl;
            if !fresh {
                evicted.push(a.id);
            }
            fresh
        });
        evicted
    }

    /// First annotation whose label-to-marker rectangle contains the point.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<&TrackedAnnotation> {
        self.annotations.iter().find(|a| a.contains_xy(x, y))
    }
}

//! Fakes shared by the unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nalgebra::{Matrix4, Point3, Vector3};

use nlens_ml_client::{DetectionRequest, DetectionService, MlError, MlResult};
use nlens_models::{AnnotationId, Detection, Frame, NormalizedBox, Rgba};

use crate::capture::CaptureSource;
use crate::error::PipelineResult;
use crate::render::{AnnotationRenderer, IndicatorState, LabelVisual, MarkerVisual};

#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    Label(AnnotationId, Point3<f64>, String),
    Marker(AnnotationId, Point3<f64>, Rgba),
    UpdateLabel(AnnotationId),
    UpdateMarker(AnnotationId),
    Remove(AnnotationId),
    Indicator(IndicatorState),
}

/// Renderer that keeps every call for later assertions.
#[derive(Clone, Default)]
pub struct RecordingRenderer {
    events: Arc<Mutex<Vec<SceneEvent>>>,
}

impl RecordingRenderer {
    pub fn events(&self) -> Vec<SceneEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn placed_markers(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SceneEvent::Marker(..)))
            .count()
    }

    fn push(&self, event: SceneEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl AnnotationRenderer for RecordingRenderer {
    fn place_label(&mut self, id: AnnotationId, position: Point3<f64>, visual: &LabelVisual) {
        self.push(SceneEvent::Label(id, position, visual.text.clone()));
    }

    fn place_marker(&mut self, id: AnnotationId, position: Point3<f64>, visual: &MarkerVisual) {
        self.push(SceneEvent::Marker(id, position, visual.color));
    }

    fn update_label(&mut self, id: AnnotationId, _position: Point3<f64>, _scale: Vector3<f64>) {
        self.push(SceneEvent::UpdateLabel(id));
    }

    fn update_marker(&mut self, id: AnnotationId, _position: Point3<f64>, _scale: Vector3<f64>) {
        self.push(SceneEvent::UpdateMarker(id));
    }

    fn remove(&mut self, id: AnnotationId) {
        self.push(SceneEvent::Remove(id));
    }

    fn show_indicator(&mut self, state: IndicatorState) {
        self.push(SceneEvent::Indicator(state));
    }
}

/// Camera with an identity pose that takes `delay` per frame.
pub struct PosedSource {
    pub delay: Duration,
}

#[async_trait]
impl CaptureSource for PosedSource {
    async fn capture_frame(&self, width: u32, height: u32) -> PipelineResult<Frame> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Frame::new(vec![0xff, 0xd8], width, height)
            .with_pose(Matrix4::identity(), Matrix4::identity()))
    }
}

/// Detection service answering every request with the same detection.
pub struct FixedService {
    pub delay: Duration,
    /// Calls up to this count fail
    pub fail_first: u32,
    pub calls: AtomicU32,
}

impl FixedService {
    pub fn new(delay: Duration, fail_first: u32) -> Self {
        Self {
            delay,
            fail_first,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionService for FixedService {
    async fn detect(&self, _request: DetectionRequest) -> MlResult<Vec<Detection>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if call < self.fail_first {
            return Err(MlError::MissingOutputs);
        }
        Ok(vec![Detection::new(
            0.99,
            16,
            NormalizedBox::new(0.1, 0.1, 0.2, 0.2),
        )])
    }
}

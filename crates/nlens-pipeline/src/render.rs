//! Scene-side visuals for placed annotations.

use nalgebra::{Point3, Vector3};
use tracing::{debug, info};

use nlens_models::{AnnotationId, ProductRecord, Rgba};

const LABEL_FONT_SIZE: u32 = 28;
const LABEL_SCALE: f64 = 0.005;

/// Status indicator shown to the wearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    /// Waiting for the first inference result.
    Loading,
    /// The last placement pass completed.
    Ready,
    /// The last inference request failed.
    Failure,
}

/// Text label drawn at an annotation's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVisual {
    pub text: String,
    pub color: Rgba,
    pub font_size: u32,
    pub scale: Vector3<f64>,
}

impl LabelVisual {
    /// The product's nutrition grade letter in white.
    pub fn for_product(product: &ProductRecord) -> Self {
        Self {
            text: product.grade.letter().to_string(),
            color: Rgba::WHITE,
            font_size: LABEL_FONT_SIZE,
            scale: Self::default_scale(),
        }
    }

    pub fn default_scale() -> Vector3<f64> {
        Vector3::repeat(LABEL_SCALE)
    }
}

/// Coloured marker drawn at an annotation's bottom-right corner.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerVisual {
    pub color: Rgba,
    pub scale: Vector3<f64>,
    pub product_name: String,
}

impl MarkerVisual {
    pub fn for_product(product: &ProductRecord, scale: Vector3<f64>) -> Self {
        Self {
            color: product.display_color(),
            scale,
            product_name: product.name.clone(),
        }
    }
}

/// Creates, moves and removes annotation visuals in the scene.
///
/// Label and marker of one annotation share its id.
pub trait AnnotationRenderer: Send {
    fn place_label(&mut self, id: AnnotationId, position: Point3<f64>, visual: &LabelVisual);

    fn place_marker(&mut self, id: AnnotationId, position: Point3<f64>, visual: &MarkerVisual);

    fn update_label(&mut self, id: AnnotationId, position: Point3<f64>, scale: Vector3<f64>);

    fn update_marker(&mut self, id: AnnotationId, position: Point3<f64>, scale: Vector3<f64>);

    fn remove(&mut self, id: AnnotationId);

    fn show_indicator(&mut self, state: IndicatorState);
}

/// Renderer that writes every scene change to the log.
#[derive(Debug, Default)]
pub struct TracingRenderer {
    indicator: Option<IndicatorState>,
}

impl TracingRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnnotationRenderer for TracingRenderer {
    fn place_label(&mut self, id: AnnotationId, position: Point3<f64>, visual: &LabelVisual) {
        info!(
            annotation = %id,
            x = position.x,
            y = position.y,
            z = position.z,
            "Label '{}' placed", visual.text
        );
    }

    fn place_marker(&mut self, id: AnnotationId, position: Point3<f64>, visual: &MarkerVisual) {
        info!(
            annotation = %id,
            x = position.x,
            y = position.y,
            z = position.z,
            "Marker for '{}' placed", visual.product_name
        );
    }

    fn update_label(&mut self, id: AnnotationId, position: Point3<f64>, _scale: Vector3<f64>) {
        debug!(annotation = %id, x = position.x, y = position.y, z = position.z, "Label moved");
    }

    fn update_marker(&mut self, id: AnnotationId, position: Point3<f64>, _scale: Vector3<f64>) {
        debug!(annotation = %id, x = position.x, y = position.y, z = position.z, "Marker moved");
    }

    fn remove(&mut self, id: AnnotationId) {
        info!(annotation = %id, "Annotation removed");
    }

    fn show_indicator(&mut self, state: IndicatorState) {
        if self.indicator != Some(state) {
            info!(indicator = ?state, "Indicator changed");
            self.indicator = Some(state);
        }
    }
}

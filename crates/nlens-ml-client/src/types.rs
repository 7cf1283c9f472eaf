//! Detection service request/response types.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use nlens_models::{Detection, NormalizedBox};

use crate::error::{MlError, MlResult};

/// A single base64-encoded image input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInput {
    pub b64: String,
}

/// Request body: `{"inputs":[{"b64":"<base64 image>"}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub inputs: Vec<ImageInput>,
}

impl DetectionRequest {
    /// Encode one compressed image as a batch of size 1.
    pub fn from_image(image: &[u8]) -> Self {
        Self {
            inputs: vec![ImageInput {
                b64: STANDARD.encode(image),
            }],
        }
    }

    /// Total length of the base64 payloads in bytes.
    pub fn payload_len(&self) -> usize {
        self.inputs.iter().map(|i| i.b64.len()).sum()
    }
}

/// Response body. `outputs` is absent when the service reports an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionResponse {
    #[serde(default)]
    pub outputs: Option<Outputs>,
}

impl DetectionResponse {
    /// Parse the first batch entry into detections, keeping the service order.
    pub fn into_detections(self) -> MlResult<Vec<Detection>> {
        self.outputs.ok_or(MlError::MissingOutputs)?.into_detections()
    }
}

/// Batched detection tensors. The batch dimension is always 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Outputs {
    pub detection_scores: Vec<Vec<f64>>,
    pub detection_classes: Vec<Vec<f64>>,
    /// Boxes as `[top, left, bottom, right]`, normalized to `[0, 1]`
    pub detection_boxes: Vec<Vec<[f64; 4]>>,
}

impl Outputs {
    pub fn into_detections(self) -> MlResult<Vec<Detection>> {
        let scores = first_batch(self.detection_scores, "detection_scores")?;
        let classes = first_batch(self.detection_classes, "detection_classes")?;
        let boxes = first_batch(self.detection_boxes, "detection_boxes")?;

        if scores.len() != classes.len() || scores.len() != boxes.len() {
            return Err(MlError::InvalidResponse(format!(
                "tensor lengths differ: {} scores, {} classes, {} boxes",
                scores.len(),
                classes.len(),
                boxes.len()
            )));
        }

        let detections = scores
            .into_iter()
            .zip(classes)
            .zip(boxes)
            .map(|((score, class), tlbr)| {
                Detection::new(score, class_id(class), NormalizedBox::from_tlbr(tlbr))
            })
            .collect();

        Ok(detections)
    }
}

/// Class ids arrive as floats; truncate like an integer cast would.
fn class_id(raw: f64) -> u32 {
    if raw.is_finite() && raw > 0.0 {
        raw.trunc() as u32
    } else {
        0
    }
}

fn first_batch<T>(batches: Vec<Vec<T>>, name: &str) -> MlResult<Vec<T>> {
    batches
        .into_iter()
        .next()
        .ok_or_else(|| MlError::InvalidResponse(format!("{} has an empty batch dimension", name)))
}

/// Model status document returned by `GET <model url>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelStatusResponse {
    #[serde(default)]
    pub model_version_status: Vec<ModelVersionStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersionStatus {
    #[serde(default)]
    pub version: String,
    pub state: String,
}

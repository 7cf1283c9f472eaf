//! Frame encoder stage.

use tokio::time::Instant;

use nlens_ml_client::DetectionRequest;
use nlens_models::{CameraPose, Frame, Viewpoint};

use crate::stage::{Stage, StageState, StageTiming};

/// A detection request together with the pose of the frame it came from.
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    pub request: DetectionRequest,
    pub pose: Option<CameraPose>,
    pub viewpoint: Option<Viewpoint>,
}

impl EncodedRequest {
    pub fn has_pose(&self) -> bool {
        self.pose.is_some()
    }
}

/// Turns a captured frame into a detection request.
#[derive(Debug)]
pub struct FrameEncoder {
    state: StageState,
}

impl FrameEncoder {
    pub fn new(session: &str, now: Instant) -> Self {
        Self {
            state: StageState::new(session, Stage::Encode, now),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.wants_more()
    }

    pub fn last_timing(&self) -> Option<StageTiming> {
        self.state.last_timing()
    }

    /// Encode a frame, releasing its pixel buffer.
    ///
    /// A frame without a complete pose still produces a request; it just
    /// carries no pose.
    pub fn encode(frame: Frame) -> EncodedRequest {
        let pose = frame.pose();
        let viewpoint = frame.viewpoint;
        let request = DetectionRequest::from_image(&frame.image);
        drop(frame);

        EncodedRequest {
            request,
            pose,
            viewpoint,
        }
    }

    pub fn run(&mut self, frame: Frame, now: Instant) -> EncodedRequest {
        self.state.begin(now);
        let encoded = Self::encode(frame);
        self.state.end(
            Instant::now(),
            &format!(
                "{} payload bytes, pose={}",
                encoded.request.payload_len(),
                encoded.has_pose()
            ),
        );
        encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix4;

    #[test]
    fn test_encode_with_pose() {
        let frame = Frame::new(b"jpeg".to_vec(), 4, 4)
            .with_pose(Matrix4::identity(), Matrix4::identity());
        let encoded = FrameEncoder::encode(frame);

        assert!(encoded.has_pose());
        assert_eq!(encoded.request.inputs[0].b64, "anBlZw==");
    }

    #[test]
    fn test_encode_without_pose() {
        let mut frame = Frame::new(b"jpeg".to_vec(), 4, 4);
        frame.camera_to_world = Some(Matrix4::identity());
        let encoded = FrameEncoder::encode(frame);

        assert!(!encoded.has_pose());
    }

    #[tokio::test]
    async fn test_run_returns_to_ready() {
        let mut encoder = FrameEncoder::new("s", Instant::now());
        let _ = encoder.run(Frame::new(vec![0], 1, 1), Instant::now());
        assert!(encoder.is_ready());
    }
}

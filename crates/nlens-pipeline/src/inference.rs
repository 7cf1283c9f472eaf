//! Inference stage.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;

use nlens_ml_client::{DetectionService, MlError, MlResult};
use nlens_models::{CameraPose, Detection, DetectionSet, Viewpoint};

use crate::cooldown::{Cooldown, FailureTracker};
use crate::encoder::EncodedRequest;
use crate::error::FailureKind;
use crate::metrics;
use crate::stage::{InFlight, Stage, StageState, StageTiming};

/// Result of one finished detection request.
#[derive(Debug)]
pub enum InferenceOutcome {
    Detections(DetectionSet),
    Failed(MlError),
}

/// Pacing of detection requests.
#[derive(Debug, Clone, Copy)]
pub struct InferencePacing {
    /// Gate closed after a failed request
    pub failure_cooldown: Duration,
    /// Gate closed after any finished request
    pub min_request_interval: Duration,
}

/// Sends one request at a time to the detection service.
///
/// While a request is in flight the stage keeps the frame's pose and
/// reattaches it to the detections, so every detection set carries the
/// pose of the frame it was computed from.
pub struct InferenceStage {
    service: Arc<dyn DetectionService>,
    pacing: InferencePacing,
    state: StageState,
    in_flight: InFlight<MlResult<Vec<Detection>>>,
    carried: Option<(Option<CameraPose>, Option<Viewpoint>)>,
    gate: Cooldown,
    failures: FailureTracker,
}

impl InferenceStage {
    pub fn new(
        session: &str,
        service: Arc<dyn DetectionService>,
        pacing: InferencePacing,
        now: Instant,
    ) -> Self {
        Self {
            service,
            pacing,
            state: StageState::new(session, Stage::Infer, now),
            in_flight: InFlight::default(),
            carried: None,
            gate: Cooldown::new(),
            failures: FailureTracker::new(3),
        }
    }

    /// Idle and past any cooldown or pacing deadline.
    pub fn is_ready(&self, now: Instant) -> bool {
        self.state.wants_more() && self.gate.is_open(now)
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_running()
    }

    /// Time until the next request may start.
    pub fn cooldown_remaining(&self, now: Instant) -> Duration {
        self.gate.remaining(now)
    }

    pub fn last_timing(&self) -> Option<StageTiming> {
        self.state.last_timing()
    }

    /// Send a request; the payload moves into the in-flight future.
    pub fn start(&mut self, encoded: EncodedRequest, now: Instant) {
        let EncodedRequest {
            request,
            pose,
            viewpoint,
        } = encoded;
        self.carried = Some((pose, viewpoint));

        let service = Arc::clone(&self.service);
        self.in_flight
            .start(async move { service.detect(request).await }.boxed());
        self.state.begin(now);
    }

    /// Check the running request without waiting on it.
    pub async fn poll(&mut self) -> Option<InferenceOutcome> {
        let result = self.in_flight.poll_once().await?;
        let now = Instant::now();
        let (pose, viewpoint) = self.carried.take().unwrap_or((None, None));

        match result {
            Ok(detections) => {
                self.failures.record_success();
                self.gate.hold_for(now, self.pacing.min_request_interval);
                self.state
                    .end(now, &format!("{} detections", detections.len()));

                Some(InferenceOutcome::Detections(DetectionSet {
                    detections,
                    pose,
                    viewpoint,
                }))
            }
            Err(e) => {
                metrics::record_failure(FailureKind::NetworkOrParse);
                self.gate.hold_for(now, self.pacing.failure_cooldown);
                self.gate.hold_for(now, self.pacing.min_request_interval);
                if self.failures.record_failure() {
                    self.state.logger().log_failure(
                        FailureKind::NetworkOrParse,
                        &format!("{} (cooling down for {:?})", e, self.pacing.failure_cooldown),
                    );
                }
                self.state.end(now, "request failed");
                Some(InferenceOutcome::Failed(e))
            }
        }
    }
}

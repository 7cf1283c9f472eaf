//! Frame producer stage.

use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;

use nlens_models::Frame;

use crate::capture::CaptureSource;
use crate::cooldown::FailureTracker;
use crate::error::{FailureKind, PipelineResult};
use crate::metrics;
use crate::stage::{InFlight, Stage, StageState, StageTiming};

/// Drives the capture source, one frame at a time.
pub struct FrameProducer {
    source: Arc<dyn CaptureSource>,
    width: u32,
    height: u32,
    state: StageState,
    in_flight: InFlight<PipelineResult<Frame>>,
    failures: FailureTracker,
}

impl FrameProducer {
    pub fn new(
        session: &str,
        source: Arc<dyn CaptureSource>,
        width: u32,
        height: u32,
        now: Instant,
    ) -> Self {
        Self {
            source,
            width,
            height,
            state: StageState::new(session, Stage::Capture, now),
            in_flight: InFlight::default(),
            failures: FailureTracker::new(3),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state.wants_more()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_running()
    }

    pub fn last_timing(&self) -> Option<StageTiming> {
        self.state.last_timing()
    }

    /// Begin an asynchronous capture.
    pub fn start(&mut self, now: Instant) {
        let source = Arc::clone(&self.source);
        let (width, height) = (self.width, self.height);
        self.in_flight
            .start(async move { source.capture_frame(width, height).await }.boxed());
        self.state.begin(now);
    }

    /// Check the running capture without waiting on it.
    ///
    /// A failed capture leaves the producer ready again; the scheduler
    /// starts a new one on a later tick.
    pub async fn poll(&mut self) -> Option<Frame> {
        let result = self.in_flight.poll_once().await?;
        let now = Instant::now();

        match result {
            Ok(frame) => {
                self.failures.record_success();
                self.state
                    .end(now, &format!("captured {}x{}", frame.width, frame.height));
                Some(frame)
            }
            Err(e) => {
                metrics::record_failure(FailureKind::TransientCapture);
                if self.failures.record_failure() {
                    self.state
                        .logger()
                        .log_failure(FailureKind::TransientCapture, &e.to_string());
                }
                self.state.end(now, "capture failed");
                None
            }
        }
    }
}

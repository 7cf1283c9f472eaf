//! Pipeline scheduler.
//!
//! A single task drives every stage from one tick loop. Stages never block
//! the loop: captures and detection requests run as futures that are
//! polled once per tick, while encoding and placement finish within the
//! tick that starts them.
//!
//! Each tick runs upstream first:
//! 1. start a capture if the producer is idle and the frame slot is vacant,
//!    then poll it
//! 2. poll an in-flight detection request
//! 3. move items across the frame, request and detection slots until
//!    nothing moves
//!
//! After step 3 no slot holds an item its consumer could have taken.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use uuid::Uuid;

use nlens_ml_client::DetectionService;
use nlens_models::{DetectionSet, Frame, ProductCatalog};

use crate::capture::CaptureSource;
use crate::config::PipelineConfig;
use crate::encoder::{EncodedRequest, FrameEncoder};
use crate::environment::EnvironmentSurface;
use crate::error::PipelineResult;
use crate::handoff::HandoffSlot;
use crate::inference::{InferenceOutcome, InferencePacing, InferenceStage};
use crate::placer::{AnnotationPlacer, FallbackOverlay, PlacementSummary, PlacerConfig};
use crate::producer::FrameProducer;
use crate::render::{AnnotationRenderer, IndicatorState};
use crate::stage::{Stage, StageTiming};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

/// External collaborators the pipeline runs against.
pub struct PipelineParts {
    pub source: Arc<dyn CaptureSource>,
    pub service: Arc<dyn DetectionService>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub surface: Arc<dyn EnvironmentSurface>,
    pub renderer: Box<dyn AnnotationRenderer>,
}

/// Remote control for a running scheduler.
///
/// Pausing stops new stage starts; work already in flight still finishes
/// and is handed downstream.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    pause: Arc<watch::Sender<bool>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl PipelineHandle {
    fn new() -> Self {
        let (pause, _) = watch::channel(false);
        let (shutdown, _) = watch::channel(false);
        Self {
            pause: Arc::new(pause),
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn pause(&self) {
        self.pause.send_replace(true);
    }

    pub fn resume(&self) {
        self.pause.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.pause.borrow()
    }

    /// Stop the run loop after in-flight work drains.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

/// Occupancy of one handoff slot at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryStatus {
    pub name: &'static str,
    pub occupied: bool,
    /// The consuming stage is idle and has room downstream
    pub consumer_ready: bool,
}

impl BoundaryStatus {
    /// An item is waiting although its consumer could take it.
    pub fn is_stalled(&self) -> bool {
        self.occupied && self.consumer_ready
    }
}

/// What happened during one tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub at: Instant,
    pub paused: bool,
    pub captured: bool,
    pub encoded: usize,
    pub requests_sent: usize,
    pub inference_failures: usize,
    pub placements: Vec<PlacementSummary>,
    /// Time left before inference may send again
    pub cooldown_remaining: Duration,
    /// Most recent finished cycle of each stage, upstream first
    pub timings: [(Stage, Option<StageTiming>); 4],
}

impl TickReport {
    fn new(tick: u64, at: Instant, paused: bool) -> Self {
        Self {
            tick,
            at,
            paused,
            captured: false,
            encoded: 0,
            requests_sent: 0,
            inference_failures: 0,
            placements: Vec::new(),
            cooldown_remaining: Duration::ZERO,
            timings: [
                (Stage::Capture, None),
                (Stage::Encode, None),
                (Stage::Infer, None),
                (Stage::Place, None),
            ],
        }
    }
}

/// Drives capture, encoding, inference and placement.
pub struct PipelineScheduler {
    session: String,
    tick_interval: Duration,
    producer: FrameProducer,
    encoder: FrameEncoder,
    inference: InferenceStage,
    placer: AnnotationPlacer,
    frames: HandoffSlot<Frame>,
    requests: HandoffSlot<EncodedRequest>,
    detections: HandoffSlot<DetectionSet>,
    handle: PipelineHandle,
    pause_rx: watch::Receiver<bool>,
    shutdown_rx: watch::Receiver<bool>,
    ticks: u64,
}

impl PipelineScheduler {
    pub fn new(config: &PipelineConfig, parts: PipelineParts) -> Self {
        let session = format!("session-{}", Uuid::new_v4());
        let now = Instant::now();
        let handle = PipelineHandle::new();

        let placer_config = PlacerConfig {
            probability_threshold: config.probability_threshold,
            max_ray_distance: config.max_ray_distance,
            annotation_ttl: config.annotation_ttl,
            overlay: FallbackOverlay::default(),
        };
        let pacing = InferencePacing {
            failure_cooldown: config.failure_cooldown,
            min_request_interval: config.min_request_interval,
        };

        Self {
            producer: FrameProducer::new(
                &session,
                parts.source,
                config.capture_width,
                config.capture_height,
                now,
            ),
            encoder: FrameEncoder::new(&session, now),
            inference: InferenceStage::new(&session, parts.service, pacing, now),
            placer: AnnotationPlacer::new(
                &session,
                placer_config,
                parts.catalog,
                parts.surface,
                parts.renderer,
                now,
            ),
            frames: HandoffSlot::new("frames"),
            requests: HandoffSlot::new("requests"),
            detections: HandoffSlot::new("detections"),
            pause_rx: handle.pause.subscribe(),
            shutdown_rx: handle.shutdown.subscribe(),
            handle,
            tick_interval: config.tick_interval,
            session,
            ticks: 0,
        }
    }

    pub fn handle(&self) -> PipelineHandle {
        self.handle.clone()
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn placer(&self) -> &AnnotationPlacer {
        &self.placer
    }

    pub fn is_paused(&self) -> bool {
        *self.pause_rx.borrow()
    }

    /// Whether a capture or detection request is still running.
    pub fn has_in_flight(&self) -> bool {
        self.producer.is_busy() || self.inference.is_busy()
    }

    /// Occupancy of the frame, request and detection slots.
    pub fn boundaries(&self, now: Instant) -> [BoundaryStatus; 3] {
        [
            BoundaryStatus {
                name: self.frames.name(),
                occupied: self.frames.is_occupied(),
                consumer_ready: self.encoder.is_ready() && self.requests.is_vacant(),
            },
            BoundaryStatus {
                name: self.requests.name(),
                occupied: self.requests.is_occupied(),
                consumer_ready: self.inference.is_ready(now) && self.detections.is_vacant(),
            },
            BoundaryStatus {
                name: self.detections.name(),
                occupied: self.detections.is_occupied(),
                consumer_ready: self.placer.is_ready(),
            },
        ]
    }

    /// Run until shutdown is requested.
    pub async fn run(&mut self) -> PipelineResult<()> {
        info!(
            session = %self.session,
            "Starting pipeline with {:?} tick interval", self.tick_interval
        );

        let mut shutdown_rx = self.shutdown_rx.clone();
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping pipeline");
                        break;
                    }
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        info!("Waiting for in-flight stages to finish...");
        if tokio::time::timeout(DRAIN_TIMEOUT, self.drain()).await.is_err() {
            warn!("In-flight stages did not finish within {:?}", DRAIN_TIMEOUT);
        }

        info!(session = %self.session, ticks = self.ticks, "Pipeline stopped");
        Ok(())
    }

    async fn drain(&mut self) {
        self.handle.pause();
        while self.has_in_flight() {
            tokio::time::sleep(self.tick_interval).await;
            self.tick().await;
        }
    }

    /// Advance every stage once.
    pub async fn tick(&mut self) -> TickReport {
        self.ticks += 1;
        let now = Instant::now();
        let paused = self.is_paused();
        let mut report = TickReport::new(self.ticks, now, paused);

        if !paused && self.producer.is_ready() && self.frames.is_vacant() {
            self.producer.start(now);
        }
        if let Some(frame) = self.producer.poll().await {
            report.captured = true;
            if let Err(e) = self.frames.publish(frame) {
                error!(session = %self.session, "Dropping frame: {}", e);
            }
        }

        self.poll_inference(&mut report).await;

        if !paused {
            loop {
                let mut moved = self.step_encoder(now, &mut report);
                moved |= self.step_inference(now, &mut report).await;
                moved |= self.step_placer(now, &mut report);
                if !moved {
                    break;
                }
            }
        }

        report.cooldown_remaining = self.inference.cooldown_remaining(now);
        report.timings = [
            (Stage::Capture, self.producer.last_timing()),
            (Stage::Encode, self.encoder.last_timing()),
            (Stage::Infer, self.inference.last_timing()),
            (Stage::Place, self.placer.last_timing()),
        ];
        report
    }

    fn step_encoder(&mut self, now: Instant, report: &mut TickReport) -> bool {
        if !self.encoder.is_ready() || self.requests.is_occupied() {
            return false;
        }
        let Some(frame) = self.frames.take() else {
            return false;
        };

        let encoded = self.encoder.run(frame, now);
        report.encoded += 1;
        if let Err(e) = self.requests.publish(encoded) {
            error!(session = %self.session, "Dropping request: {}", e);
        }
        true
    }

    async fn step_inference(&mut self, now: Instant, report: &mut TickReport) -> bool {
        if !self.inference.is_ready(now) || self.detections.is_occupied() {
            return false;
        }
        let Some(encoded) = self.requests.take() else {
            return false;
        };

        self.inference.start(encoded, now);
        report.requests_sent += 1;
        self.poll_inference(report).await;
        true
    }

    async fn poll_inference(&mut self, report: &mut TickReport) {
        match self.inference.poll().await {
            Some(InferenceOutcome::Detections(set)) => {
                if let Err(e) = self.detections.publish(set) {
                    error!(session = %self.session, "Dropping detections: {}", e);
                }
            }
            Some(InferenceOutcome::Failed(_)) => {
                report.inference_failures += 1;
                self.placer.show_indicator(IndicatorState::Failure);
            }
            None => {}
        }
    }

    fn step_placer(&mut self, now: Instant, report: &mut TickReport) -> bool {
        if !self.placer.is_ready() {
            return false;
        }
        let Some(set) = self.detections.take() else {
            return false;
        };

        report.placements.push(self.placer.place(set, now));
        true
    }
}

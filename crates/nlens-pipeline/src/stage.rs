//! Per-stage bookkeeping shared by every pipeline stage.

use std::fmt;
use std::task::Poll;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;

use crate::logging::StageLogger;
use crate::metrics;

/// The four stages of the recognition loop, upstream first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Capture,
    Encode,
    Infer,
    Place,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Capture => "capture",
            Stage::Encode => "encode",
            Stage::Infer => "infer",
            Stage::Place => "place",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Idle and run time of one stage cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTiming {
    /// From the previous finish (or creation) to this start.
    pub idle: Duration,
    /// From start to finish.
    pub run: Duration,
}

/// Measures how long a stage waits and how long it works.
#[derive(Debug, Clone)]
pub struct StageTimer {
    ready_since: Instant,
    started_at: Option<Instant>,
    last: Option<StageTiming>,
}

impl StageTimer {
    pub fn new(now: Instant) -> Self {
        Self {
            ready_since: now,
            started_at: None,
            last: None,
        }
    }

    /// Mark the start of a cycle and return the idle time before it.
    pub fn start(&mut self, now: Instant) -> Duration {
        self.started_at = Some(now);
        now.saturating_duration_since(self.ready_since)
    }

    /// Mark the end of a cycle.
    pub fn finish(&mut self, now: Instant) -> StageTiming {
        let started = self.started_at.take().unwrap_or(now);
        let timing = StageTiming {
            idle: started.saturating_duration_since(self.ready_since),
            run: now.saturating_duration_since(started),
        };
        self.ready_since = now;
        self.last = Some(timing);
        timing
    }

    pub fn last(&self) -> Option<StageTiming> {
        self.last
    }
}

/// Readiness flag, timer and logger of one stage.
///
/// `wants_more` is true exactly when the stage has no unit of work in
/// progress.
#[derive(Debug, Clone)]
pub struct StageState {
    stage: Stage,
    wants_more: bool,
    completed: u64,
    timer: StageTimer,
    logger: StageLogger,
}

impl StageState {
    pub fn new(session: &str, stage: Stage, now: Instant) -> Self {
        Self {
            stage,
            wants_more: true,
            completed: 0,
            timer: StageTimer::new(now),
            logger: StageLogger::new(session, stage),
        }
    }

    pub fn wants_more(&self) -> bool {
        self.wants_more
    }

    pub fn begin(&mut self, now: Instant) {
        self.wants_more = false;
        let idle = self.timer.start(now);
        self.logger.log_start(idle);
    }

    pub fn end(&mut self, now: Instant, message: &str) -> StageTiming {
        let timing = self.timer.finish(now);
        self.wants_more = true;
        self.completed += 1;
        metrics::record_stage_timing(self.stage, &timing);
        self.logger.log_completion(timing.run, message);
        timing
    }

    /// Number of finished cycles, successful or not.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn last_timing(&self) -> Option<StageTiming> {
        self.timer.last()
    }

    pub fn logger(&self) -> &StageLogger {
        &self.logger
    }
}

/// An asynchronous unit of work polled cooperatively by the scheduler.
pub struct InFlight<T> {
    future: Option<BoxFuture<'static, T>>,
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self { future: None }
    }
}

impl<T> InFlight<T> {
    pub fn is_running(&self) -> bool {
        self.future.is_some()
    }

    pub fn start(&mut self, future: BoxFuture<'static, T>) {
        self.future = Some(future);
    }

    /// Poll the running future once without waiting on it.
    pub async fn poll_once(&mut self) -> Option<T> {
        let mut future = self.future.as_mut()?;
        let polled = futures::poll!(future);
        match polled {
            Poll::Ready(output) => {
                self.future = None;
                Some(output)
            }
            Poll::Pending => None,
        }
    }
}

//! Pipeline configuration.

use std::time::Duration;

use nlens_ml_client::DetectionClientConfig;

use crate::error::{PipelineError, PipelineResult};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Prediction endpoint of the detection service
    pub endpoint: String,
    /// Capture resolution width in pixels
    pub capture_width: u32,
    /// Capture resolution height in pixels
    pub capture_height: u32,
    /// Detections at or below this score end a placement pass
    pub probability_threshold: f64,
    /// How long inference stays suppressed after a failed request
    pub failure_cooldown: Duration,
    /// Minimum gap between the end of one request and the start of the next
    pub min_request_interval: Duration,
    /// HTTP timeout for a single detection request
    pub request_timeout: Duration,
    /// Transport-level retries inside one request
    pub max_retries: u32,
    /// Scheduler tick cadence
    pub tick_interval: Duration,
    /// Raycast range against the environment surface
    pub max_ray_distance: f64,
    /// Evict annotations not refreshed within this window; `None` keeps them forever
    pub annotation_ttl: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            endpoint: DetectionClientConfig::default().endpoint,
            capture_width: 1280,
            capture_height: 720,
            probability_threshold: 0.8,
            failure_cooldown: Duration::from_millis(1800),
            min_request_interval: Duration::from_millis(200),
            request_timeout: Duration::from_secs(10),
            max_retries: 0,
            tick_interval: Duration::from_millis(16), // ~60 Hz
            max_ray_distance: 30.0,
            annotation_ttl: None,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            endpoint: std::env::var("NLENS_ENDPOINT").unwrap_or(defaults.endpoint),
            capture_width: env_parse("NLENS_CAPTURE_WIDTH").unwrap_or(defaults.capture_width),
            capture_height: env_parse("NLENS_CAPTURE_HEIGHT").unwrap_or(defaults.capture_height),
            probability_threshold: env_parse("NLENS_PROBABILITY_THRESHOLD")
                .unwrap_or(defaults.probability_threshold),
            failure_cooldown: env_parse("NLENS_COOLDOWN_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.failure_cooldown),
            min_request_interval: env_parse("NLENS_MIN_REQUEST_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_request_interval),
            request_timeout: env_parse("NLENS_REQUEST_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_retries: env_parse("NLENS_MAX_RETRIES").unwrap_or(defaults.max_retries),
            tick_interval: env_parse("NLENS_TICK_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            max_ray_distance: env_parse("NLENS_MAX_RAY_DISTANCE")
                .unwrap_or(defaults.max_ray_distance),
            annotation_ttl: env_parse("NLENS_ANNOTATION_TTL_SECS").map(Duration::from_secs),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> PipelineResult<()> {
        url::Url::parse(&self.endpoint).map_err(|e| {
            PipelineError::config_error(format!("invalid endpoint '{}': {}", self.endpoint, e))
        })?;

        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(PipelineError::config_error(format!(
                "capture resolution must be positive, got {}x{}",
                self.capture_width, self.capture_height
            )));
        }

        if !(0.0..1.0).contains(&self.probability_threshold) {
            return Err(PipelineError::config_error(format!(
                "probability threshold must be in [0, 1), got {}",
                self.probability_threshold
            )));
        }

        if self.tick_interval.is_zero() {
            return Err(PipelineError::config_error("tick interval must be non-zero"));
        }

        if !(self.max_ray_distance > 0.0) {
            return Err(PipelineError::config_error(format!(
                "max ray distance must be positive, got {}",
                self.max_ray_distance
            )));
        }

        Ok(())
    }

    /// Settings for the HTTP detection client.
    pub fn client_config(&self) -> DetectionClientConfig {
        DetectionClientConfig {
            endpoint: self.endpoint.clone(),
            timeout: self.request_timeout,
            max_retries: self.max_retries,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

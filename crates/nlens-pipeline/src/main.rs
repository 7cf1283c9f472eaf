//! Recognition pipeline binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use nalgebra::Matrix4;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nlens_ml_client::DetectionClient;
use nlens_models::StaticCatalog;
use nlens_pipeline::placer::projection_from_fov;
use nlens_pipeline::{
    PipelineConfig, PipelineParts, PipelineScheduler, PlaneSurface, StillImageSource,
    TracingRenderer,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("nlens=info".parse().unwrap())
        .add_directive("nlens_pipeline=info".parse().unwrap())
        .add_directive("nlens_ml_client=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting nlens");

    if let Err(e) = run().await {
        error!("Pipeline error: {:#}", e);
        std::process::exit(1);
    }

    info!("Shutdown complete");
}

async fn run() -> anyhow::Result<()> {
    let config = PipelineConfig::from_env();
    config.validate()?;
    info!("Pipeline config: {:?}", config);

    if let Ok(addr) = std::env::var("NLENS_METRICS_ADDR") {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid NLENS_METRICS_ADDR '{}'", addr))?;
        nlens_pipeline::metrics::init_metrics(addr)?;
        info!("Serving metrics on {}", addr);
    }

    let catalog = StaticCatalog::builtin().context("failed to load product catalog")?;
    info!("Loaded {} catalog records", catalog.len());

    let client = DetectionClient::new(config.client_config())?;
    match client.health_check().await {
        Ok(true) => info!("Detection service is available"),
        Ok(false) | Err(_) => warn!(
            "Detection service at {} is not reporting an available model",
            config.endpoint
        ),
    }

    let image_path = std::env::var("NLENS_IMAGE_PATH").context("NLENS_IMAGE_PATH is not set")?;
    let hfov: f64 = env_or("NLENS_HFOV_DEG", 64.7);
    let aspect = f64::from(config.capture_width) / f64::from(config.capture_height);
    let source = StillImageSource::from_file(&image_path)
        .await
        .with_context(|| format!("failed to read {}", image_path))?
        .with_pose(Matrix4::identity(), projection_from_fov(hfov, aspect));

    let distance: f64 = env_or("NLENS_SURFACE_DISTANCE", 1.5);

    let parts = PipelineParts {
        source: Arc::new(source),
        service: Arc::new(client),
        catalog: Arc::new(catalog),
        surface: Arc::new(PlaneSurface::facing_origin(distance)),
        renderer: Box::new(TracingRenderer::new()),
    };
    let mut scheduler = PipelineScheduler::new(&config, parts);

    let handle = scheduler.handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        handle.shutdown();
    });

    scheduler.run().await?;
    Ok(())
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

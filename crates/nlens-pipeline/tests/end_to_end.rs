//! Full pipeline runs against a mocked detection service.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nalgebra::{Matrix4, Point3, Vector3};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use nlens_ml_client::DetectionClient;
use nlens_models::{AnnotationId, ProductCatalog, Rgba, StaticCatalog};
use nlens_pipeline::{
    AnnotationRenderer, IndicatorState, LabelVisual, MarkerVisual, PipelineConfig, PipelineParts,
    PipelineScheduler, PlacementSummary, PlaneSurface, StillImageSource, TickReport,
};

const PREDICT_PATH: &str = "/v1/models/holoselecta:predict";

#[derive(Clone, Default)]
struct Scene {
    markers: Arc<Mutex<Vec<(AnnotationId, Point3<f64>, Rgba)>>>,
    indicators: Arc<Mutex<Vec<IndicatorState>>>,
}

impl AnnotationRenderer for Scene {
    fn place_label(&mut self, _id: AnnotationId, _position: Point3<f64>, _visual: &LabelVisual) {}

    fn place_marker(&mut self, id: AnnotationId, position: Point3<f64>, visual: &MarkerVisual) {
        self.markers.lock().unwrap().push((id, position, visual.color));
    }

    fn update_label(&mut self, _id: AnnotationId, _position: Point3<f64>, _scale: Vector3<f64>) {}

    fn update_marker(&mut self, _id: AnnotationId, _position: Point3<f64>, _scale: Vector3<f64>) {}

    fn remove(&mut self, _id: AnnotationId) {}

    fn show_indicator(&mut self, state: IndicatorState) {
        self.indicators.lock().unwrap().push(state);
    }
}

fn config_for(server: &MockServer) -> PipelineConfig {
    PipelineConfig {
        endpoint: format!("{}{}", server.uri(), PREDICT_PATH),
        min_request_interval: Duration::ZERO,
        tick_interval: Duration::from_millis(5),
        ..Default::default()
    }
}

fn scheduler_for(config: &PipelineConfig, scene: &Scene) -> PipelineScheduler {
    let source = StillImageSource::new(b"\xff\xd8\xff\xe0shelf".to_vec())
        .with_pose(Matrix4::identity(), Matrix4::identity());

    let parts = PipelineParts {
        source: Arc::new(source),
        service: Arc::new(DetectionClient::new(config.client_config()).unwrap()),
        catalog: Arc::new(StaticCatalog::builtin().unwrap()),
        surface: Arc::new(PlaneSurface::facing_origin(1.0)),
        renderer: Box::new(scene.clone()),
    };
    PipelineScheduler::new(config, parts)
}

/// Tick in real time until a report satisfies `done`.
async fn tick_until(
    scheduler: &mut PipelineScheduler,
    done: impl Fn(&TickReport) -> bool,
) -> TickReport {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let report = scheduler.tick().await;
            if done(&report) {
                return report;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("pipeline made no progress within 10s")
}

async fn next_placement(scheduler: &mut PipelineScheduler) -> PlacementSummary {
    let report = tick_until(scheduler, |r| !r.placements.is_empty()).await;
    report.placements[0]
}

#[tokio::test]
async fn test_detected_product_is_placed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PREDICT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "outputs": {
                "detection_scores": [[0.99]],
                "detection_classes": [[16.0]],
                "detection_boxes": [[[0.1, 0.1, 0.2, 0.2]]]
            }
        })))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let scene = Scene::default();
    let mut scheduler = scheduler_for(&config, &scene);

    let first = next_placement(&mut scheduler).await;
    assert_eq!(first.created, 1);

    let catalog = StaticCatalog::builtin().unwrap();
    let expected = catalog.lookup(16).unwrap().display_color();
    {
        let markers = scene.markers.lock().unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].2, expected);
        assert!((markers[0].1.z - 1.0).abs() < 1e-9);
    }

    let second = next_placement(&mut scheduler).await;
    assert_eq!(second.created, 0);
    assert_eq!(second.merged, 1);

    assert_eq!(scheduler.placer().registry().len(), 1);
    assert_eq!(scene.markers.lock().unwrap().len(), 1);
    assert_eq!(
        scene.indicators.lock().unwrap().first(),
        Some(&IndicatorState::Loading)
    );

    let requests = server.received_requests().await.unwrap();
    assert!(requests.len() >= 2);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["inputs"][0]["b64"].is_string());
}

#[tokio::test]
async fn test_service_error_enters_cooldown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(PREDICT_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = PipelineConfig {
        failure_cooldown: Duration::from_millis(300),
        ..config_for(&server)
    };
    let scene = Scene::default();
    let mut scheduler = scheduler_for(&config, &scene);

    let failed = tick_until(&mut scheduler, |r| r.inference_failures > 0).await;
    assert!(scene
        .indicators
        .lock()
        .unwrap()
        .contains(&IndicatorState::Failure));

    let retried = tick_until(&mut scheduler, |r| r.requests_sent > 0).await;
    assert!(retried.at - failed.at >= config.failure_cooldown);
    assert!(scheduler.placer().registry().is_empty());
}

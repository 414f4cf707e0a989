use std::path::PathBuf;
use std::sync::Arc;

use ampel_api::config::ServerConfig;
use ampel_api::router::build_app_router;
use ampel_api::state::AppState;
use ampel_core::config::PipelineConfig;
use ampel_core::telemetry::RawMessage;
use ampel_mqtt::state::{ConnectionState, StateReporter};
use ampel_pipeline::{AggregationWorker, DisabledPersistence, IngressQueue, StateStore};
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

pub const SEM1_TOPIC: &str = "city/sem/sem-001/telemetry";
pub const SEM2_TOPIC: &str = "city/sem/sem-002/telemetry";

/// Build a test `ServerConfig` with safe defaults.
///
/// Static assets are served from the workspace `static/` directory.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5000".to_string()],
        request_timeout_secs: 30,
        static_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../static"),
    }
}

/// In-memory pipeline behind a test app. No database, no broker.
pub struct TestPipeline {
    pub store: Arc<StateStore>,
    pub queue: Arc<IngressQueue>,
    pub reporter: StateReporter,
    worker: AggregationWorker,
}

impl TestPipeline {
    pub fn new() -> Self {
        let config = PipelineConfig::default();
        let store = Arc::new(StateStore::new(&config));
        let queue = Arc::new(IngressQueue::new(config.queue_capacity));
        let (reporter, _rx) = StateReporter::new();
        let worker =
            AggregationWorker::new(&config, Arc::clone(&store), Arc::new(DisabledPersistence));
        Self {
            store,
            queue,
            reporter,
            worker,
        }
    }

    /// Feed one message through the worker, received `secs` after a fixed epoch.
    pub async fn ingest(&mut self, topic: &str, payload: &str, secs: i64) {
        let received_at = Utc
            .timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .expect("valid timestamp");
        self.worker
            .process(RawMessage {
                topic: topic.into(),
                payload: payload.into(),
                received_at,
            })
            .await;
    }

    pub fn set_broker_state(&self, state: ConnectionState) {
        self.reporter.set(state);
    }

    /// Build the full application router over this pipeline.
    pub fn app(&self) -> Router {
        let config = test_config();
        let state = AppState {
            store: Arc::clone(&self.store),
            queue: Arc::clone(&self.queue),
            broker_state: self.reporter.subscribe(),
            pool: None,
            pipeline: Arc::new(PipelineConfig::default()),
            config: Arc::new(config.clone()),
        };
        build_app_router(state, &config)
    }
}

/// Issue a GET request against `app`.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    app.oneshot(request).await.expect("infallible router")
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}

/// Collect a response body as UTF-8 text.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("UTF-8 body")
}

pub fn telemetry(node: &str, mq_pct: i64, veh_count: i64) -> String {
    format!(
        r#"{{"node_id":"{node}","mq_raw":200,"mq_pct":{mq_pct},"dist_cm":30,"veh_count":{veh_count}}}"#
    )
}

//! End-to-end tests for the aggregation worker against an in-memory
//! persistence gateway.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ampel_core::config::PipelineConfig;
use ampel_core::telemetry::RawMessage;
use ampel_core::types::{DbId, Timestamp};
use ampel_db::models::measurement::CreateMeasurement;
use ampel_pipeline::{
    AggregationWorker, IngressQueue, PersistenceError, PersistenceGateway, ProcessOutcome,
    RecordOutcome, StateStore,
};
use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

const SEM1_TOPIC: &str = "city/sem/sem-001/telemetry";
const SEM2_TOPIC: &str = "city/sem/sem-002/telemetry";

// ---------------------------------------------------------------------------
// Test gateway
// ---------------------------------------------------------------------------

/// Records every append; knows `sem-001` (key 1) and `sem-002` (key 2).
#[derive(Default)]
struct RecordingGateway {
    appended: Mutex<Vec<(DbId, CreateMeasurement)>>,
    fail_inserts: bool,
}

impl RecordingGateway {
    fn appended(&self) -> Vec<(DbId, CreateMeasurement)> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl PersistenceGateway for RecordingGateway {
    async fn resolve_storage_key(&self, node_id: &str) -> Result<Option<DbId>, PersistenceError> {
        Ok(match node_id {
            "sem-001" => Some(1),
            "sem-002" => Some(2),
            _ => None,
        })
    }

    async fn append_measurement(
        &self,
        key: DbId,
        measurement: &CreateMeasurement,
    ) -> Result<DbId, PersistenceError> {
        if self.fail_inserts {
            return Err(PersistenceError::Unavailable("database offline".into()));
        }
        let mut appended = self.appended.lock().unwrap();
        appended.push((key, measurement.clone()));
        Ok(appended.len() as DbId)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn at(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn message(topic: &str, payload: &str, secs: i64) -> RawMessage {
    RawMessage {
        topic: topic.into(),
        payload: payload.into(),
        received_at: at(secs),
    }
}

fn telemetry(node: &str, mq_pct: i64, veh_count: i64) -> String {
    format!(
        r#"{{"node_id":"{node}","mq_raw":200,"mq_pct":{mq_pct},"dist_cm":30,"veh_count":{veh_count}}}"#
    )
}

fn setup(gateway: Arc<RecordingGateway>) -> (Arc<StateStore>, AggregationWorker) {
    let config = PipelineConfig::default();
    let store = Arc::new(StateStore::new(&config));
    let worker = AggregationWorker::new(&config, Arc::clone(&store), gateway);
    (store, worker)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_message_updates_series_and_persists() {
    let gateway = Arc::new(RecordingGateway::default());
    let (store, mut worker) = setup(Arc::clone(&gateway));

    let payload = r#"{"node_id":"sem-001","mq_raw":200,"mq_pct":45,"dist_cm":30,"veh_count":12}"#;
    let outcome = worker.process(message(SEM1_TOPIC, payload, 0)).await;

    assert_eq!(
        outcome,
        ProcessOutcome::Measured {
            node_id: "sem-001".into(),
            sampled: true,
            persisted: RecordOutcome::Stored(1),
        }
    );

    let series = store.series().await;
    let sem1 = &series["sem-001"];
    assert_eq!(sem1.len(), 1);
    assert_eq!(sem1.air_quality, vec![Some(45)]);
    assert_eq!(sem1.vehicle_rate, vec![None]);

    let appended = gateway.appended();
    assert_eq!(appended.len(), 1);
    assert_eq!(appended[0].0, 1);
    assert_eq!(
        appended[0].1,
        CreateMeasurement {
            mq_raw: Some(200.0),
            mq_pct: Some(45.0),
            dist_cm: Some(30.0),
            veh_count: 12,
        }
    );

    let last = store.peek_last(SEM1_TOPIC).await.expect("last message recorded");
    assert_eq!(last.message, payload);
}

#[tokio::test]
async fn unparseable_payload_only_reaches_history() {
    let gateway = Arc::new(RecordingGateway::default());
    let (store, mut worker) = setup(Arc::clone(&gateway));

    worker
        .process(message(SEM1_TOPIC, &telemetry("sem-001", 40, 1), 0))
        .await;
    let outcome = worker.process(message(SEM1_TOPIC, "{not json", 5)).await;

    assert_eq!(outcome, ProcessOutcome::Discarded);
    assert_eq!(store.series().await["sem-001"].len(), 1);
    assert_eq!(store.history_len().await, 2);
    assert_eq!(store.list_history().await[0].message, "{not json");
    assert_eq!(gateway.appended().len(), 1);
}

#[tokio::test]
async fn vehicle_rate_is_derived_from_successive_counts() {
    let (store, mut worker) = setup(Arc::new(RecordingGateway::default()));

    worker
        .process(message(SEM2_TOPIC, &telemetry("sem-002", 10, 10), 0))
        .await;
    worker
        .process(message(SEM2_TOPIC, &telemetry("sem-002", 20, 70), 60))
        .await;
    // Counter reset: no rate, but the sample is still appended.
    worker
        .process(message(SEM2_TOPIC, &telemetry("sem-002", 30, 5), 120))
        .await;

    let sem2 = &store.series().await["sem-002"];
    assert_eq!(sem2.vehicle_rate, vec![None, Some(60), None]);
    assert_eq!(sem2.air_quality, vec![Some(10), Some(20), Some(30)]);
}

#[tokio::test]
async fn series_stay_in_lockstep_over_many_messages() {
    let (store, mut worker) = setup(Arc::new(RecordingGateway::default()));

    for i in 0..200 {
        let payload = if i % 7 == 0 {
            r#"{"node_id":"sem-001","mq_pct":"abc","veh_count":1}"#.to_string()
        } else {
            telemetry("sem-001", i * 3 - 50, i)
        };
        worker.process(message(SEM1_TOPIC, &payload, i * 10)).await;
    }

    let sem1 = &store.series().await["sem-001"];
    assert_eq!(sem1.labels.len(), 120);
    assert_eq!(sem1.air_quality.len(), 120);
    assert_eq!(sem1.vehicle_rate.len(), 120);
    assert!(sem1
        .air_quality
        .iter()
        .flatten()
        .all(|v| (0..=100).contains(v)));
    assert_eq!(store.history_len().await, 200);
}

#[tokio::test]
async fn unmonitored_topic_is_history_only() {
    let gateway = Arc::new(RecordingGateway::default());
    let (store, mut worker) = setup(Arc::clone(&gateway));

    let outcome = worker
        .process(message("city/other", &telemetry("sem-001", 50, 1), 0))
        .await;

    assert_eq!(outcome, ProcessOutcome::HistoryOnly);
    assert_eq!(store.history_len().await, 1);
    assert!(store.peek_last("city/other").await.is_none());
    assert!(store.series().await["sem-001"].is_empty());
    assert!(gateway.appended().is_empty());
}

#[tokio::test]
async fn untracked_node_is_persisted_lookup_but_not_sampled() {
    let gateway = Arc::new(RecordingGateway::default());
    let (store, mut worker) = setup(Arc::clone(&gateway));

    let outcome = worker
        .process(message(SEM1_TOPIC, &telemetry("sem-777", 50, 1), 0))
        .await;

    assert_matches!(
        outcome,
        ProcessOutcome::Measured { sampled: false, persisted: RecordOutcome::UnknownNode, .. }
    );
    assert!(store.series().await.values().all(|s| s.is_empty()));
}

#[tokio::test]
async fn persistence_failure_does_not_block_series_update() {
    let gateway = Arc::new(RecordingGateway {
        fail_inserts: true,
        ..Default::default()
    });
    let (store, mut worker) = setup(gateway);

    let outcome = worker
        .process(message(SEM1_TOPIC, &telemetry("sem-001", 150, 3), 0))
        .await;

    assert_matches!(
        outcome,
        ProcessOutcome::Measured { sampled: true, persisted: RecordOutcome::Failed(_), .. }
    );
    assert_eq!(store.series().await["sem-001"].air_quality, vec![Some(100)]);
}

#[tokio::test]
async fn run_drains_queue_until_cancelled() {
    let config = PipelineConfig::default();
    let store = Arc::new(StateStore::new(&config));
    let queue = Arc::new(IngressQueue::new(config.queue_capacity));
    let cancel = CancellationToken::new();
    let worker = AggregationWorker::new(
        &config,
        Arc::clone(&store),
        Arc::new(RecordingGateway::default()),
    );

    let handle = tokio::spawn(worker.run(Arc::clone(&queue), cancel.clone()));

    for i in 0..5 {
        queue.push(message(SEM1_TOPIC, &telemetry("sem-001", 10, i), i * 60));
    }

    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        while store.history_len().await < 5 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(drained.is_ok(), "worker should drain all queued messages");
    assert!(queue.is_empty());

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("worker should stop after cancellation")
        .expect("worker task should not panic");

    assert_eq!(store.series().await["sem-001"].len(), 5);
}

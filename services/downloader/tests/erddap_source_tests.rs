//! ERDDAP source against a local griddap stand-in.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use ocean_common::{BoundingBox, TimeRange};
use serde_json::{json, Value};
use storage::ObjectStorage;
use tempfile::TempDir;

use downloader::source::{ErddapConfig, ErddapSource};
use downloader::staging::read_grid;
use downloader::{
    ChunkDescriptor, CompletionLedger, DatasetSource, Granularity, PipelineRunner, RetryPolicy,
    SourceError, StagingArea, TransferWorker,
};

#[derive(Clone)]
struct Griddap {
    data_requests: Arc<AtomicUsize>,
    unavailable_for: usize,
}

async fn das() -> &'static str {
    "Attributes {\n  NC_GLOBAL {\n  }\n}\n"
}

async fn data(State(state): State<Griddap>) -> Response {
    let n = state.data_requests.fetch_add(1, Ordering::SeqCst);
    if n < state.unavailable_for {
        return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
    }
    Json(window_table()).into_response()
}

/// 12-hourly steps on a 2x3 grid. The last step sits on the window end and
/// the 151E column is outside the Japan box.
fn window_table() -> Value {
    let mut rows = Vec::new();
    for (t, time) in ["2020-01-01T00:00:00Z", "2020-01-01T12:00:00Z", "2020-01-02T00:00:00Z"]
        .iter()
        .enumerate()
    {
        for lat in [20.0, 21.0] {
            for lon in [130.0, 131.0, 151.0] {
                let hs = 1.0 + t as f64;
                rows.push(json!([time, lat, lon, hs, 8.0]));
            }
        }
    }
    json!({
        "table": {
            "columnNames": ["time", "latitude", "longitude", "VHM0", "VTPK"],
            "columnTypes": ["String", "float", "float", "float", "float"],
            "columnUnits": ["UTC", "degrees_north", "degrees_east", "m", "s"],
            "rows": rows,
        }
    })
}

async fn serve(unavailable_for: usize) -> (String, Arc<AtomicUsize>) {
    let state = Griddap {
        data_requests: Arc::new(AtomicUsize::new(0)),
        unavailable_for,
    };
    let requests = state.data_requests.clone();
    let app = Router::new()
        .route("/erddap/griddap/waves.das", get(das))
        .route("/erddap/griddap/waves.json", get(data))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/erddap", addr), requests)
}

fn source(base_url: String, dataset_id: &str) -> ErddapSource {
    let config = ErddapConfig {
        base_url,
        dataset_id: dataset_id.to_string(),
        variables: vec!["VHM0".to_string(), "VTPK".to_string()],
        stride: 1,
        timeout_secs: 5,
    };
    ErddapSource::new(config, 50).unwrap()
}

fn japan() -> BoundingBox {
    BoundingBox::new(124.52, 16.745, 144.6, 48.185)
}

fn first_day() -> TimeRange {
    TimeRange::new(
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap(),
    )
}

#[tokio::test]
async fn test_window_is_trimmed_and_clipped() {
    let (base_url, _) = serve(0).await;
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("window.ndjson.gz");

    let source = source(base_url, "waves");
    let chunk = ChunkDescriptor::window(first_day(), Some(japan()));
    let dataset = source.open(&chunk).await.unwrap();
    assert!(dataset.describe().contains("/griddap/waves.json?VHM0"));

    let bytes = dataset.materialize(&dest).await.unwrap();
    assert!(bytes > 0);

    let grid = read_grid(&dest).unwrap();
    assert_eq!(grid.shape(), (2, 2, 2));
    assert_eq!(grid.longitudes, vec![130.0, 131.0]);
    assert_eq!(grid.value("VHM0", 0, 0, 0), Some(1.0));
    assert_eq!(grid.value("VHM0", 1, 1, 1), Some(2.0));
    assert_eq!(grid.value("VTPK", 1, 0, 0), Some(8.0));
}

#[tokio::test]
async fn test_unknown_dataset_fails_on_open() {
    let (base_url, requests) = serve(0).await;
    let source = source(base_url, "missing");

    let result = source
        .open(&ChunkDescriptor::window(first_day(), None))
        .await;
    match result {
        Err(SourceError::Status { status, url }) => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/griddap/missing.das"));
        }
        Err(other) => panic!("expected status error, got {}", other),
        Ok(_) => panic!("expected status error"),
    }
    assert_eq!(requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_busy_server_is_retried_through_pipeline() {
    let (base_url, requests) = serve(1).await;
    let dir = TempDir::new().unwrap();
    let store = ObjectStorage::in_memory("ocean-raw");

    let staging = StagingArea::create(dir.path().join("staging")).await.unwrap();
    let ledger = CompletionLedger::load(dir.path().join("state/copernicus.json"))
        .await
        .unwrap();
    let worker = TransferWorker::new(
        Arc::new(source(base_url, "waves")),
        Arc::new(store.clone()),
        staging,
        RetryPolicy::new(3, Duration::from_millis(10)).unwrap(),
        "copernicus",
    );
    let mut runner = PipelineRunner::new(worker, ledger);

    let summary = runner
        .run(first_day(), Granularity::Days(1), Some(japan()))
        .await
        .unwrap();

    assert_eq!(summary.planned, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(requests.load(Ordering::SeqCst), 2);
    assert!(runner.ledger().is_complete(&"20200101_20200102".into()));

    let keys = store.list("copernicus/").await.unwrap();
    assert_eq!(keys, vec!["copernicus/2020/20200101_20200102.ndjson.gz".to_string()]);
    assert!(std::fs::read_dir(dir.path().join("staging"))
        .unwrap()
        .next()
        .is_none());
}

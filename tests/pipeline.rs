//! End-to-end: settings -> sampler -> day log + live channel -> chart,
//! plus the control update and the retention sweep over the same files.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{NaiveDate, TimeZone, Utc};
use tower::ServiceExt;

use fridge_host::auth::ApiKeyAuthorizer;
use fridge_host::config::{CalendarZone, RetentionConfig};
use fridge_host::history::HistoryReader;
use fridge_host::live::LiveChannel;
use fridge_host::recorder::Recorder;
use fridge_host::sampler::Sampler;
use fridge_host::sensors::MockSensors;
use fridge_host::server::{router, AppState};
use fridge_host::settings::ConfigStore;
use fridge_host::{Configuration, StatusRecord};

struct Host {
    _dir: tempfile::TempDir,
    settings: ConfigStore,
    recorder: Arc<Recorder>,
    live: LiveChannel,
    state: AppState,
}

fn host() -> Host {
    let dir = tempfile::tempdir().unwrap();
    let settings = ConfigStore::new(dir.path().join("fridge.json"));
    settings
        .write(&Configuration { target_temp: 4.0, p: 1.0, i: 0.0, d: 0.0, status: None })
        .unwrap();
    let log_dir = dir.path().join("logs");
    let recorder = Arc::new(Recorder::open(&log_dir, CalendarZone::Utc).unwrap());
    let live = LiveChannel::default();
    let state = AppState {
        settings: settings.clone(),
        history: HistoryReader::new(&log_dir),
        live: live.clone(),
        auth: Arc::new(ApiKeyAuthorizer::new(Some("s3cret".into()))),
        require_all_fields: false,
    };
    Host { _dir: dir, settings, recorder, live, state }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 4, d).unwrap()
}

#[tokio::test]
async fn tick_is_logged_published_and_charted() {
    let host = host();
    let mut rx = host.live.subscribe();
    let sampler = Sampler::new(
        host.settings.clone(),
        Arc::new(MockSensors::new([("inside", 3.8), ("outside", 22.1)])),
        Arc::clone(&host.recorder),
        host.live.clone(),
    );

    let now = Utc.with_ymd_and_hms(2020, 4, 19, 10, 0, 0).unwrap();
    sampler.tick(now).await.unwrap();

    let line = "2020-04-19T10:00:00Z,Idle,3.8,22.1,4,1,0,0";
    assert_eq!(
        std::fs::read_to_string(host.recorder.log_path(day(19))).unwrap(),
        format!("{line}\n")
    );
    let published = rx.recv().await.unwrap();
    assert_eq!(published.to_csv_line(), line);

    let response = router(host.state.clone())
        .oneshot(Request::get("/chart/2020-04-19").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let charted: Vec<StatusRecord> = serde_json::from_slice(&body).unwrap();
    assert_eq!(charted, vec![published]);
}

#[tokio::test]
async fn control_update_only_moves_the_target() {
    let host = host();

    let response = router(host.state.clone())
        .oneshot(
            Request::post("/temperature")
                .header(header::AUTHORIZATION, "api-key s3cret")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"target_temp": 5}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        host.settings.read().unwrap(),
        Configuration { target_temp: 5.0, p: 1.0, i: 0.0, d: 0.0, status: None }
    );
}

#[tokio::test]
async fn retention_keeps_the_last_week() {
    let host = host();
    for d in 19..=26 {
        std::fs::write(host.recorder.log_path(day(d)), "").unwrap();
    }

    host.recorder.sweep(day(26), &RetentionConfig::default());

    assert!(!host.recorder.log_path(day(19)).exists());
    for d in 20..=26 {
        assert!(host.recorder.log_path(day(d)).exists(), "2020-04-{d} should survive");
    }
}

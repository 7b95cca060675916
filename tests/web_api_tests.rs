//! Integration tests for the snapshot API.

#![cfg(feature = "server")]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use marklin_sim::config::TrainConfig;
use marklin_sim::diagnostics::RecordingSink;
use marklin_sim::services::{build_router, ApiResponse, Simulation, SimulationHandle, WebServerConfig};
use marklin_sim::snapshot::TickPayload;
use marklin_sim::{factory, Config, Controller, Train};

fn spawn_simulation() -> SimulationHandle {
    let mut controller = Controller::with_sink(RecordingSink::new());
    controller.register_track(factory::straight(1, 0.0, 0.0, 200.0, 0.0));
    let mut train = Train::new(24, TrainConfig::default());
    train.put_on_track(controller.layout(), 1, true).unwrap();
    controller.register_train(train);

    let (simulation, handle) = Simulation::new(controller, &Config::default());
    tokio::spawn(simulation.run());
    handle
}

fn create_test_app() -> axum::Router {
    build_router(spawn_simulation(), &WebServerConfig::default())
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_full_snapshot() {
    let app = create_test_app();

    let (status, body) = get(&app, "/api/tick/full").await;
    assert_eq!(status, StatusCode::OK);

    let json: ApiResponse<TickPayload> = serde_json::from_slice(&body).unwrap();
    assert!(json.success);
    let payload = json.data.unwrap();
    assert!(payload.object_changed);
    assert!(payload.draw_track);
    assert_eq!(payload.trains.len(), 1);
    assert_eq!(payload.trains[0].id, 24);
    assert_eq!(payload.straight_tracks.unwrap().len(), 1);
}

#[tokio::test]
async fn test_repeated_delta_is_empty() {
    let app = create_test_app();

    let (status, body) = get(&app, "/api/tick/delta").await;
    assert_eq!(status, StatusCode::OK);
    let first: ApiResponse<TickPayload> = serde_json::from_slice(&body).unwrap();
    let first = first.data.unwrap();
    assert!(!first.object_changed);
    assert!(first.straight_tracks.is_none());
    assert_eq!(first.trains.len(), 1);

    let (_, body) = get(&app, "/api/tick/delta").await;
    let second: ApiResponse<TickPayload> = serde_json::from_slice(&body).unwrap();
    assert!(second.data.unwrap().trains.is_empty());
}

#[tokio::test]
async fn test_snapshot_is_camel_case_json() {
    let app = create_test_app();

    let (_, body) = get(&app, "/api/tick/full").await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let data = &json["data"];
    assert!(data.get("objectChanged").is_some());
    assert!(data.get("onlineSwitchStraightTracks").is_some());
}

#[tokio::test]
async fn test_not_found() {
    let app = create_test_app();

    let (status, body) = get(&app, "/api/nonexistent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let json: ApiResponse<()> = serde_json::from_slice(&body).unwrap();
    assert!(!json.success);
    assert!(json.error.is_some());
}

#[tokio::test]
async fn test_cors_headers() {
    let app = build_router(spawn_simulation(), &WebServerConfig::default().cors(true));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/tick/full")
                .header("Origin", "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}

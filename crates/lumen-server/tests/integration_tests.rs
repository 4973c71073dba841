//! Integration tests for the session API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use lumen_domain::Metric;
use lumen_server::{
    build_state,
    config::ServerConfig,
    handlers::{create_router, AppState, ErrorResponse, HealthCheckResponse},
    responses::{DetailResponse, OverviewResponse, SelectionResponse, SessionCreated},
    SourceKind,
};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tower::ServiceExt; // for oneshot
use uuid::Uuid;

/// Helper to create test application state backed by the sample data
async fn create_test_state() -> AppState {
    build_state(&ServerConfig::default(), SourceKind::Mock).await.unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap()
}

/// Start a session and wait for its first refresh
async fn start_session(state: &AppState, app: &Router) -> Uuid {
    let (status, body) = send(app, "POST", "/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: SessionCreated = parse(&body);

    let session = state.registry.get(created.id).unwrap();
    while session.status().version == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    created.id
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let state = create_test_state().await;
    let app = create_router(state);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let health: HealthCheckResponse = parse(&body);
    assert_eq!(health.status, "healthy");
    assert_eq!(health.sessions, 0);
    assert_eq!(health.entities, 4);
}

#[tokio::test]
async fn test_overview_lists_entities_with_data() {
    let state = create_test_state().await;
    let app = create_router(state.clone());
    let id = start_session(&state, &app).await;

    let (status, body) = send(&app, "GET", &format!("/sessions/{}/overview", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let overview: OverviewResponse = parse(&body);
    assert_eq!(overview.version, 1);
    let codes: Vec<&str> = overview.points.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(codes, vec!["IND", "KEN", "NER", "USA"]);

    state.registry.shutdown().await;
}

#[tokio::test]
async fn test_detail_follows_selection() {
    let state = create_test_state().await;
    let app = create_router(state.clone());
    let id = start_session(&state, &app).await;
    let detail_uri = format!("/sessions/{}/detail", id);

    let (_, body) = send(&app, "GET", &detail_uri, None).await;
    let detail: DetailResponse = parse(&body);
    assert_eq!(detail.state, "no_selection");
    assert_eq!(detail.title, "Select a country on the map");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/sessions/{}/selection/entity", id),
        Some(r#"{"code": "usa"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let selection: SelectionResponse = parse(&body);
    assert_eq!(selection.entity.as_deref(), Some("USA"));

    let (status, _) = send(
        &app,
        "POST",
        &format!("/sessions/{}/selection/years", id),
        Some(r#"{"from": 2005, "to": 2010}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", &detail_uri, None).await;
    let detail: DetailResponse = parse(&body);
    assert_eq!(detail.state, "chart");
    assert_eq!(detail.title, "Electricity Access & Infant Mortality in USA, 2005-2010");
    assert_eq!(detail.x_range, Some((2005, 2010)));

    let electricity = detail.series(Metric::ElectricityAccess).unwrap();
    let years: Vec<u16> = electricity.points.iter().map(|p| p.year).collect();
    assert_eq!(years, vec![2005, 2006, 2007, 2008]);
    assert_eq!(electricity.points[0].value, Some(87.0));
    assert_eq!(electricity.y_range, (0.0, 100.0));

    state.registry.shutdown().await;
}

#[tokio::test]
async fn test_inverted_range_is_rejected() {
    let state = create_test_state().await;
    let app = create_router(state.clone());
    let id = start_session(&state, &app).await;
    let uri = format!("/sessions/{}/selection/years", id);

    send(&app, "POST", &uri, Some(r#"{"from": 2006, "to": 2008}"#)).await;
    let (status, body) = send(&app, "POST", &uri, Some(r#"{"from": 2012, "to": 2008}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(&body);
    assert!(error.error.contains("2012"));

    let selection = state.registry.get(id).unwrap().selection();
    assert_eq!(selection.selection.years.from(), 2006);
    assert_eq!(selection.selection.years.to(), 2008);

    state.registry.shutdown().await;
}

#[tokio::test]
async fn test_invalid_entity_code_is_rejected() {
    let state = create_test_state().await;
    let app = create_router(state.clone());
    let id = start_session(&state, &app).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/sessions/{}/selection/entity", id),
        Some(r#"{"code": ""}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    state.registry.shutdown().await;
}

#[tokio::test]
async fn test_refresh_and_status() {
    let state = create_test_state().await;
    let app = create_router(state.clone());
    let id = start_session(&state, &app).await;

    let (status, body) = send(&app, "POST", &format!("/sessions/{}/refresh", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let refresh: serde_json::Value = parse(&body);
    assert_eq!(refresh["outcome"], "queued");

    let (status, body) = send(&app, "GET", &format!("/sessions/{}/status", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let session_status: serde_json::Value = parse(&body);
    assert_eq!(session_status["cache"]["state"], "fresh");
    assert!(session_status["metrics"]["successes"].as_u64().unwrap() >= 1);

    state.registry.shutdown().await;
}

#[tokio::test]
async fn test_end_session() {
    let state = create_test_state().await;
    let app = create_router(state.clone());
    let id = start_session(&state, &app).await;

    let (status, _) = send(&app, "DELETE", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/sessions/{}/overview", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_session_routes_are_404() {
    let state = create_test_state().await;
    let app = create_router(state);
    let id = Uuid::now_v7();

    for (method, path) in [
        ("GET", "overview"),
        ("GET", "detail"),
        ("GET", "status"),
        ("POST", "refresh"),
    ] {
        let (status, _) = send(&app, method, &format!("/sessions/{}/{}", id, path), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} /{}", method, path);
    }
}

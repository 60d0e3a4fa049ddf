//! Integration tests for the station status, history and timeline queries.

mod common;

use axum::http::StatusCode;
use chargewatch_core::station::StationStatus;
use chargewatch_core::types::now_iso;
use common::{body_json, build_test_app, get};

#[tokio::test]
async fn status_is_empty_before_first_check() {
    let app = build_test_app();
    let json = body_json(get(app.router, "/api/status").await).await;

    assert!(json["data"]["statuses"].as_object().unwrap().is_empty());
    assert!(json["data"]["history"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn status_reflects_registry_updates() {
    let app = build_test_app();
    let ts = now_iso();
    app.registry
        .update("s1", "Station 1", StationStatus::InUse, &ts)
        .await;
    app.registry
        .update("s2", "Station 2", StationStatus::Error, &ts)
        .await;

    let response = get(app.router, "/api/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    let s1 = &json["data"]["statuses"]["s1"];
    assert_eq!(s1["status"], "in_use");
    assert_eq!(s1["in_use_since"], ts.as_str());
    assert_eq!(json["data"]["statuses"]["s2"]["status"], "error");
    assert!(json["data"]["statuses"]["s3"].is_null());

    let history = json["data"]["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0]["old_status"].is_null());
}

#[tokio::test]
async fn history_honours_limit() {
    let app = build_test_app();
    let statuses = [
        StationStatus::Available,
        StationStatus::InUse,
        StationStatus::Available,
    ];
    for (i, status) in statuses.into_iter().enumerate() {
        app.registry
            .update("s1", "Station 1", status, &format!("t{i}"))
            .await;
    }

    let json = body_json(get(app.router, "/api/history?limit=2").await).await;
    let history = json["data"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["timestamp"], "t1");
    assert_eq!(history[1]["timestamp"], "t2");
}

#[tokio::test]
async fn history_rejects_out_of_range_limit() {
    let app = build_test_app();
    let response = get(app.router, "/api/history?limit=500").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn timeline_returns_recorded_checks() {
    let app = build_test_app();
    let ts = now_iso();
    app.timeline
        .record_check("s1", "Station 1", StationStatus::Unknown, &ts)
        .await;
    app.timeline
        .record_check("s1", "Station 1", StationStatus::Available, &ts)
        .await;

    let json = body_json(get(app.router, "/api/timeline?days=1").await).await;
    let checks = json["data"].as_array().unwrap();
    assert_eq!(checks.len(), 2);
    assert_eq!(checks[0]["status"], "unknown");
    assert_eq!(checks[1]["station_name"], "Station 1");
}

#[tokio::test]
async fn timeline_rejects_zero_days() {
    let app = build_test_app();
    let response = get(app.router, "/api/timeline?days=0").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

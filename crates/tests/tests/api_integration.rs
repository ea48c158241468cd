use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chill_api::{build_app, ApiConfig};
use chill_core::{distance_km, round2, Coordinates};
use serde_json::{json, Value};
use tower::ServiceExt;

// Nothing listens on the discard port, so every upstream call fails fast.
const DEAD_UPSTREAM: &str = "http://127.0.0.1:9";

async fn offline_app() -> Router {
    build_app(ApiConfig {
        overpass_url: format!("{DEAD_UPSTREAM}/api/interpreter"),
        osrm_url: format!("{DEAD_UPSTREAM}/route/v1/driving"),
        ollama_url: None,
        upstream_timeout: Duration::from_secs(2),
        ..ApiConfig::default()
    })
    .await
    .expect("app should build")
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, parsed)
}

fn activity(name: &str, start: &str, end: &str, lat: f64, lon: f64) -> Value {
    json!({
        "name": name,
        "start_time": start,
        "end_time": end,
        "place_name": format!("{name} place"),
        "lat": lat,
        "lon": lon,
    })
}

#[tokio::test]
async fn health_reports_metrics_and_security_headers() {
    let app = offline_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().get("x-request-id").is_some());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "trip-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.headers().get("x-request-id").unwrap(), "trip-42");

    let (_, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["capabilities"]["remote_classifier"], false);
    assert!(body["metrics"]["requests_total"].is_u64());
}

#[tokio::test]
async fn itinerary_scenario_detects_conflicts() {
    let app = offline_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/itinerary",
        Some(activity("Lunch", "12:00", "13:00", 10.77, 106.69)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (status, _) = send(
        &app,
        "POST",
        "/v1/itinerary",
        Some(activity("Coffee", "13:30", "14:00", 10.78, 106.70)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        "/v1/itinerary",
        Some(activity("Snack", "12:30", "13:00", 10.77, 106.69)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "conflict");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Lunch"));
    assert!(message.contains("12:00"));
    assert!(message.contains("13:00"));

    let (status, body) = send(&app, "GET", "/v1/itinerary", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["itinerary"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["name"], "Lunch");
    assert_eq!(entries[0]["start_time"], "12:00");
    assert_eq!(entries[0]["end_time"], "13:00");
    assert_eq!(entries[0]["lat"], 10.77);
    assert_eq!(entries[0]["lon"], 106.69);
    assert_eq!(entries[0]["place_name"], "Lunch place");
    assert_eq!(entries[1]["name"], "Coffee");

    let origin = Coordinates::new(10.762622, 106.660172);
    let lunch = Coordinates::new(10.77, 106.69);
    assert_eq!(
        entries[0]["step_distance_km"].as_f64().unwrap(),
        round2(distance_km(&origin, &lunch).unwrap())
    );
}

#[tokio::test]
async fn bad_times_are_rejected_with_400() {
    let app = offline_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/itinerary",
        Some(activity("Backwards", "14:00", "13:00", 10.77, 106.69)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");

    let (status, _) = send(
        &app,
        "POST",
        "/v1/itinerary",
        Some(activity("Typo", "25:00", "26:00", 10.77, 106.69)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_bodies_get_structured_errors() {
    let app = offline_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/itinerary",
        Some(json!({ "name": "Lunch", "start_time": "12:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "invalid_input");
    assert!(body["message"].as_str().unwrap().contains("end_time"));

    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "invalid_input");

    let (status, body) = send(&app, "GET", "/v1/itinerary/route?lat=abc&lon=1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");
}

#[tokio::test]
async fn late_evening_slot_can_end_at_midnight() {
    let app = offline_app().await;

    let (status, _) = send(
        &app,
        "POST",
        "/v1/itinerary",
        Some(activity("Rooftop bar", "22:00", "24:00", 10.77, 106.69)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        "/v1/itinerary",
        Some(activity("Night market", "23:00", "24:00", 10.78, 106.70)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("24:00"));

    let (_, body) = send(&app, "GET", "/v1/itinerary", None).await;
    assert_eq!(body["itinerary"][0]["end_time"], "24:00");
}

#[tokio::test]
async fn reset_empties_the_itinerary() {
    let app = offline_app().await;
    send(
        &app,
        "POST",
        "/v1/itinerary",
        Some(activity("Lunch", "12:00", "13:00", 10.77, 106.69)),
    )
    .await;

    let (status, body) = send(&app, "POST", "/v1/itinerary/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let (_, body) = send(&app, "GET", "/v1/itinerary", None).await;
    assert!(body["itinerary"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_router_falls_back_to_straight_line() {
    let app = offline_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/route",
        Some(json!({
            "start_lat": 10.762622,
            "start_lon": 106.660172,
            "end_lat": 10.78,
            "end_lon": 106.70,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "fallback");
    assert_eq!(body["duration_seconds"], 0);
    assert_eq!(body["route"].as_array().unwrap().len(), 2);

    let expected = round2(
        distance_km(
            &Coordinates::new(10.762622, 106.660172),
            &Coordinates::new(10.78, 106.70),
        )
        .unwrap(),
    );
    assert_eq!(body["distance_km"].as_f64().unwrap(), expected);
}

#[tokio::test]
async fn multi_route_needs_two_points() {
    let app = offline_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/route/multi",
        Some(json!({ "points": [[10.77, 106.69]] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/route/multi",
        Some(json!({ "points": [[10.77, 106.69], [10.78, 106.70], [10.79, 106.71]] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "fallback");
    assert_eq!(body["route"][0]["lat"], 10.77);
    assert_eq!(body["route"][1]["lat"], 10.79);
}

#[tokio::test]
async fn itinerary_route_plan_degrades_per_leg() {
    let app = offline_app().await;
    send(
        &app,
        "POST",
        "/v1/itinerary",
        Some(activity("Lunch", "12:00", "13:00", 10.77, 106.69)),
    )
    .await;
    send(
        &app,
        "POST",
        "/v1/itinerary",
        Some(activity("Coffee", "13:30", "14:00", 10.78, 106.70)),
    )
    .await;

    let (status, body) = send(&app, "GET", "/v1/itinerary/route", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["legs"].as_array().unwrap().len(), 2);
    assert_eq!(body["degraded_legs"], 2);
    assert_eq!(body["total_duration_seconds"], 0);
    assert_eq!(body["legs"][0]["to"], "Lunch");
}

#[tokio::test]
async fn search_with_unreachable_source_is_empty_not_an_error() {
    let app = offline_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/search",
        Some(json!({
            "lat": 10.762622,
            "lon": 106.660172,
            "category": "food",
            "filters": { "category": "food", "food_type": ["cafe"] }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["places"].as_array().unwrap().is_empty());
    assert_eq!(body["degraded"], true);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/search",
        Some(json!({ "lat": 123.0, "lon": 106.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_greets_without_a_model() {
    let app = offline_app().await;

    let (status, body) = send(&app, "POST", "/v1/chat", Some(json!({ "text": "Xin chào" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["intent"], "greeting");
    assert_eq!(body["classifier"], "keywords");
    assert!(body["reply_text"].as_str().unwrap().starts_with("Chào bạn"));

    let (status, _) = send(&app, "POST", "/v1/chat", Some(json!({ "text": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rate_limiter_rejects_bursts() {
    let app = build_app(ApiConfig {
        overpass_url: format!("{DEAD_UPSTREAM}/api/interpreter"),
        osrm_url: format!("{DEAD_UPSTREAM}/route/v1/driving"),
        rate_limit_max: 2,
        ..ApiConfig::default()
    })
    .await
    .unwrap();

    for _ in 0..2 {
        let (status, _) = send(&app, "GET", "/v1/itinerary", None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(&app, "GET", "/v1/itinerary", None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate_limited");

    let (status, _) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

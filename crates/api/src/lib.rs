pub mod config;
mod extract;
mod rate_limit;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Json, Router};
use chill_agents::{
    AddActivityRequest, AgentSettings, ChatRequest, PlannerAgent, RouteRequest, SearchRequest,
};
use chill_core::{Category, Coordinates, FilterSelection, PlannerError, DEFAULT_ORIGIN};
use chill_nlu::NluStack;
use chill_observability::{AppMetrics, MetricsSnapshot};
use chill_providers::{build_http_client, OsrmRouter, OverpassSource, PoiQuery};
use chill_storage::MemoryItineraryStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use crate::config::ApiConfig;
use crate::extract::{ApiJson, ApiQuery};
use crate::rate_limit::IpRateLimiter;

const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_CHAT_TEXT_LEN: usize = 2_000;
const DEFAULT_RAW_RADIUS_KM: f64 = 5.0;
const DEFAULT_RAW_LIMIT: usize = 10;
const MAX_RAW_LIMIT: usize = 100;

pub type LiveAgent = PlannerAgent<OverpassSource, OsrmRouter, NluStack>;

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<LiveAgent>,
    pub metrics: Arc<AppMetrics>,
    pub limiter: IpRateLimiter,
    pub allowed_origins: Arc<Vec<String>>,
    pub remote_classifier: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    remote_classifier: bool,
    classifier: &'static str,
    filtered_search: bool,
    routing_fallback: bool,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    lat: f64,
    lon: f64,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    filters: Option<FilterSelection>,
    #[serde(default)]
    radius_km: Option<f64>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawSearchBody {
    query: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    radius_km: Option<f64>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RouteBody {
    start_lat: f64,
    start_lon: f64,
    end_lat: f64,
    end_lon: f64,
    #[serde(default)]
    waypoints: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct MultiRouteBody {
    points: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OriginQuery {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    text: String,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

pub async fn build_app(config: ApiConfig) -> Result<Router> {
    let metrics = AppMetrics::shared();
    let client = build_http_client(config.upstream_timeout)
        .context("failed to build upstream HTTP client")?;

    let classifier = match config.ollama_url.as_deref() {
        Some(base_url) => NluStack::remote(client.clone(), base_url, config.ollama_model.clone()),
        None => NluStack::keyword(),
    };
    let remote_classifier = classifier.remote_enabled();

    let agent = Arc::new(PlannerAgent::new(
        Arc::new(OverpassSource::new(client.clone(), config.overpass_url.clone())),
        Arc::new(OsrmRouter::new(client, config.osrm_url.clone())),
        Arc::new(classifier),
        MemoryItineraryStore::new(),
        metrics.clone(),
        AgentSettings {
            default_origin: DEFAULT_ORIGIN,
            search_radius_km: config.search_radius_km,
            search_limit: config.search_limit,
        },
    ));

    info!(
        overpass = %config.overpass_url,
        osrm = %config.osrm_url,
        remote_classifier,
        timeout_secs = config.upstream_timeout.as_secs(),
        "planner agent ready"
    );

    let state = ApiState {
        agent,
        metrics,
        limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
        allowed_origins: Arc::new(config.allowed_origins),
        remote_classifier,
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/search", post(search))
        .route("/v1/search/osm", post(search_osm))
        .route("/v1/itinerary", get(itinerary_list).post(itinerary_add))
        .route("/v1/itinerary/reset", post(itinerary_reset))
        .route("/v1/itinerary/route", get(itinerary_route))
        .route("/v1/route", post(route))
        .route("/v1/route/multi", post(route_multi))
        .route("/v1/chat", post(chat))
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            remote_classifier: state.remote_classifier,
            classifier: state.agent.classifier_name(),
            filtered_search: true,
            routing_fallback: true,
        },
    };
    (StatusCode::OK, Json(payload))
}

async fn search(State(state): State<ApiState>, ApiJson(body): ApiJson<SearchBody>) -> Response {
    let origin = Coordinates::new(body.lat, body.lon);
    if !origin.is_valid() {
        return invalid_coordinates(origin);
    }

    let category = match body.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => match Category::parse(raw) {
            Some(category) => Some(category),
            None => {
                return error_response(PlannerError::InvalidInput(format!(
                    "unknown category '{raw}'"
                )))
            }
        },
    };

    let response = state
        .agent
        .search(SearchRequest {
            origin: Some(origin),
            query: body.keyword,
            category,
            filters: body.filters,
            radius_km: body.radius_km.filter(|radius| radius.is_finite() && *radius > 0.0),
            limit: body.limit,
        })
        .await;

    (StatusCode::OK, Json(response)).into_response()
}

async fn search_osm(
    State(state): State<ApiState>,
    ApiJson(body): ApiJson<RawSearchBody>,
) -> Response {
    let origin = Coordinates::new(body.lat, body.lon);
    if !origin.is_valid() {
        return invalid_coordinates(origin);
    }

    let response = state
        .agent
        .search_raw(PoiQuery {
            text: body.query,
            origin,
            radius_km: body
                .radius_km
                .filter(|radius| radius.is_finite() && *radius > 0.0)
                .unwrap_or(DEFAULT_RAW_RADIUS_KM),
            limit: body.limit.unwrap_or(DEFAULT_RAW_LIMIT).clamp(1, MAX_RAW_LIMIT),
        })
        .await;

    (StatusCode::OK, Json(response)).into_response()
}

async fn itinerary_list(State(state): State<ApiState>) -> Response {
    let itinerary = state.agent.itinerary().await;
    (StatusCode::OK, Json(json!({ "itinerary": itinerary }))).into_response()
}

async fn itinerary_add(
    State(state): State<ApiState>,
    ApiJson(body): ApiJson<AddActivityRequest>,
) -> Response {
    if body.name.trim().is_empty() {
        return error_response(PlannerError::InvalidInput(
            "activity name must not be empty".to_string(),
        ));
    }

    match state.agent.add_activity(body).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn itinerary_reset(State(state): State<ApiState>) -> Response {
    state.agent.reset_itinerary().await;
    (StatusCode::OK, Json(json!({ "status": "success" }))).into_response()
}

async fn itinerary_route(
    State(state): State<ApiState>,
    ApiQuery(query): ApiQuery<OriginQuery>,
) -> Response {
    let origin = match (query.lat, query.lon) {
        (Some(lat), Some(lon)) => {
            let origin = Coordinates::new(lat, lon);
            if !origin.is_valid() {
                return invalid_coordinates(origin);
            }
            Some(origin)
        }
        (None, None) => None,
        _ => {
            return error_response(PlannerError::InvalidInput(
                "lat and lon must be given together".to_string(),
            ))
        }
    };

    let plan = state.agent.itinerary_route_plan(origin).await;
    (StatusCode::OK, Json(plan)).into_response()
}

async fn route(State(state): State<ApiState>, ApiJson(body): ApiJson<RouteBody>) -> Response {
    let request = RouteRequest {
        start: Coordinates::new(body.start_lat, body.start_lon),
        end: Coordinates::new(body.end_lat, body.end_lon),
        waypoints: body.waypoints.into_iter().map(Coordinates::from).collect(),
    };

    match state.agent.route(request).await {
        Ok(route) => (StatusCode::OK, Json(route)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn route_multi(
    State(state): State<ApiState>,
    ApiJson(body): ApiJson<MultiRouteBody>,
) -> Response {
    let points = body
        .points
        .into_iter()
        .map(Coordinates::from)
        .collect::<Vec<_>>();

    match state.agent.route_multi(&points).await {
        Ok(route) => (StatusCode::OK, Json(route)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn chat(State(state): State<ApiState>, ApiJson(body): ApiJson<ChatBody>) -> Response {
    let text = body.text.trim();
    if text.is_empty() {
        return error_response(PlannerError::InvalidInput("text must not be empty".to_string()));
    }
    if text.chars().count() > MAX_CHAT_TEXT_LEN {
        return error_response(PlannerError::InvalidInput(format!(
            "text longer than {MAX_CHAT_TEXT_LEN} characters"
        )));
    }

    let origin = match (body.lat, body.lon) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)).filter(Coordinates::is_valid),
        _ => None,
    };

    let reply = state
        .agent
        .handle_chat(ChatRequest {
            text: text.to_string(),
            origin,
        })
        .await;
    (StatusCode::OK, Json(reply)).into_response()
}

fn invalid_coordinates(origin: Coordinates) -> Response {
    error_response(PlannerError::InvalidInput(format!(
        "invalid coordinates ({}, {})",
        origin.lat, origin.lon
    )))
}

pub(crate) fn error_response(err: PlannerError) -> Response {
    let status = match &err {
        PlannerError::Conflict { .. } => StatusCode::CONFLICT,
        PlannerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        PlannerError::UpstreamUnavailable(_) | PlannerError::MalformedUpstreamResponse(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(json!({
            "status": "error",
            "error": err.code(),
            "message": err.to_string(),
        })),
    )
        .into_response()
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:8501")]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if !state.limiter.allow(&ip) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "status": "error",
                "error": "rate_limited",
                "message": "rate limit exceeded for this IP"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'; base-uri 'none'"),
    );

    response
}

mod osrm;
mod overpass;

use std::time::Duration;

use chill_core::{
    distance_km, round2, Coordinates, PlannerError, PointOfInterest, RouteResult, RouteSource,
};
use reqwest::Client;
use tracing::warn;

pub use osrm::{parse_osrm_response, OsrmRouter};
pub use overpass::{
    overpass_selector, parse_overpass_elements, OverpassSource, OVERPASS_SOURCE_LABEL,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PoiQuery {
    pub text: String,
    pub origin: Coordinates,
    pub radius_km: f64,
    pub limit: usize,
}

pub trait PoiSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, query: &PoiQuery) -> Result<Vec<PointOfInterest>, PlannerError>;
}

pub trait RouteProvider: Send + Sync {
    fn name(&self) -> &'static str;
    /// Routes through `points` in order; the first is the start and the last the end.
    async fn route(&self, points: &[Coordinates]) -> Result<RouteResult, PlannerError>;
}

pub fn build_http_client(timeout: Duration) -> Result<Client, PlannerError> {
    Client::builder()
        .connect_timeout(timeout.min(Duration::from_secs(6)))
        .timeout(timeout)
        .user_agent(concat!("eat-chill-planner/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| PlannerError::InvalidInput(format!("failed to build HTTP client: {err}")))
}

/// Straight line between the endpoints, used whenever routing is unavailable.
pub fn straight_line_fallback(start: Coordinates, end: Coordinates) -> RouteResult {
    RouteResult {
        route: vec![start, end],
        distance_km: distance_km(&start, &end).map(round2).unwrap_or(0.0),
        duration_seconds: 0,
        duration_minutes: 0.0,
        source: RouteSource::Fallback,
    }
}

/// One routing attempt; any failure degrades to the straight-line fallback.
pub async fn route_or_fallback<R: RouteProvider>(
    provider: &R,
    start: Coordinates,
    end: Coordinates,
    waypoints: &[Coordinates],
) -> RouteResult {
    let mut points = Vec::with_capacity(waypoints.len() + 2);
    points.push(start);
    points.extend_from_slice(waypoints);
    points.push(end);

    match provider.route(&points).await {
        Ok(route) => route,
        Err(err) => {
            warn!(provider = provider.name(), error = %err, "routing failed, using straight line");
            straight_line_fallback(start, end)
        }
    }
}

/// Routes an ordered list of stops: first is the start, last the end, the rest waypoints.
pub async fn route_multi<R: RouteProvider>(
    provider: &R,
    points: &[Coordinates],
) -> Result<RouteResult, PlannerError> {
    let [start, waypoints @ .., end] = points else {
        return Err(PlannerError::InvalidInput(format!(
            "need at least 2 points, got {}",
            points.len()
        )));
    };

    Ok(route_or_fallback(provider, *start, *end, waypoints).await)
}

use chill_core::{round2, Coordinates, PlannerError, RouteResult, RouteSource};
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::RouteProvider;

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<[f64; 2]>,
}

/// Reads the first route of an OSRM reply. GeoJSON pairs are `[lon, lat]`.
pub fn parse_osrm_response(body: &str) -> Result<RouteResult, PlannerError> {
    let response: OsrmResponse = serde_json::from_str(body)
        .map_err(|err| PlannerError::MalformedUpstreamResponse(format!("osrm: {err}")))?;

    if response.code != "Ok" {
        return Err(PlannerError::UpstreamUnavailable(format!(
            "osrm answered {}: {}",
            response.code,
            response.message.unwrap_or_default()
        )));
    }

    let route = response.routes.into_iter().next().ok_or_else(|| {
        PlannerError::MalformedUpstreamResponse("osrm: no routes in reply".to_string())
    })?;

    let polyline = route
        .geometry
        .map(|geometry| {
            geometry
                .coordinates
                .into_iter()
                .map(|[lon, lat]| Coordinates::new(lat, lon))
                .collect()
        })
        .unwrap_or_default();

    Ok(RouteResult {
        route: polyline,
        distance_km: round2(route.distance / 1000.0),
        duration_seconds: route.duration.max(0.0) as u64,
        duration_minutes: (route.duration / 60.0 * 10.0).round() / 10.0,
        source: RouteSource::Osrm,
    })
}

#[derive(Clone)]
pub struct OsrmRouter {
    client: Client,
    base_url: String,
}

impl OsrmRouter {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn route_url(&self, points: &[Coordinates]) -> String {
        let path = points
            .iter()
            .map(|point| format!("{},{}", point.lon, point.lat))
            .collect::<Vec<_>>()
            .join(";");
        format!("{}/{path}", self.base_url)
    }
}

impl RouteProvider for OsrmRouter {
    fn name(&self) -> &'static str {
        "osrm"
    }

    #[instrument(skip(self, points), fields(points = points.len()))]
    async fn route(&self, points: &[Coordinates]) -> Result<RouteResult, PlannerError> {
        if points.len() < 2 {
            return Err(PlannerError::InvalidInput(
                "a route needs a start and an end".to_string(),
            ));
        }

        let response = self
            .client
            .get(self.route_url(points))
            .query(&[
                ("overview", "full"),
                ("steps", "true"),
                ("geometries", "geojson"),
            ])
            .send()
            .await
            .map_err(|err| PlannerError::UpstreamUnavailable(format!("osrm: {err}")))?;

        // OSRM reports failures such as NoRoute in the body with a 400 status.
        let body = response
            .text()
            .await
            .map_err(|err| PlannerError::UpstreamUnavailable(format!("osrm: {err}")))?;
        parse_osrm_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flips_geojson_pairs_and_converts_units() {
        let body = r#"{
            "code": "Ok",
            "routes": [{
                "distance": 3456.7,
                "duration": 612.9,
                "geometry": {"type": "LineString", "coordinates": [[106.66, 10.76], [106.69, 10.77]]}
            }]
        }"#;

        let route = parse_osrm_response(body).unwrap();
        assert_eq!(route.source, RouteSource::Osrm);
        assert_eq!(
            route.route,
            vec![Coordinates::new(10.76, 106.66), Coordinates::new(10.77, 106.69)]
        );
        assert_eq!(route.distance_km, 3.46);
        assert_eq!(route.duration_seconds, 612);
        assert_eq!(route.duration_minutes, 10.2);
    }

    #[test]
    fn non_ok_code_is_an_upstream_failure() {
        let err = parse_osrm_response(r#"{"code": "NoRoute", "message": "Impossible route"}"#)
            .unwrap_err();
        assert!(matches!(err, PlannerError::UpstreamUnavailable(ref msg) if msg.contains("NoRoute")));
    }

    #[test]
    fn missing_routes_or_garbage_is_malformed() {
        assert!(matches!(
            parse_osrm_response(r#"{"code": "Ok", "routes": []}"#),
            Err(PlannerError::MalformedUpstreamResponse(_))
        ));
        assert!(matches!(
            parse_osrm_response("Bad Gateway"),
            Err(PlannerError::MalformedUpstreamResponse(_))
        ));
    }

    #[test]
    fn url_lists_lon_lat_pairs() {
        let router = OsrmRouter::new(Client::new(), "http://osrm.local/route/v1/driving/");
        let url = router.route_url(&[Coordinates::new(10.5, 106.5), Coordinates::new(10.7, 106.7)]);
        assert_eq!(url, "http://osrm.local/route/v1/driving/106.5,10.5;106.7,10.7");
    }
}

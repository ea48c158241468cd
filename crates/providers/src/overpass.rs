use chill_core::{
    distance_km, round2, BoundingBox, Coordinates, PlannerError, PointOfInterest, Tags,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{PoiQuery, PoiSource};

pub const OVERPASS_SOURCE_LABEL: &str = "OpenStreetMap (Overpass)";
const DEFAULT_SELECTOR: &str = "amenity=restaurant";

// First match wins, so longer and more specific keywords come first.
const SELECTORS: &[(&str, &str)] = &[
    ("nhà hàng", "amenity=restaurant"),
    ("cà phê", "amenity=cafe"),
    ("triển lãm", "tourism=gallery"),
    ("bảo tàng", "tourism=museum"),
    ("trung tâm thương mại", "shop=mall"),
    ("restaurant", "amenity=restaurant"),
    ("coffee", "amenity=cafe"),
    ("cafe", "amenity=cafe"),
    ("buffet", "amenity=restaurant"),
    ("bar", "amenity=bar"),
    ("pub", "amenity=pub"),
    ("cinema", "amenity=cinema"),
    ("phim", "amenity=cinema"),
    ("karaoke", "amenity=karaoke_box"),
    ("museum", "tourism=museum"),
    ("gallery", "tourism=gallery"),
    ("gym", "leisure=fitness_centre"),
    ("sport", "leisure=sports_centre"),
    ("thể thao", "leisure=sports_centre"),
    ("mall", "shop=mall"),
    ("mua sắm", "shop=mall"),
    ("giải trí", "amenity=cinema"),
    ("quán", "amenity=restaurant"),
    ("ăn", "amenity=restaurant"),
];

/// Tag selector for free query text; unmatched text searches restaurants.
pub fn overpass_selector(text: &str) -> &'static str {
    let lower = text.trim().to_lowercase();
    SELECTORS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, selector)| *selector)
        .unwrap_or(DEFAULT_SELECTOR)
}

fn build_query(selector: &str, bbox: &BoundingBox) -> String {
    let bbox = bbox.to_overpass();
    format!(
        "[out:json];\n(\n  node[{selector}]({bbox});\n  way[{selector}]({bbox});\n  relation[{selector}]({bbox});\n);\nout center;"
    )
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    id: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<Center>,
    #[serde(default)]
    tags: Tags,
}

#[derive(Debug, Deserialize)]
struct Center {
    lat: f64,
    lon: f64,
}

impl OverpassElement {
    fn position(&self) -> Option<Coordinates> {
        match (&self.center, self.lat, self.lon) {
            (Some(center), _, _) => Some(Coordinates::new(center.lat, center.lon)),
            (None, Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

/// Turns an Overpass JSON body into nearest-first places within the query radius.
pub fn parse_overpass_elements(
    body: &str,
    query: &PoiQuery,
) -> Result<Vec<PointOfInterest>, PlannerError> {
    let response: OverpassResponse = serde_json::from_str(body)
        .map_err(|err| PlannerError::MalformedUpstreamResponse(format!("overpass: {err}")))?;

    let mut places = response
        .elements
        .into_iter()
        .filter_map(|element| {
            let coordinates = element.position()?;
            let distance = distance_km(&query.origin, &coordinates).ok()?;
            if distance > query.radius_km {
                return None;
            }

            let name = element
                .tags
                .get("name")
                .filter(|name| !name.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| "Unnamed".to_string());
            let address = element
                .tags
                .get("addr:full")
                .cloned()
                .unwrap_or_else(|| name.clone());
            let rating = element
                .tags
                .get("rating")
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|rating| rating.is_finite());
            let kind = if element.kind.is_empty() {
                "node"
            } else {
                element.kind.as_str()
            };

            Some(PointOfInterest {
                id: format!("{kind}/{}", element.id),
                name,
                address,
                coordinates,
                distance_km: round2(distance),
                rating,
                tags: element.tags,
                source: OVERPASS_SOURCE_LABEL.to_string(),
            })
        })
        .collect::<Vec<_>>();

    places.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    places.truncate(query.limit);
    Ok(places)
}

#[derive(Clone)]
pub struct OverpassSource {
    client: Client,
    endpoint: String,
}

impl OverpassSource {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl PoiSource for OverpassSource {
    fn name(&self) -> &'static str {
        "overpass"
    }

    #[instrument(skip(self, query), fields(text = %query.text, radius_km = query.radius_km))]
    async fn search(&self, query: &PoiQuery) -> Result<Vec<PointOfInterest>, PlannerError> {
        let selector = overpass_selector(&query.text);
        let bbox = BoundingBox::around(&query.origin, query.radius_km);
        debug!(selector, "querying overpass");

        let response = self
            .client
            .post(&self.endpoint)
            .body(build_query(selector, &bbox))
            .send()
            .await
            .map_err(|err| PlannerError::UpstreamUnavailable(format!("overpass: {err}")))?;

        if !response.status().is_success() {
            return Err(PlannerError::UpstreamUnavailable(format!(
                "overpass returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|err| PlannerError::UpstreamUnavailable(format!("overpass: {err}")))?;
        parse_overpass_elements(&body, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: usize) -> PoiQuery {
        PoiQuery {
            text: "phở".to_string(),
            origin: Coordinates::new(10.762622, 106.660172),
            radius_km: 5.0,
            limit,
        }
    }

    const BODY: &str = r#"{
        "elements": [
            {"type": "node", "id": 1, "lat": 10.7800, "lon": 106.6900,
             "tags": {"name": "Far Pho", "amenity": "restaurant", "rating": "4.5"}},
            {"type": "way", "id": 2, "center": {"lat": 10.7630, "lon": 106.6610},
             "tags": {"name": "Near Cafe", "amenity": "cafe", "addr:full": "1 Nguyen Trai"}},
            {"type": "relation", "id": 3, "tags": {"name": "No position"}},
            {"type": "node", "id": 4, "lat": 11.5, "lon": 107.5, "tags": {"name": "Out of range"}},
            {"type": "node", "id": 5, "lat": 10.7700, "lon": 106.6700, "tags": {"rating": "great"}}
        ]
    }"#;

    #[test]
    fn selector_prefers_specific_keywords() {
        assert_eq!(overpass_selector("Quán cà phê yên tĩnh"), "amenity=cafe");
        assert_eq!(overpass_selector("karaoke"), "amenity=karaoke_box");
        assert_eq!(overpass_selector("phở"), DEFAULT_SELECTOR);
        assert_eq!(overpass_selector(""), DEFAULT_SELECTOR);
    }

    #[test]
    fn query_covers_all_element_kinds() {
        let bbox = BoundingBox::around(&Coordinates::new(10.0, 106.0), 5.0);
        let text = build_query("amenity=cafe", &bbox);
        assert!(text.starts_with("[out:json];"));
        assert!(text.contains("node[amenity=cafe]"));
        assert!(text.contains("way[amenity=cafe]"));
        assert!(text.contains("relation[amenity=cafe]"));
        assert!(text.ends_with("out center;"));
    }

    #[test]
    fn parses_nodes_and_centers_nearest_first() {
        let places = parse_overpass_elements(BODY, &query(10)).unwrap();
        let names = places.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Near Cafe", "Unnamed", "Far Pho"]);

        assert_eq!(places[0].id, "way/2");
        assert_eq!(places[0].address, "1 Nguyen Trai");
        assert_eq!(places[0].source, OVERPASS_SOURCE_LABEL);
        assert_eq!(places[1].rating, None);
        assert_eq!(places[2].rating, Some(4.5));
        assert_eq!(places[2].address, "Far Pho");
        assert_eq!(places[2].tags.get("amenity").map(String::as_str), Some("restaurant"));
    }

    #[test]
    fn limit_applies_after_sorting() {
        let places = parse_overpass_elements(BODY, &query(1)).unwrap();
        assert_eq!(places.len(), 1);
        assert_eq!(places[0].name, "Near Cafe");
    }

    #[test]
    fn empty_and_broken_bodies() {
        assert!(parse_overpass_elements("{}", &query(10)).unwrap().is_empty());
        let err = parse_overpass_elements("<html>busy</html>", &query(10)).unwrap_err();
        assert!(matches!(err, PlannerError::MalformedUpstreamResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_upstream_unavailable() {
        let source = OverpassSource::new(Client::new(), "http://127.0.0.1:9/api/interpreter");
        let err = source.search(&query(10)).await.unwrap_err();
        assert!(err.is_upstream());
    }
}

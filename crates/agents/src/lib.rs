use std::sync::Arc;
use std::time::Instant;

use chill_core::{
    apply_filters, classify_intent_rules, normalize_text, round2, Category, Coordinates,
    FilterSelection, FilterSet, Intent, IntentEntities, ItineraryEntry, PlannerError,
    PointOfInterest, RouteResult, RouteSource, ScheduledActivity, TimeOfDay, DEFAULT_ORIGIN,
    DISPLAY_LIMIT,
};
use chill_nlu::{Classification, IntentClassifier};
use chill_observability::AppMetrics;
use chill_providers::{route_multi, route_or_fallback, PoiQuery, PoiSource, RouteProvider};
use chill_storage::{ItineraryRepository, MemoryItineraryStore};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

const WELCOME: &str = "Chào bạn! Mình là trợ lý Eat & Chill. Bạn cần tìm quán ăn hay chỗ chơi?";
const SCHEDULE_HINT: &str =
    "Bạn có thể thêm hoạt động vào lịch trình qua POST /v1/itinerary (tên, giờ bắt đầu, giờ kết thúc, địa điểm).";
const UNKNOWN_HINT: &str = "Xin lỗi, mình chưa hiểu ý bạn. Bạn thử hỏi 'Tìm quán lẩu' xem sao?";
const NOTHING_FOUND: &str = "Mình tìm rồi nhưng không thấy quán nào phù hợp.";
const CHAT_SUMMARY_SIZE: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct AgentSettings {
    pub default_origin: Coordinates,
    pub search_radius_km: f64,
    pub search_limit: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            default_origin: DEFAULT_ORIGIN,
            search_radius_km: 5.0,
            search_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    pub origin: Option<Coordinates>,
    pub query: Option<String>,
    pub category: Option<Category>,
    pub filters: Option<FilterSelection>,
    pub radius_km: Option<f64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub places: Vec<PointOfInterest>,
    pub source: &'static str,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddActivityRequest {
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub place_name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityAck {
    pub status: &'static str,
    pub message: String,
    pub activity_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteRequest {
    pub start: Coordinates,
    pub end: Coordinates,
    #[serde(default)]
    pub waypoints: Vec<Coordinates>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteLeg {
    pub from: String,
    pub to: String,
    pub route: RouteResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutePlan {
    pub origin: Coordinates,
    pub legs: Vec<RouteLeg>,
    pub total_distance_km: f64,
    pub total_duration_seconds: u64,
    pub total_duration_minutes: u64,
    pub degraded_legs: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    #[serde(default)]
    pub origin: Option<Coordinates>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub reply_text: String,
    pub intent: Intent,
    pub entities: IntentEntities,
    pub places: Vec<PointOfInterest>,
    pub classifier: &'static str,
}

/// Orchestrates search, scheduling, routing and chat over pluggable upstreams.
pub struct PlannerAgent<P, R, C> {
    source: Arc<P>,
    router: Arc<R>,
    classifier: Arc<C>,
    store: MemoryItineraryStore,
    metrics: Arc<AppMetrics>,
    settings: AgentSettings,
}

impl<P, R, C> Clone for PlannerAgent<P, R, C> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            router: Arc::clone(&self.router),
            classifier: Arc::clone(&self.classifier),
            store: self.store.clone(),
            metrics: Arc::clone(&self.metrics),
            settings: self.settings,
        }
    }
}

impl<P, R, C> PlannerAgent<P, R, C>
where
    P: PoiSource,
    R: RouteProvider,
    C: IntentClassifier,
{
    pub fn new(
        source: Arc<P>,
        router: Arc<R>,
        classifier: Arc<C>,
        store: MemoryItineraryStore,
        metrics: Arc<AppMetrics>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            source,
            router,
            classifier,
            store,
            metrics,
            settings,
        }
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// Filtered search. Upstream failures degrade to an empty list.
    #[instrument(skip(self, request), fields(query = ?request.query, category = ?request.category))]
    pub async fn search(&self, request: SearchRequest) -> SearchResponse {
        let started = Instant::now();
        self.metrics.inc_request();

        let category = request.category.unwrap_or(Category::Food);
        let text = request
            .query
            .as_deref()
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
            .unwrap_or_else(|| category.default_query())
            .to_string();
        let query = PoiQuery {
            text,
            origin: request.origin.unwrap_or(self.settings.default_origin),
            radius_km: request.radius_km.unwrap_or(self.settings.search_radius_km),
            limit: self.settings.search_limit,
        };

        // The filter form carries its own category; without one it follows the request.
        let filters = request.filters.as_ref().map(|selection| {
            FilterSet::from_selection(selection.category().unwrap_or(category), selection)
        });
        let cap = request.limit.unwrap_or(DISPLAY_LIMIT).min(DISPLAY_LIMIT);

        let (raw, degraded) = match self.source.search(&query).await {
            Ok(places) => (places, false),
            Err(err) => {
                warn!(source = self.source.name(), error = %err, "poi search failed, returning no places");
                self.metrics.inc_upstream_fallback(self.source.name());
                (Vec::new(), true)
            }
        };
        let fetched = raw.len();
        let places = apply_filters(raw, filters.as_ref(), cap);

        self.metrics.add_poi_results(places.len());
        self.metrics.observe_latency(started.elapsed());
        info!(
            text = %query.text,
            fetched,
            returned = places.len(),
            filtered = filters.is_some(),
            degraded,
            "search handled"
        );

        SearchResponse {
            places,
            source: self.source.name(),
            degraded,
        }
    }

    /// Unfiltered passthrough to the POI source.
    #[instrument(skip(self, query), fields(text = %query.text))]
    pub async fn search_raw(&self, query: PoiQuery) -> SearchResponse {
        self.metrics.inc_request();
        match self.source.search(&query).await {
            Ok(places) => {
                self.metrics.add_poi_results(places.len());
                SearchResponse {
                    places,
                    source: self.source.name(),
                    degraded: false,
                }
            }
            Err(err) => {
                warn!(source = self.source.name(), error = %err, "raw poi search failed");
                self.metrics.inc_upstream_fallback(self.source.name());
                SearchResponse {
                    places: Vec::new(),
                    source: self.source.name(),
                    degraded: true,
                }
            }
        }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn add_activity(
        &self,
        request: AddActivityRequest,
    ) -> Result<ActivityAck, PlannerError> {
        self.metrics.inc_request();

        let start = request.start_time.parse::<TimeOfDay>()?;
        let end = request.end_time.parse::<TimeOfDay>()?;
        let activity = ScheduledActivity::new(
            request.name.trim(),
            request.place_name.trim(),
            start,
            end,
            Coordinates::new(request.lat, request.lon),
        );

        match self.store.add(activity).await {
            Ok(activity_id) => {
                info!(%activity_id, %start, %end, "activity scheduled");
                Ok(ActivityAck {
                    status: "success",
                    message: format!("Đã thêm '{}' vào lịch trình!", request.name.trim()),
                    activity_id,
                })
            }
            Err(err) => {
                if matches!(err, PlannerError::Conflict { .. }) {
                    self.metrics.inc_itinerary_conflict();
                }
                info!(error = %err, "activity rejected");
                Err(err)
            }
        }
    }

    pub async fn itinerary(&self) -> Vec<ItineraryEntry> {
        self.store.list(self.settings.default_origin).await
    }

    pub async fn reset_itinerary(&self) {
        self.store.reset().await;
        info!("itinerary reset");
    }

    #[instrument(skip(self, request), fields(waypoints = request.waypoints.len()))]
    pub async fn route(&self, request: RouteRequest) -> Result<RouteResult, PlannerError> {
        self.metrics.inc_request();
        ensure_valid(
            std::iter::once(&request.start)
                .chain(&request.waypoints)
                .chain(std::iter::once(&request.end)),
        )?;

        let route =
            route_or_fallback(&*self.router, request.start, request.end, &request.waypoints).await;
        self.count_route_fallback(&route);
        Ok(route)
    }

    #[instrument(skip(self, points), fields(points = points.len()))]
    pub async fn route_multi(&self, points: &[Coordinates]) -> Result<RouteResult, PlannerError> {
        self.metrics.inc_request();
        ensure_valid(points)?;

        let route = route_multi(&*self.router, points).await?;
        self.count_route_fallback(&route);
        Ok(route)
    }

    /// Routes the day leg by leg: origin to the first stop, then stop to stop.
    /// Legs are requested concurrently and degrade independently.
    #[instrument(skip(self))]
    pub async fn itinerary_route_plan(&self, origin: Option<Coordinates>) -> RoutePlan {
        self.metrics.inc_request();
        let origin = origin.unwrap_or(self.settings.default_origin);
        let entries = self.store.list(origin).await;

        let mut stops = Vec::with_capacity(entries.len() + 1);
        stops.push(("origin".to_string(), origin));
        stops.extend(
            entries
                .into_iter()
                .map(|entry| (entry.activity.activity_name, entry.activity.coordinates)),
        );

        let routes = join_all(
            stops
                .windows(2)
                .map(|pair| route_or_fallback(&*self.router, pair[0].1, pair[1].1, &[])),
        )
        .await;

        let legs = stops
            .windows(2)
            .zip(routes)
            .map(|(pair, route)| {
                self.count_route_fallback(&route);
                RouteLeg {
                    from: pair[0].0.clone(),
                    to: pair[1].0.clone(),
                    route,
                }
            })
            .collect::<Vec<_>>();

        let total_distance_km = round2(legs.iter().map(|leg| leg.route.distance_km).sum());
        let total_duration_seconds = legs.iter().map(|leg| leg.route.duration_seconds).sum::<u64>();
        let degraded_legs = legs
            .iter()
            .filter(|leg| leg.route.source == RouteSource::Fallback)
            .count();

        info!(legs = legs.len(), degraded_legs, total_distance_km, "itinerary routed");
        RoutePlan {
            origin,
            legs,
            total_distance_km,
            total_duration_seconds,
            total_duration_minutes: total_duration_seconds / 60,
            degraded_legs,
        }
    }

    #[instrument(skip(self, request))]
    pub async fn handle_chat(&self, request: ChatRequest) -> ChatReply {
        let started = Instant::now();
        self.metrics.inc_request();
        let text = normalize_text(&request.text);

        let (intent, entities, classifier) = match self.classifier.classify(&text).await {
            Classification::Classified {
                intent,
                entities,
                model,
            } => {
                if model != self.classifier.name() {
                    self.metrics.inc_classifier_fallback();
                }
                (intent, entities, model)
            }
            Classification::Unclassifiable { reason } => {
                warn!(%reason, "classifier gave up, using keyword rules");
                self.metrics.inc_classifier_fallback();
                let (intent, entities) = classify_intent_rules(&text);
                (intent, entities, "keywords")
            }
        };

        let (reply_text, places) = match intent {
            Intent::Greeting => (WELCOME.to_string(), Vec::new()),
            Intent::Search => {
                let response = self
                    .search(SearchRequest {
                        origin: request.origin,
                        query: entities.keyword.clone(),
                        category: Some(entities.category.unwrap_or(Category::Food)),
                        ..SearchRequest::default()
                    })
                    .await;
                (summarize_places(&response.places), response.places)
            }
            Intent::ScheduleAdd => (SCHEDULE_HINT.to_string(), Vec::new()),
            Intent::Unknown => (UNKNOWN_HINT.to_string(), Vec::new()),
        };

        self.metrics.observe_latency(started.elapsed());
        info!(intent = ?intent, classifier, places = places.len(), "chat handled");

        ChatReply {
            reply_text,
            intent,
            entities,
            places,
            classifier,
        }
    }

    fn count_route_fallback(&self, route: &RouteResult) {
        if route.source == RouteSource::Fallback {
            self.metrics.inc_upstream_fallback(self.router.name());
        }
    }
}

fn ensure_valid<'a>(points: impl IntoIterator<Item = &'a Coordinates>) -> Result<(), PlannerError> {
    match points.into_iter().find(|point| !point.is_valid()) {
        Some(point) => Err(PlannerError::InvalidInput(format!(
            "invalid coordinates ({}, {})",
            point.lat, point.lon
        ))),
        None => Ok(()),
    }
}

fn summarize_places(places: &[PointOfInterest]) -> String {
    if places.is_empty() {
        return NOTHING_FOUND.to_string();
    }

    let mut reply = format!("Mình tìm thấy {} địa điểm cho bạn:\n", places.len());
    for place in places.iter().take(CHAT_SUMMARY_SIZE) {
        let rating = place
            .rating
            .map(|rating| rating.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        reply.push_str(&format!(
            "- {} ({}km) - ⭐{}\n  Địa chỉ: {}\n",
            place.name, place.distance_km, rating, place.address
        ));
    }
    reply
}

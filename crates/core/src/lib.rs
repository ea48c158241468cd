pub mod error;
pub mod filters;
pub mod geo;
pub mod intent;
pub mod itinerary;
pub mod models;

pub use error::{PlannerError, PlannerResult};
pub use filters::{apply_filters, matches, DISPLAY_LIMIT};
pub use geo::{distance_km, round2, BoundingBox};
pub use intent::{classify_intent_rules, normalize_text};
pub use itinerary::{Itinerary, DEFAULT_ORIGIN};
pub use models::*;

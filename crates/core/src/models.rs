use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::PlannerError;

pub type Tags = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl From<[f64; 2]> for Coordinates {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: String,
    pub name: String,
    pub address: String,
    pub coordinates: Coordinates,
    pub distance_km: f64,
    pub rating: Option<f64>,
    pub tags: Tags,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Food,
    Entertainment,
}

impl Category {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "food" | "eat" | "ăn uống" | "an uong" => Some(Self::Food),
            "entertainment" | "chill" | "play" | "giải trí" | "giai tri" => {
                Some(Self::Entertainment)
            }
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Entertainment => "entertainment",
        }
    }

    /// Query text sent to the POI source when the caller gave no keyword.
    pub fn default_query(self) -> &'static str {
        match self {
            Self::Food => "restaurant",
            Self::Entertainment => "giải trí",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodType {
    Restaurant,
    Cafe,
    Bar,
    Buffet,
}

impl FoodType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "restaurant" | "eatery" | "quán ăn" | "nhà hàng" => Some(Self::Restaurant),
            "cafe" | "café" | "coffee" | "drinks" | "beverage" | "đồ uống" => Some(Self::Cafe),
            "bar" | "pub" => Some(Self::Bar),
            "buffet" => Some(Self::Buffet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cuisine {
    Vietnamese,
    Asian,
    European,
    Vegetarian,
}

impl Cuisine {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "vietnamese" | "món việt" | "mon viet" => Some(Self::Vietnamese),
            "asian" | "món á" | "mon á" | "mon a" => Some(Self::Asian),
            "european" | "western" | "món âu" | "mon âu" | "mon au" => Some(Self::European),
            "vegetarian" | "vegan" | "chay" => Some(Self::Vegetarian),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Atmosphere {
    Quiet,
    Romantic,
    Lively,
}

impl Atmosphere {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "quiet" | "calm" | "yên tĩnh" => Some(Self::Quiet),
            "romantic" | "lãng mạn" => Some(Self::Romantic),
            "lively" | "vibrant" | "sôi động" => Some(Self::Lively),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceLevel {
    Low,
    Medium,
    High,
}

impl PriceLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "low" | "cheap" | "thấp" => Some(Self::Low),
            "medium" | "mid" | "trung bình" => Some(Self::Medium),
            "high" | "expensive" | "cao" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Movies,
    Exhibitions,
    Sports,
    Karaoke,
    Shopping,
}

impl ActivityType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "movies" | "movie" | "cinema" | "xem phim" => Some(Self::Movies),
            "exhibitions" | "exhibition" | "museum" | "triển lãm" => Some(Self::Exhibitions),
            "sports" | "sport" | "gym" | "thể thao" => Some(Self::Sports),
            "karaoke" => Some(Self::Karaoke),
            "shopping" | "mua sắm" => Some(Self::Shopping),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Space {
    Indoor,
    Outdoor,
}

impl Space {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "indoor" | "indoors" | "trong nhà" => Some(Self::Indoor),
            "outdoor" | "outdoors" | "ngoài trời" => Some(Self::Outdoor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoodFilters {
    pub food_type: Vec<FoodType>,
    pub cuisine: Vec<Cuisine>,
    pub atmosphere: Vec<Atmosphere>,
    pub price: Option<PriceLevel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntertainmentFilters {
    pub activity_type: Vec<ActivityType>,
    pub space: Option<Space>,
    pub price: Option<PriceLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum FilterSet {
    Food(FoodFilters),
    Entertainment(EntertainmentFilters),
}

impl FilterSet {
    pub fn category(&self) -> Category {
        match self {
            Self::Food(_) => Category::Food,
            Self::Entertainment(_) => Category::Entertainment,
        }
    }

    /// Builds typed filters from free-text labels; labels nobody recognizes are dropped.
    pub fn from_selection(category: Category, selection: &FilterSelection) -> Self {
        let price = selection.price.as_deref().and_then(PriceLevel::parse);
        match category {
            Category::Food => Self::Food(FoodFilters {
                food_type: parse_labels(&selection.food_type, FoodType::parse),
                cuisine: parse_labels(&selection.cuisine, Cuisine::parse),
                atmosphere: parse_labels(&selection.atmosphere, Atmosphere::parse),
                price,
            }),
            Category::Entertainment => Self::Entertainment(EntertainmentFilters {
                activity_type: parse_labels(&selection.activity_type, ActivityType::parse),
                space: selection.space.as_deref().and_then(Space::parse),
                price,
            }),
        }
    }
}

/// Wire shape of the filter form: every field is free text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSelection {
    pub category: Option<String>,
    pub food_type: Vec<String>,
    pub cuisine: Vec<String>,
    pub atmosphere: Vec<String>,
    pub price: Option<String>,
    pub activity_type: Vec<String>,
    pub space: Option<String>,
}

impl FilterSelection {
    pub fn category(&self) -> Option<Category> {
        self.category.as_deref().and_then(Category::parse)
    }
}

fn parse_labels<T: PartialEq>(raw: &[String], parse: impl Fn(&str) -> Option<T>) -> Vec<T> {
    let mut labels = Vec::new();
    for label in raw.iter().filter_map(|value| parse(value)) {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels
}

/// Wall-clock time of day, exchanged as zero-padded `HH:MM`. `24:00` is the
/// end of the day and is only useful as the end of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self(0);
    pub const END_OF_DAY: Self = Self(24 * 60);

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self::from_naive)
    }

    pub fn minutes_since_midnight(&self) -> u16 {
        self.0
    }

    fn from_naive(time: NaiveTime) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }
}

impl FromStr for TimeOfDay {
    type Err = PlannerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed == "24:00" {
            return Ok(Self::END_OF_DAY);
        }
        NaiveTime::parse_from_str(trimmed, "%H:%M")
            .map(Self::from_naive)
            .map_err(|_| PlannerError::InvalidInput(format!("expected HH:MM time, got '{value}'")))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Serialized with the same keys the add-activity request takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledActivity {
    pub id: Uuid,
    #[serde(rename = "name")]
    pub activity_name: String,
    pub place_name: String,
    #[serde(rename = "start_time")]
    pub start: TimeOfDay,
    #[serde(rename = "end_time")]
    pub end: TimeOfDay,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

impl ScheduledActivity {
    pub fn new(
        activity_name: impl Into<String>,
        place_name: impl Into<String>,
        start: TimeOfDay,
        end: TimeOfDay,
        coordinates: Coordinates,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            activity_name: activity_name.into(),
            place_name: place_name.into(),
            start,
            end,
            coordinates,
        }
    }

    /// Half-open interval test: touching windows do not overlap.
    pub fn overlaps(&self, other: &ScheduledActivity) -> bool {
        self.start < other.end && self.end > other.start
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryEntry {
    #[serde(flatten)]
    pub activity: ScheduledActivity,
    pub step_distance_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Osrm,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    pub route: Vec<Coordinates>,
    pub distance_km: f64,
    pub duration_seconds: u64,
    pub duration_minutes: f64,
    pub source: RouteSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Search,
    ScheduleAdd,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentEntities {
    pub keyword: Option<String>,
    pub category: Option<Category>,
}

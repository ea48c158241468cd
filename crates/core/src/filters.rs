//! Best-effort matching of crowd-sourced POI tags against user filters.
//!
//! Every dimension is a rule table of `(label, signals)`. Inclusion
//! dimensions pass when any chosen label has a firing signal; exclusion
//! dimensions reject when any chosen label's signal fires. Missing tags never
//! reject a place on their own.

use crate::models::{
    ActivityType, Atmosphere, Cuisine, EntertainmentFilters, FilterSet, FoodFilters, FoodType,
    PointOfInterest, PriceLevel, Space, Tags,
};

/// Maximum number of filtered places handed back to callers.
pub const DISPLAY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    TagEquals(&'static str, &'static str),
    TagContains(&'static str, &'static str),
}

use Signal::{TagContains, TagEquals};

impl Signal {
    pub fn fires(&self, tags: &Tags) -> bool {
        match *self {
            TagEquals(key, expected) => tag_value(tags, key).is_some_and(|value| value == expected),
            TagContains(key, needle) => {
                tag_value(tags, key).is_some_and(|value| value.contains(needle))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LabelRule<L> {
    pub label: L,
    pub signals: &'static [Signal],
}

pub const FOOD_TYPE_RULES: &[LabelRule<FoodType>] = &[
    LabelRule {
        label: FoodType::Restaurant,
        signals: &[
            TagEquals("amenity", "restaurant"),
            TagEquals("amenity", "fast_food"),
            TagContains("name", "nhà hàng"),
            TagContains("name", "quán ăn"),
        ],
    },
    LabelRule {
        label: FoodType::Cafe,
        signals: &[
            TagEquals("amenity", "cafe"),
            TagEquals("amenity", "bar"),
            TagEquals("amenity", "pub"),
            TagContains("name", "cafe"),
            TagContains("name", "coffee"),
        ],
    },
    LabelRule {
        label: FoodType::Bar,
        signals: &[
            TagEquals("amenity", "bar"),
            TagEquals("amenity", "pub"),
            TagContains("name", "bar"),
        ],
    },
    LabelRule {
        label: FoodType::Buffet,
        signals: &[TagContains("name", "buffet")],
    },
];

pub const CUISINE_RULES: &[LabelRule<Cuisine>] = &[
    LabelRule {
        label: Cuisine::Vietnamese,
        signals: &[
            TagContains("cuisine", "vietnamese"),
            TagContains("name", "phở"),
            TagContains("name", "bún"),
            TagContains("name", "cơm"),
        ],
    },
    LabelRule {
        label: Cuisine::Asian,
        signals: &[
            TagContains("cuisine", "asian"),
            TagContains("cuisine", "japanese"),
            TagContains("cuisine", "korean"),
            TagContains("cuisine", "thai"),
        ],
    },
    LabelRule {
        label: Cuisine::European,
        signals: &[
            TagContains("cuisine", "french"),
            TagContains("cuisine", "italian"),
            TagContains("cuisine", "european"),
        ],
    },
    LabelRule {
        label: Cuisine::Vegetarian,
        signals: &[
            TagContains("cuisine", "vegan"),
            TagContains("cuisine", "vegetarian"),
        ],
    },
];

/// Signals that disqualify a place for the label. Outdoor seating is presumed noisy.
pub const ATMOSPHERE_EXCLUSIONS: &[LabelRule<Atmosphere>] = &[
    LabelRule {
        label: Atmosphere::Quiet,
        signals: &[TagEquals("outdoor_seating", "yes")],
    },
    LabelRule {
        label: Atmosphere::Romantic,
        signals: &[TagContains("name", "fast_food"), TagContains("name", "quick")],
    },
];

pub const ACTIVITY_TYPE_RULES: &[LabelRule<ActivityType>] = &[
    LabelRule {
        label: ActivityType::Movies,
        signals: &[
            TagContains("amenity", "cinema"),
            TagContains("amenity", "theater"),
            TagContains("name", "phim"),
        ],
    },
    LabelRule {
        label: ActivityType::Exhibitions,
        signals: &[
            TagContains("amenity", "museum"),
            TagContains("amenity", "gallery"),
            TagContains("name", "triển lãm"),
        ],
    },
    LabelRule {
        label: ActivityType::Sports,
        signals: &[
            TagContains("amenity", "sports"),
            TagContains("amenity", "gym"),
            TagContains("amenity", "fitness"),
        ],
    },
    LabelRule {
        label: ActivityType::Karaoke,
        signals: &[
            TagContains("amenity", "karaoke"),
            TagContains("name", "karaoke"),
        ],
    },
    LabelRule {
        label: ActivityType::Shopping,
        signals: &[
            TagContains("amenity", "shop"),
            TagContains("amenity", "mall"),
            TagContains("amenity", "market"),
            TagContains("name", "shop"),
        ],
    },
];

/// A missing outdoor_seating tag is not proof of indoor, so outdoor has no rule.
pub const SPACE_EXCLUSIONS: &[LabelRule<Space>] = &[LabelRule {
    label: Space::Indoor,
    signals: &[TagEquals("outdoor_seating", "yes")],
}];

pub fn matches(tags: &Tags, filters: &FilterSet) -> bool {
    match filters {
        FilterSet::Food(food) => matches_food(tags, food),
        FilterSet::Entertainment(entertainment) => matches_entertainment(tags, entertainment),
    }
}

pub fn matches_food(tags: &Tags, filters: &FoodFilters) -> bool {
    inclusion_passes(&filters.food_type, FOOD_TYPE_RULES, tags)
        && inclusion_passes(&filters.cuisine, CUISINE_RULES, tags)
        && !excluded(&filters.atmosphere, ATMOSPHERE_EXCLUSIONS, tags)
        && price_passes(tags, filters.price)
}

pub fn matches_entertainment(tags: &Tags, filters: &EntertainmentFilters) -> bool {
    let space = filters.space.as_slice();
    inclusion_passes(&filters.activity_type, ACTIVITY_TYPE_RULES, tags)
        && !excluded(space, SPACE_EXCLUSIONS, tags)
        && price_passes(tags, filters.price)
}

/// Keeps matching places in input order, capped at `cap`.
pub fn apply_filters(
    places: Vec<PointOfInterest>,
    filters: Option<&FilterSet>,
    cap: usize,
) -> Vec<PointOfInterest> {
    places
        .into_iter()
        .filter(|place| filters.map_or(true, |filters| matches(&place.tags, filters)))
        .take(cap)
        .collect()
}

/// Price tags carry repeated currency symbols; no tag means no information.
pub fn price_passes(tags: &Tags, price: Option<PriceLevel>) -> bool {
    let (Some(price), Some(tag)) = (price, tag_value(tags, "price")) else {
        return true;
    };
    if tag.is_empty() {
        return true;
    }

    let symbols = tag.matches('$').count();
    match price {
        PriceLevel::High => symbols >= 2,
        PriceLevel::Low => symbols <= 1,
        PriceLevel::Medium => true,
    }
}

fn inclusion_passes<L: Copy + PartialEq>(chosen: &[L], rules: &[LabelRule<L>], tags: &Tags) -> bool {
    let mut ruled = chosen
        .iter()
        .filter(|label| rules.iter().any(|rule| rule.label == **label))
        .peekable();

    if ruled.peek().is_none() {
        return true;
    }

    ruled.any(|label| label_fires(*label, rules, tags))
}

fn excluded<L: Copy + PartialEq>(chosen: &[L], rules: &[LabelRule<L>], tags: &Tags) -> bool {
    chosen.iter().any(|label| label_fires(*label, rules, tags))
}

fn label_fires<L: PartialEq>(label: L, rules: &[LabelRule<L>], tags: &Tags) -> bool {
    rules
        .iter()
        .filter(|rule| rule.label == label)
        .any(|rule| rule.signals.iter().any(|signal| signal.fires(tags)))
}

fn tag_value(tags: &Tags, key: &str) -> Option<String> {
    tags.get(key).map(|value| value.trim().to_lowercase())
}

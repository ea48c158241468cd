use crate::error::PlannerError;
use crate::geo::{distance_km, round2};
use crate::models::{Coordinates, ItineraryEntry, ScheduledActivity};

/// Starting point used for the first step of a day (District 10, Ho Chi Minh City).
pub const DEFAULT_ORIGIN: Coordinates = Coordinates::new(10.762622, 106.660172);

/// A day's schedule. Activities never overlap on their `[start, end)` windows.
#[derive(Debug, Clone, Default)]
pub struct Itinerary {
    activities: Vec<ScheduledActivity>,
}

impl Itinerary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, candidate: ScheduledActivity) -> Result<(), PlannerError> {
        if candidate.end <= candidate.start {
            return Err(PlannerError::InvalidInput(format!(
                "activity '{}' ends at {} which is not after its start {}",
                candidate.activity_name, candidate.end, candidate.start
            )));
        }

        if let Some(existing) = self
            .activities
            .iter()
            .find(|existing| candidate.overlaps(existing))
        {
            return Err(PlannerError::Conflict {
                activity_name: existing.activity_name.clone(),
                start: existing.start,
                end: existing.end,
            });
        }

        self.activities.push(candidate);
        Ok(())
    }

    /// Start-ordered view with the distance travelled to reach each stop.
    pub fn list(&self, origin: Coordinates) -> Vec<ItineraryEntry> {
        let mut sorted = self.activities.clone();
        sorted.sort_by_key(|activity| activity.start);

        let mut previous = origin;
        sorted
            .into_iter()
            .map(|activity| {
                let step_distance_km = distance_km(&previous, &activity.coordinates)
                    .map(round2)
                    .unwrap_or(0.0);
                previous = activity.coordinates;
                ItineraryEntry {
                    activity,
                    step_distance_km,
                }
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.activities.clear();
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }
}

use std::sync::Arc;

use chill_core::{Coordinates, Itinerary, ItineraryEntry, PlannerError, ScheduledActivity};
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

pub trait ItineraryRepository: Send + Sync {
    /// Admits the activity only if it overlaps nothing already scheduled.
    async fn add(&self, activity: ScheduledActivity) -> Result<Uuid, PlannerError>;
    async fn list(&self, origin: Coordinates) -> Vec<ItineraryEntry>;
    async fn reset(&self);
    async fn len(&self) -> usize;
}

/// In-process itinerary shared by every clone of the store.
#[derive(Clone, Default)]
pub struct MemoryItineraryStore {
    itinerary: Arc<Mutex<Itinerary>>,
}

impl MemoryItineraryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ItineraryRepository for MemoryItineraryStore {
    async fn add(&self, activity: ScheduledActivity) -> Result<Uuid, PlannerError> {
        let id = activity.id;
        // Overlap check and append happen under the same guard.
        let mut itinerary = self.itinerary.lock();
        itinerary.add(activity)?;
        debug!(%id, scheduled = itinerary.len(), "activity stored");
        Ok(id)
    }

    async fn list(&self, origin: Coordinates) -> Vec<ItineraryEntry> {
        self.itinerary.lock().list(origin)
    }

    async fn reset(&self) {
        self.itinerary.lock().reset();
    }

    async fn len(&self) -> usize {
        self.itinerary.lock().len()
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only slice of a catalog itinerary, enough to price a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItinerarySummary {
    pub id: Uuid,
    pub title: String,
    /// Free text as entered in the catalog, e.g. "5 days".
    pub duration: String,
}

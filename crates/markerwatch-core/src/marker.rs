use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Stable identifier of a persisted marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerId(pub i64);

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MarkerId {
    fn from(id: i64) -> Self {
        MarkerId(id)
    }
}

/// A user-placed map marker. The engine only ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub coordinate: Coordinate,
}

impl Marker {
    pub fn new(id: impl Into<MarkerId>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            coordinate: Coordinate::new(latitude, longitude),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::marker::MarkerId;
use crate::notify::DeliveryHandle;

/// Why an active notification was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissReason {
    /// The marker still exists but is beyond the threshold.
    OutOfRange,
    /// The marker disappeared from the snapshot.
    MarkerDeleted,
    /// Teardown removed every notification.
    Cleared,
}

/// Every change to the active notification set produces an event.
/// Observers registered on the engine receive them in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    Shown {
        marker_id: MarkerId,
        handle: DeliveryHandle,
        at: DateTime<Utc>,
    },
    Dismissed {
        marker_id: MarkerId,
        reason: DismissReason,
        at: DateTime<Utc>,
    },
}

impl NotificationEvent {
    pub fn marker_id(&self) -> MarkerId {
        match self {
            NotificationEvent::Shown { marker_id, .. } => *marker_id,
            NotificationEvent::Dismissed { marker_id, .. } => *marker_id,
        }
    }
}

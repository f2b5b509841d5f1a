//! Notification lifecycle store.
//!
//! Owns the mapping from marker id to the notification currently shown for
//! it. The mapping only changes inside [`NotificationStore::reconcile`] and
//! [`NotificationStore::clear_all`]; both take `&mut self`, so whoever owns
//! the store serializes them.
//!
//! ## State per marker
//!
//! ```text
//! absent --(nearby and marker exists)--> active
//! active --(out of range | marker deleted | clear_all)--> absent
//! ```

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::delivery::{DeliveryHandle, NotificationDelivery, NotificationTemplate};
use crate::error::DeliveryError;
use crate::events::{DismissReason, NotificationEvent};
use crate::marker::{Marker, MarkerId};

/// Default upper bound for a single show or dismiss request.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Callback invoked for every change to the active set.
pub type Observer = Box<dyn Fn(&NotificationEvent) + Send + Sync>;

/// A notification currently shown for a marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveNotification {
    pub marker_id: MarkerId,
    pub handle: DeliveryHandle,
    pub created_at: DateTime<Utc>,
}

/// What one reconcile (or clear) call changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub shown: Vec<MarkerId>,
    pub dismissed: Vec<(MarkerId, DismissReason)>,
    /// Markers whose `show` failed; they stay absent and are retried on the
    /// next reconcile that still finds them nearby.
    pub failed: Vec<MarkerId>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.shown.is_empty() && self.dismissed.is_empty() && self.failed.is_empty()
    }
}

pub struct NotificationStore {
    delivery: Arc<dyn NotificationDelivery>,
    template: NotificationTemplate,
    timeout: Duration,
    active: HashMap<MarkerId, ActiveNotification>,
    observers: Vec<Observer>,
}

impl NotificationStore {
    pub fn new(delivery: Arc<dyn NotificationDelivery>) -> Self {
        Self {
            delivery,
            template: NotificationTemplate::default(),
            timeout: DEFAULT_DELIVERY_TIMEOUT,
            active: HashMap::new(),
            observers: Vec::new(),
        }
    }

    pub fn with_template(mut self, template: NotificationTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register an observer for show/dismiss events.
    pub fn subscribe(&mut self, observer: Observer) {
        self.observers.push(observer);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn has_active(&self, marker_id: MarkerId) -> bool {
        self.active.contains_key(&marker_id)
    }

    /// Snapshot of the active set, ordered by marker id.
    pub fn list_active(&self) -> Vec<ActiveNotification> {
        let mut list: Vec<_> = self.active.values().cloned().collect();
        list.sort_by_key(|n| n.marker_id);
        list
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Bring the active set in line with `nearby`, given the full marker
    /// snapshot the ids were computed from.
    ///
    /// Dismissals run before shows. A delivery failure only affects its own
    /// marker: a failed dismiss still drops the entry, a failed show leaves
    /// the marker absent.
    pub async fn reconcile(&mut self, nearby: &BTreeSet<MarkerId>, all_markers: &[Marker]) -> ReconcileReport {
        let by_id: HashMap<MarkerId, &Marker> = all_markers.iter().map(|m| (m.id, m)).collect();
        let mut report = ReconcileReport::default();

        let mut stale: Vec<(MarkerId, DismissReason)> = self
            .active
            .keys()
            .filter_map(|id| {
                if !by_id.contains_key(id) {
                    Some((*id, DismissReason::MarkerDeleted))
                } else if !nearby.contains(id) {
                    Some((*id, DismissReason::OutOfRange))
                } else {
                    None
                }
            })
            .collect();
        stale.sort_by_key(|(id, _)| *id);

        for (id, reason) in stale {
            self.dismiss_entry(id, reason).await;
            report.dismissed.push((id, reason));
        }

        for id in nearby {
            if self.active.contains_key(id) {
                continue;
            }
            let Some(marker) = by_id.get(id) else {
                debug!(marker_id = %id, "nearby marker missing from snapshot, skipping");
                continue;
            };
            let (title, body) = self.template.render(marker);
            match self.bounded(self.delivery.show(&title, &body)).await {
                Ok(handle) => {
                    info!(marker_id = %id, %handle, "proximity notification shown");
                    let entry = ActiveNotification {
                        marker_id: *id,
                        handle: handle.clone(),
                        created_at: Utc::now(),
                    };
                    self.active.insert(*id, entry);
                    self.emit(NotificationEvent::Shown {
                        marker_id: *id,
                        handle,
                        at: Utc::now(),
                    });
                    report.shown.push(*id);
                }
                Err(e) => {
                    warn!(marker_id = %id, error = %e, "failed to show proximity notification");
                    report.failed.push(*id);
                }
            }
        }

        report
    }

    /// Dismiss and forget every active notification.
    pub async fn clear_all(&mut self) -> ReconcileReport {
        let mut ids: Vec<MarkerId> = self.active.keys().copied().collect();
        ids.sort();
        let mut report = ReconcileReport::default();
        for id in ids {
            self.dismiss_entry(id, DismissReason::Cleared).await;
            report.dismissed.push((id, DismissReason::Cleared));
        }
        report
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn dismiss_entry(&mut self, id: MarkerId, reason: DismissReason) {
        let Some(handle) = self.active.get(&id).map(|n| n.handle.clone()) else {
            return;
        };
        match self.bounded(self.delivery.dismiss(&handle)).await {
            Ok(()) => info!(marker_id = %id, ?reason, "proximity notification dismissed"),
            Err(e) => warn!(
                marker_id = %id,
                %handle,
                error = %e,
                "dismiss failed, dropping notification record anyway"
            ),
        }
        self.active.remove(&id);
        self.emit(NotificationEvent::Dismissed {
            marker_id: id,
            reason,
            at: Utc::now(),
        });
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T, DeliveryError>>) -> Result<T, DeliveryError> {
        tokio::time::timeout(self.timeout, fut).await?
    }

    fn emit(&self, event: NotificationEvent) {
        for observer in &self.observers {
            observer(&event);
        }
    }
}

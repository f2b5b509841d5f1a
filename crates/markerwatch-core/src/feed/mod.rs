//! Location feed boundary.
//!
//! A feed wraps whatever produces position updates (the platform location
//! service, a recorded track, a test) behind a subscribe/unsubscribe
//! interface. The engine only ever consumes its output.

mod channel;
mod replay;

pub use channel::{ChannelFeed, FeedSender};
pub use replay::{parse_track, ReplayFeed, TrackPoint};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FeedError;
use crate::geo::LocationFix;

/// Receives every update from a subscription. Transient source failures
/// arrive as `Err` so the consumer can log and carry on.
pub type FixCallback = Arc<dyn Fn(Result<LocationFix, FeedError>) + Send + Sync>;

/// Requested positioning accuracy, mirroring the tiers mobile platforms expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyTier {
    Lowest,
    Low,
    #[default]
    Balanced,
    High,
    Highest,
    BestForNavigation,
}

/// Subscription parameters passed through to the location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub accuracy: AccuracyTier,
    /// Minimum time between updates.
    pub min_interval_ms: u64,
    /// Minimum movement between updates.
    pub min_distance_m: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            accuracy: AccuracyTier::Balanced,
            min_interval_ms: 5_000,
            min_distance_m: 5.0,
        }
    }
}

/// Handle for a live subscription. Removing it (or dropping it) stops
/// further callbacks; removing twice is harmless.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn remove(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Boundary to a continuous location source.
#[async_trait]
pub trait LocationFeed: Send + Sync {
    /// Ask the user for foreground location permission.
    async fn request_permission(&self) -> bool;

    /// One-shot query for the current position, `None` if unavailable.
    async fn current_fix(&self) -> Option<LocationFix>;

    /// Start delivering updates to `on_fix` until the subscription is removed.
    async fn subscribe(&self, on_fix: FixCallback, config: FeedConfig) -> Result<Subscription, FeedError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscription_cancels_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let mut sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sub.is_active());
        sub.remove();
        sub.remove();
        drop(sub);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_subscription_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        drop(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn accuracy_tier_uses_snake_case() {
        let json = serde_json::to_string(&AccuracyTier::BestForNavigation).unwrap();
        assert_eq!(json, "\"best_for_navigation\"");
    }
}

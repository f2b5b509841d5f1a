//! Engine loop: location feed → proximity classifier → notification store.
//!
//! [`Engine::start`] asks both collaborators for permission, subscribes to
//! the feed and spawns one worker task. The feed callback only enqueues;
//! the worker takes fixes off the queue in arrival order and, for each one,
//! reads a single marker snapshot, classifies against it and reconciles the
//! notification store with the same snapshot.
//!
//! ```ignore
//! let handle = Engine::start(feed, delivery, markers, config.engine_config()?).await?;
//! handle.on_notification_change(|e| println!("{e:?}")).await;
//! // ...
//! handle.stop().await;
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;
use crate::error::{CoreError, FeedError, Permission, Result, ValidationError};
use crate::events::NotificationEvent;
use crate::feed::{FeedConfig, FixCallback, LocationFeed, Subscription};
use crate::geo::{Coordinate, LocationFix};
use crate::notify::{
    ActiveNotification, NotificationDelivery, NotificationStore, NotificationTemplate, ReconcileReport,
    DEFAULT_DELIVERY_TIMEOUT,
};
use crate::proximity::{self, Threshold, DEFAULT_THRESHOLD};
use crate::storage::MarkerStore;

type FixUpdate = std::result::Result<LocationFix, FeedError>;

/// Runtime settings for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub threshold: Threshold,
    pub feed: FeedConfig,
    /// Classify `current_fix()` once before live updates start.
    pub use_initial_fix: bool,
    pub template: NotificationTemplate,
    pub delivery_timeout: Duration,
    /// Quiet window for [`EngineHandle::request_marker`].
    pub create_debounce: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            feed: FeedConfig::default(),
            use_initial_fix: true,
            template: NotificationTemplate::default(),
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            create_debounce: Duration::from_millis(300),
        }
    }
}

pub struct Engine;

impl Engine {
    /// Start tracking.
    ///
    /// A refused location permission leaves the engine running without a
    /// subscription; a refused notification permission keeps classifying
    /// fixes but never reconciles. Both are reported through
    /// [`EngineHandle::permission_denials`].
    ///
    /// # Errors
    /// Returns an error if subscribing to the feed fails.
    pub async fn start(
        feed: Arc<dyn LocationFeed>,
        delivery: Arc<dyn NotificationDelivery>,
        markers: Arc<dyn MarkerStore>,
        config: EngineConfig,
    ) -> Result<EngineHandle> {
        let mut denials = Vec::new();

        let location_granted = feed.request_permission().await;
        if !location_granted {
            warn!("location permission denied, engine will receive no fixes");
            denials.push(Permission::Location);
        }
        let notifications_granted = delivery.request_permission().await;
        if !notifications_granted {
            warn!("notification permission denied, fixes will be classified but not delivered");
            denials.push(Permission::Notifications);
        }

        let store = Arc::new(Mutex::new(
            NotificationStore::new(delivery)
                .with_template(config.template.clone())
                .with_timeout(config.delivery_timeout),
        ));

        let (tx, rx) = mpsc::unbounded_channel::<FixUpdate>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (processed_tx, processed_rx) = watch::channel(0u64);
        let enqueued = Arc::new(AtomicU64::new(0));
        let dropped = Arc::new(AtomicU64::new(0));

        let enqueue: FixCallback = {
            let enqueued = enqueued.clone();
            Arc::new(move |update: FixUpdate| {
                enqueued.fetch_add(1, Ordering::SeqCst);
                if tx.send(update).is_err() {
                    // Worker is gone; nothing will ever process this one.
                    enqueued.fetch_sub(1, Ordering::SeqCst);
                }
            })
        };

        let worker = Worker {
            markers: markers.clone(),
            store: store.clone(),
            threshold: config.threshold,
            deliver: notifications_granted,
            dropped: dropped.clone(),
        };
        let worker = tokio::spawn(worker.run(rx, shutdown_rx, processed_tx));

        let mut subscription = None;
        if location_granted {
            if config.use_initial_fix {
                match feed.current_fix().await {
                    Some(fix) => {
                        debug!(latitude = fix.latitude, longitude = fix.longitude, "initial fix queued");
                        enqueue(Ok(fix));
                    }
                    None => debug!("no initial fix available"),
                }
            }
            match feed.subscribe(enqueue.clone(), config.feed).await {
                Ok(sub) => subscription = Some(sub),
                Err(e) => {
                    shutdown_tx.send_replace(true);
                    worker.abort();
                    return Err(e.into());
                }
            }
        }

        let create_markers = markers.clone();
        let debouncer = Debouncer::new(config.create_debounce, move |coordinate: Coordinate| {
            match create_markers.add(coordinate) {
                Ok(id) => info!(marker_id = %id, "marker created"),
                Err(e) => warn!(error = %e, "failed to create marker"),
            }
        });

        info!(
            threshold_m = config.threshold.as_meters(),
            accuracy = ?config.feed.accuracy,
            subscribed = subscription.is_some(),
            "proximity engine started"
        );

        Ok(EngineHandle {
            store,
            subscription: std::sync::Mutex::new(subscription),
            worker: std::sync::Mutex::new(Some(worker)),
            shutdown_tx,
            debouncer,
            denials,
            enqueued,
            dropped,
            processed: processed_rx,
            stopped: AtomicBool::new(false),
        })
    }
}

/// Control surface of a running engine.
///
/// Dropping the handle without [`EngineHandle::stop`] ends the subscription
/// and the worker but leaves shown notifications in place.
pub struct EngineHandle {
    store: Arc<Mutex<NotificationStore>>,
    subscription: std::sync::Mutex<Option<Subscription>>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    debouncer: Debouncer<Coordinate>,
    denials: Vec<Permission>,
    enqueued: Arc<AtomicU64>,
    dropped: Arc<AtomicU64>,
    processed: watch::Receiver<u64>,
    stopped: AtomicBool,
}

impl EngineHandle {
    /// Stop tracking and dismiss everything still shown.
    ///
    /// Any pending marker creation is discarded first, then the feed
    /// subscription goes, then the worker finishes the fix it is on and the
    /// store is cleared. Calling this again does nothing.
    pub async fn stop(&self) -> ReconcileReport {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return ReconcileReport::default();
        }
        self.debouncer.shutdown();

        let subscription = self.subscription.lock().ok().and_then(|mut s| s.take());
        if let Some(mut subscription) = subscription {
            subscription.remove();
        }

        self.shutdown_tx.send_replace(true);
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "engine worker ended abnormally");
            }
        }

        let report = self.store.lock().await.clear_all().await;

        info!(
            cleared = report.dismissed.len(),
            processed = self.processed_fixes(),
            "proximity engine stopped"
        );
        report
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Register a callback for every show and dismiss.
    pub async fn on_notification_change<F>(&self, callback: F)
    where
        F: Fn(&NotificationEvent) + Send + Sync + 'static,
    {
        self.store.lock().await.subscribe(Box::new(callback));
    }

    /// Queue creation of a marker at `coordinate`. Bursts collapse to the
    /// last request; requests after [`EngineHandle::stop`] are ignored.
    pub fn request_marker(&self, coordinate: Coordinate) -> std::result::Result<(), ValidationError> {
        let coordinate = Coordinate::checked(coordinate.latitude, coordinate.longitude)?;
        if !self.is_stopped() {
            self.debouncer.call(coordinate);
        }
        Ok(())
    }

    /// Notifications currently shown, ordered by marker id.
    pub async fn active(&self) -> Vec<ActiveNotification> {
        self.store.lock().await.list_active()
    }

    /// Permissions refused at start.
    pub fn permission_denials(&self) -> &[Permission] {
        &self.denials
    }

    /// Fail with the first permission refused at start, if any.
    ///
    /// # Errors
    /// Returns [`CoreError::PermissionDenied`] when a prompt was refused.
    pub fn ensure_permitted(&self) -> Result<()> {
        match self.denials.first() {
            Some(permission) => Err(CoreError::PermissionDenied(*permission)),
            None => Ok(()),
        }
    }

    /// Fixes taken off the queue so far, including dropped ones.
    pub fn processed_fixes(&self) -> u64 {
        *self.processed.borrow()
    }

    /// Fixes discarded because they were invalid or no snapshot was available.
    pub fn dropped_fixes(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Resolves once every fix queued so far has been processed, or the
    /// worker has exited.
    pub async fn wait_idle(&self) {
        let mut processed = self.processed.clone();
        let enqueued = self.enqueued.clone();
        let _ = processed
            .wait_for(|n| *n >= enqueued.load(Ordering::SeqCst))
            .await;
    }
}

struct Worker {
    markers: Arc<dyn MarkerStore>,
    store: Arc<Mutex<NotificationStore>>,
    threshold: Threshold,
    deliver: bool,
    dropped: Arc<AtomicU64>,
}

impl Worker {
    async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<FixUpdate>,
        mut shutdown: watch::Receiver<bool>,
        processed: watch::Sender<u64>,
    ) {
        loop {
            let update = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                update = rx.recv() => match update {
                    Some(update) => update,
                    None => break,
                },
            };
            self.handle(update).await;
            processed.send_modify(|n| *n += 1);
        }
        debug!("engine worker exited");
    }

    async fn handle(&self, update: FixUpdate) {
        let fix = match update.and_then(validate_fix) {
            Ok(fix) => fix,
            Err(e) => {
                warn!(error = %e, "location update dropped");
                self.dropped.fetch_add(1, Ordering::SeqCst);
                return;
            }
        };

        let markers = match self.markers.snapshot() {
            Ok(markers) => markers,
            Err(e) => {
                warn!(error = %e, "marker snapshot failed, fix dropped");
                self.dropped.fetch_add(1, Ordering::SeqCst);
                return;
            }
        };

        let nearby = proximity::nearby(&fix, &markers, self.threshold);
        match proximity::nearest(&fix, &markers) {
            Some((marker, distance)) => debug!(
                latitude = fix.latitude,
                longitude = fix.longitude,
                nearby = nearby.len(),
                nearest_id = %marker.id,
                nearest_m = distance,
                "fix classified"
            ),
            None => debug!(latitude = fix.latitude, longitude = fix.longitude, "fix classified, no markers"),
        }

        if !self.deliver {
            return;
        }
        let report = self.store.lock().await.reconcile(&nearby, &markers).await;
        if !report.is_noop() {
            debug!(
                shown = report.shown.len(),
                dismissed = report.dismissed.len(),
                failed = report.failed.len(),
                "notifications reconciled"
            );
        }
    }
}

fn validate_fix(fix: LocationFix) -> std::result::Result<LocationFix, FeedError> {
    if fix.coordinate().is_valid() {
        Ok(fix)
    } else {
        Err(FeedError::InvalidFix {
            latitude: fix.latitude,
            longitude: fix.longitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::ChannelFeed;
    use crate::marker::{Marker, MarkerId};
    use crate::notify::RecordingDelivery;
    use crate::storage::MemoryMarkerStore;

    struct Rig {
        handle: EngineHandle,
        tx: crate::feed::FeedSender,
        delivery: Arc<RecordingDelivery>,
        markers: Arc<MemoryMarkerStore>,
    }

    async fn rig(markers: Vec<Marker>) -> Rig {
        let (feed, tx) = ChannelFeed::new();
        let delivery = Arc::new(RecordingDelivery::new());
        let markers = Arc::new(MemoryMarkerStore::with_markers(markers));
        let handle = Engine::start(
            Arc::new(feed),
            delivery.clone(),
            markers.clone(),
            EngineConfig::default(),
        )
        .await
        .unwrap();
        Rig {
            handle,
            tx,
            delivery,
            markers,
        }
    }

    #[tokio::test]
    async fn fix_near_marker_shows_notification() {
        let r = rig(vec![Marker::new(1, 0.0, 0.0)]).await;
        r.tx.send(LocationFix::now(0.0, 0.0));
        r.handle.wait_idle().await;

        assert_eq!(r.delivery.show_count(), 1);
        let active = r.handle.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].marker_id, MarkerId(1));
    }

    #[tokio::test]
    async fn invalid_fix_is_dropped() {
        let r = rig(vec![Marker::new(1, 0.0, 0.0)]).await;
        r.tx.send(LocationFix::now(f64::NAN, 0.0));
        r.tx.send(LocationFix::now(95.0, 0.0));
        r.handle.wait_idle().await;

        assert_eq!(r.handle.processed_fixes(), 2);
        assert_eq!(r.handle.dropped_fixes(), 2);
        assert_eq!(r.delivery.show_count(), 0);
    }

    #[tokio::test]
    async fn feed_errors_do_not_stop_the_loop() {
        let r = rig(vec![Marker::new(1, 0.0, 0.0)]).await;
        r.tx.fail(FeedError::Unavailable("no signal".into()));
        r.tx.send(LocationFix::now(0.0, 0.0));
        r.handle.wait_idle().await;

        assert_eq!(r.handle.dropped_fixes(), 1);
        assert_eq!(r.delivery.show_count(), 1);
    }

    #[tokio::test]
    async fn marker_added_while_tracking_is_picked_up() {
        let r = rig(vec![]).await;
        r.tx.send(LocationFix::now(0.0, 0.0));
        r.handle.wait_idle().await;
        assert_eq!(r.delivery.show_count(), 0);

        let id = r.markers.add(Coordinate::new(0.0, 0.0001)).unwrap();
        r.tx.send(LocationFix::now(0.0, 0.0));
        r.handle.wait_idle().await;
        assert!(r.handle.active().await.iter().any(|n| n.marker_id == id));
    }

    #[tokio::test]
    async fn stop_clears_and_is_idempotent() {
        let r = rig(vec![Marker::new(1, 0.0, 0.0)]).await;
        r.tx.send(LocationFix::now(0.0, 0.0));
        r.handle.wait_idle().await;

        let first = r.handle.stop().await;
        let second = r.handle.stop().await;
        assert_eq!(first.dismissed.len(), 1);
        assert!(second.is_noop());
        assert_eq!(r.delivery.dismiss_count(), 1);
        assert!(r.handle.active().await.is_empty());

        // Subscription is gone.
        assert_eq!(r.tx.send(LocationFix::now(0.0, 0.0)), 0);
    }

    #[tokio::test]
    async fn request_marker_rejects_bad_coordinates() {
        let r = rig(vec![]).await;
        assert!(r.handle.request_marker(Coordinate::new(91.0, 0.0)).is_err());
        assert!(r.handle.request_marker(Coordinate::new(10.0, 10.0)).is_ok());
    }
}

//! # Markerwatch Core Library
//!
//! This library provides the proximity-notification engine behind the
//! markerwatch location-pinning app. It follows a CLI-first philosophy:
//! every operation is available through the standalone `markerwatch-cli`
//! binary, with mobile or desktop shells acting as thin layers over the same
//! core.
//!
//! ## Architecture
//!
//! - **Geo**: haversine distance between WGS-84 points
//! - **Proximity**: which markers lie within the threshold of one fix
//! - **Notify**: the lifecycle store that keeps exactly one notification per
//!   nearby marker, plus the delivery boundary
//! - **Feed**: the location-update boundary (push channel, track replay)
//! - **Engine**: the worker loop wiring feed, classifier and store together
//! - **Storage**: SQLite marker persistence and TOML configuration
//!
//! ## Key Components
//!
//! - [`Engine`]: starts tracking and returns an [`EngineHandle`]
//! - [`NotificationStore`]: active-notification state machine
//! - [`Debouncer`]: trailing-edge rate limiter for marker creation
//! - [`Config`]: application configuration management

pub mod debounce;
pub mod engine;
pub mod error;
pub mod events;
pub mod feed;
pub mod geo;
pub mod marker;
pub mod notify;
pub mod proximity;
pub mod storage;

pub use debounce::Debouncer;
pub use engine::{Engine, EngineConfig, EngineHandle};
pub use error::{ConfigError, CoreError, DeliveryError, FeedError, Permission, StoreError, ValidationError};
pub use events::{DismissReason, NotificationEvent};
pub use feed::{AccuracyTier, ChannelFeed, FeedConfig, FeedSender, LocationFeed, ReplayFeed, Subscription};
pub use geo::{distance_m, Coordinate, LocationFix};
pub use marker::{Marker, MarkerId};
pub use notify::{
    ActiveNotification, ConsoleDelivery, DeliveryHandle, NotificationDelivery, NotificationStore,
    NotificationTemplate, ReconcileReport, RecordingDelivery,
};
pub use proximity::{nearby, nearest, Threshold};
pub use storage::{Config, MarkerStore, MemoryMarkerStore, SqliteMarkerStore};

//! Proximity notifications: the delivery boundary and the lifecycle store
//! that drives it.

mod console;
mod delivery;
mod lifecycle;
mod recording;

pub use console::ConsoleDelivery;
pub use delivery::{DeliveryHandle, NotificationDelivery, NotificationTemplate};
pub use lifecycle::{
    ActiveNotification, NotificationStore, Observer, ReconcileReport, DEFAULT_DELIVERY_TIMEOUT,
};
pub use recording::{DeliveryCall, RecordingDelivery};

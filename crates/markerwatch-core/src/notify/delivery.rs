use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;
use crate::marker::Marker;

/// Opaque handle the delivery backend returns for a shown notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryHandle(pub String);

impl DeliveryHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeliveryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Boundary to the platform notification system.
///
/// Implementations must treat dismissing an unknown or already-removed handle
/// as success.
#[async_trait]
pub trait NotificationDelivery: Send + Sync {
    /// Ask the user for permission to post notifications.
    async fn request_permission(&self) -> bool;

    /// Post a notification immediately.
    async fn show(&self, title: &str, body: &str) -> Result<DeliveryHandle, DeliveryError>;

    /// Remove a previously posted notification.
    async fn dismiss(&self, handle: &DeliveryHandle) -> Result<(), DeliveryError>;
}

/// Title and body text for proximity notifications.
///
/// `{id}` in either string is replaced with the marker id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub title: String,
    pub body: String,
}

impl Default for NotificationTemplate {
    fn default() -> Self {
        Self {
            title: "You're near a marker!".into(),
            body: "You are near saved marker {id}.".into(),
        }
    }
}

impl NotificationTemplate {
    pub fn render(&self, marker: &Marker) -> (String, String) {
        let id = marker.id.to_string();
        (self.title.replace("{id}", &id), self.body.replace("{id}", &id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_substitutes_marker_id() {
        let template = NotificationTemplate::default();
        let (title, body) = template.render(&Marker::new(42, 0.0, 0.0));
        assert_eq!(title, "You're near a marker!");
        assert_eq!(body, "You are near saved marker 42.");
    }

    #[test]
    fn template_without_placeholder_is_verbatim() {
        let template = NotificationTemplate {
            title: "Nearby".into(),
            body: "Check the map".into(),
        };
        let (title, body) = template.render(&Marker::new(1, 0.0, 0.0));
        assert_eq!((title.as_str(), body.as_str()), ("Nearby", "Check the map"));
    }
}

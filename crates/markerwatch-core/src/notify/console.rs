//! Delivery backend that prints notifications as JSON lines.
//!
//! Used by the CLI, where there is no platform notification center. Handles
//! are random UUIDs.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::delivery::{DeliveryHandle, NotificationDelivery};
use crate::error::DeliveryError;

pub struct ConsoleDelivery {
    posted: Mutex<HashSet<DeliveryHandle>>,
}

impl ConsoleDelivery {
    pub fn new() -> Self {
        Self {
            posted: Mutex::new(HashSet::new()),
        }
    }

    /// Number of notifications currently on screen.
    pub fn posted_count(&self) -> usize {
        self.posted.lock().map(|p| p.len()).unwrap_or(0)
    }

    fn emit(&self, line: serde_json::Value) -> Result<(), DeliveryError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").map_err(|e| DeliveryError::Backend(e.to_string()))
    }
}

impl Default for ConsoleDelivery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationDelivery for ConsoleDelivery {
    async fn request_permission(&self) -> bool {
        true
    }

    async fn show(&self, title: &str, body: &str) -> Result<DeliveryHandle, DeliveryError> {
        let handle = DeliveryHandle::new(Uuid::new_v4().to_string());
        self.emit(json!({
            "type": "notification_shown",
            "handle": handle,
            "title": title,
            "body": body,
            "at": Utc::now(),
        }))?;
        self.posted
            .lock()
            .map_err(|_| DeliveryError::Backend("console delivery state poisoned".into()))?
            .insert(handle.clone());
        Ok(handle)
    }

    async fn dismiss(&self, handle: &DeliveryHandle) -> Result<(), DeliveryError> {
        let was_posted = self
            .posted
            .lock()
            .map_err(|_| DeliveryError::Backend("console delivery state poisoned".into()))?
            .remove(handle);
        if was_posted {
            self.emit(json!({
                "type": "notification_dismissed",
                "handle": handle,
                "at": Utc::now(),
            }))?;
        }
        Ok(())
    }
}

//! In-memory delivery backend that records every request.
//!
//! Lets tests and headless hosts assert on exactly which show/dismiss calls
//! the lifecycle store issued, and inject delivery failures.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::delivery::{DeliveryHandle, NotificationDelivery};
use crate::error::DeliveryError;

/// One request seen by [`RecordingDelivery`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryCall {
    Show { title: String, body: String },
    Dismiss { handle: DeliveryHandle },
}

#[derive(Default)]
struct Inner {
    calls: Vec<DeliveryCall>,
    posted: HashSet<DeliveryHandle>,
    show_failures: VecDeque<DeliveryError>,
    dismiss_failures: VecDeque<DeliveryError>,
}

pub struct RecordingDelivery {
    inner: Mutex<Inner>,
    next_handle: AtomicU64,
    permission: AtomicBool,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_handle: AtomicU64::new(1),
            permission: AtomicBool::new(true),
        }
    }

    /// Answer `false` to the permission prompt.
    pub fn deny_permission(self) -> Self {
        self.permission.store(false, Ordering::SeqCst);
        self
    }

    /// Make the next `show` fail with `err`. Failures queue up in order.
    pub fn fail_next_show(&self, err: DeliveryError) {
        self.lock().show_failures.push_back(err);
    }

    /// Make the next `dismiss` fail with `err`.
    pub fn fail_next_dismiss(&self, err: DeliveryError) {
        self.lock().dismiss_failures.push_back(err);
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<DeliveryCall> {
        self.lock().calls.clone()
    }

    pub fn show_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, DeliveryCall::Show { .. }))
            .count()
    }

    pub fn dismiss_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, DeliveryCall::Dismiss { .. }))
            .count()
    }

    /// Bodies of all shown notifications, in call order.
    pub fn shown_bodies(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                DeliveryCall::Show { body, .. } => Some(body.clone()),
                DeliveryCall::Dismiss { .. } => None,
            })
            .collect()
    }

    /// Handles that were shown and not yet dismissed.
    pub fn posted(&self) -> HashSet<DeliveryHandle> {
        self.lock().posted.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread must not hide the calls recorded so far.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RecordingDelivery {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationDelivery for RecordingDelivery {
    async fn request_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    async fn show(&self, title: &str, body: &str) -> Result<DeliveryHandle, DeliveryError> {
        let mut inner = self.lock();
        inner.calls.push(DeliveryCall::Show {
            title: title.to_string(),
            body: body.to_string(),
        });
        if let Some(err) = inner.show_failures.pop_front() {
            return Err(err);
        }
        let n = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let handle = DeliveryHandle::new(format!("n-{n}"));
        inner.posted.insert(handle.clone());
        Ok(handle)
    }

    async fn dismiss(&self, handle: &DeliveryHandle) -> Result<(), DeliveryError> {
        let mut inner = self.lock();
        inner.calls.push(DeliveryCall::Dismiss {
            handle: handle.clone(),
        });
        if let Some(err) = inner.dismiss_failures.pop_front() {
            return Err(err);
        }
        inner.posted.remove(handle);
        Ok(())
    }
}

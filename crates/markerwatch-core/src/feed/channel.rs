//! A feed the host pushes fixes into.
//!
//! Mobile shells forward platform callbacks through a [`FeedSender`]; tests
//! use the same path to script a walk.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{FeedConfig, FixCallback, LocationFeed, Subscription};
use crate::error::FeedError;
use crate::geo::LocationFix;

#[derive(Default)]
struct State {
    subscribers: BTreeMap<u64, FixCallback>,
    next_id: u64,
    last_fix: Option<LocationFix>,
    last_config: Option<FeedConfig>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct ChannelFeed {
    state: Arc<Mutex<State>>,
    permission: bool,
    subscribe_error: Option<String>,
}

/// Producer half of a [`ChannelFeed`].
#[derive(Clone)]
pub struct FeedSender {
    state: Arc<Mutex<State>>,
}

impl ChannelFeed {
    pub fn new() -> (Self, FeedSender) {
        let state = Arc::new(Mutex::new(State::default()));
        let feed = Self {
            state: state.clone(),
            permission: true,
            subscribe_error: None,
        };
        (feed, FeedSender { state })
    }

    /// Answer `false` to the permission prompt.
    pub fn deny_permission(mut self) -> Self {
        self.permission = false;
        self
    }

    /// Refuse every `subscribe` with [`FeedError::SubscribeFailed`].
    pub fn refuse_subscribe(mut self, message: impl Into<String>) -> Self {
        self.subscribe_error = Some(message.into());
        self
    }

    /// Config passed by the most recent subscriber.
    pub fn last_config(&self) -> Option<FeedConfig> {
        lock(&self.state).last_config
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.state).subscribers.len()
    }
}

impl FeedSender {
    /// Deliver `fix` to every subscriber. Returns how many received it.
    ///
    /// The fix is also remembered as the answer to `current_fix`.
    pub fn send(&self, fix: LocationFix) -> usize {
        let callbacks = {
            let mut state = lock(&self.state);
            state.last_fix = Some(fix.clone());
            state.subscribers.values().cloned().collect::<Vec<_>>()
        };
        for cb in &callbacks {
            cb(Ok(fix.clone()));
        }
        callbacks.len()
    }

    /// Report a transient source failure to every subscriber.
    pub fn fail(&self, err: FeedError) -> usize {
        let callbacks: Vec<_> = lock(&self.state).subscribers.values().cloned().collect();
        for cb in &callbacks {
            cb(Err(err.clone()));
        }
        callbacks.len()
    }

    /// Set the answer to `current_fix` without notifying subscribers.
    pub fn set_current(&self, fix: LocationFix) {
        lock(&self.state).last_fix = Some(fix);
    }
}

#[async_trait]
impl LocationFeed for ChannelFeed {
    async fn request_permission(&self) -> bool {
        self.permission
    }

    async fn current_fix(&self) -> Option<LocationFix> {
        lock(&self.state).last_fix.clone()
    }

    async fn subscribe(&self, on_fix: FixCallback, config: FeedConfig) -> Result<Subscription, FeedError> {
        if let Some(message) = &self.subscribe_error {
            return Err(FeedError::SubscribeFailed(message.clone()));
        }
        let id = {
            let mut state = lock(&self.state);
            let id = state.next_id;
            state.next_id += 1;
            state.subscribers.insert(id, on_fix);
            state.last_config = Some(config);
            id
        };
        let state = self.state.clone();
        Ok(Subscription::new(move || {
            lock(&state).subscribers.remove(&id);
        }))
    }
}

//! Volatile marker store for tests and embedding.

use std::sync::{Mutex, MutexGuard};

use super::MarkerStore;
use crate::error::StoreError;
use crate::geo::Coordinate;
use crate::marker::{Marker, MarkerId};

#[derive(Default)]
struct Inner {
    // Insertion order; snapshot reverses it.
    markers: Vec<Marker>,
    next_id: i64,
}

#[derive(Default)]
pub struct MemoryMarkerStore {
    inner: Mutex<Inner>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with fixed markers. Later `add` calls continue after the largest id.
    pub fn with_markers(markers: impl IntoIterator<Item = Marker>) -> Self {
        let markers: Vec<Marker> = markers.into_iter().collect();
        let next_id = markers.iter().map(|m| m.id.0).max().unwrap_or(0);
        Self {
            inner: Mutex::new(Inner { markers, next_id }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.markers.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn snapshot(&self) -> Result<Vec<Marker>, StoreError> {
        Ok(self.lock()?.markers.iter().rev().cloned().collect())
    }

    fn add(&self, coordinate: Coordinate) -> Result<MarkerId, StoreError> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let id = MarkerId(inner.next_id);
        inner.markers.push(Marker { id, coordinate });
        Ok(id)
    }

    fn delete(&self, id: MarkerId) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.markers.len();
        inner.markers.retain(|m| m.id != id);
        Ok(inner.markers.len() != before)
    }
}

//! Marker persistence and application configuration.

mod config;
mod memory;
pub mod migrations;
mod sqlite;

pub use config::{Config, LocationSection, MarkersSection, NotificationsSection, ProximitySection};
pub use memory::MemoryMarkerStore;
pub use sqlite::SqliteMarkerStore;

use std::path::PathBuf;

use crate::error::{ConfigError, StoreError};
use crate::geo::Coordinate;
use crate::marker::{Marker, MarkerId};

/// Read/write access to persisted markers.
///
/// The engine only calls [`MarkerStore::snapshot`]; the write half serves
/// marker creation from map gestures and the CLI.
pub trait MarkerStore: Send + Sync {
    /// Every marker as of this call, newest first.
    fn snapshot(&self) -> Result<Vec<Marker>, StoreError>;

    /// Persist a new marker and return its id.
    fn add(&self, coordinate: Coordinate) -> Result<MarkerId, StoreError>;

    /// Delete a marker. Returns `false` if it did not exist.
    fn delete(&self, id: MarkerId) -> Result<bool, StoreError>;

    fn get(&self, id: MarkerId) -> Result<Option<Marker>, StoreError> {
        Ok(self.snapshot()?.into_iter().find(|m| m.id == id))
    }
}

/// Returns `~/.config/markerwatch[-dev]/` based on MARKERWATCH_ENV.
///
/// Set MARKERWATCH_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("MARKERWATCH_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("markerwatch-dev")
    } else {
        base_dir.join("markerwatch")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

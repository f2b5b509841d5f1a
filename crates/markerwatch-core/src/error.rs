//! Core error types for markerwatch-core.
//!
//! One `thiserror` enum per collaborator boundary, gathered under
//! [`CoreError`] for callers that do not care which side failed.

use std::path::PathBuf;
use thiserror::Error;

use crate::marker::MarkerId;

/// Core error type for markerwatch-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Notification delivery errors
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Location feed errors
    #[error("Location feed error: {0}")]
    Feed(#[from] FeedError),

    /// Marker store errors
    #[error("Marker store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A permission prompt was refused
    #[error("{0} permission denied")]
    PermissionDenied(Permission),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Permission kinds the engine asks for at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Location,
    Notifications,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Location => f.write_str("Location"),
            Permission::Notifications => f.write_str("Notification"),
        }
    }
}

/// Errors reported by a notification delivery adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    /// The OS refused to schedule the notification
    #[error("Notification scheduling denied: {0}")]
    Denied(String),

    /// The delivery backend failed
    #[error("Notification backend failed: {0}")]
    Backend(String),

    /// The delivery call did not complete in time
    #[error("Notification request timed out")]
    Timeout,
}

/// Errors reported by a location feed adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    /// The location source failed for this update
    #[error("Location source unavailable: {0}")]
    Unavailable(String),

    /// A fix with unusable coordinates
    #[error("Invalid fix ({latitude}, {longitude})")]
    InvalidFix { latitude: f64, longitude: f64 },

    /// Subscribing to the source failed
    #[error("Failed to subscribe to location updates: {0}")]
    SubscribeFailed(String),

    /// A recorded track could not be read
    #[error("Failed to read track {path}: {message}")]
    Track { path: PathBuf, message: String },
}

/// Errors reported by a marker store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the database
    #[error("Failed to open marker database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Marker database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Marker database is locked")]
    Locked,

    /// No marker with that id
    #[error("Marker {0} not found")]
    NotFound(MarkerId),

    /// Shared store state was poisoned by a panicking writer
    #[error("Marker store poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Coordinate outside WGS-84 ranges
    #[error("Coordinate out of range: latitude {latitude}, longitude {longitude}")]
    CoordinateOutOfRange { latitude: f64, longitude: f64 },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<tokio::time::error::Elapsed> for DeliveryError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        DeliveryError::Timeout
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_message_names_the_permission() {
        let err = CoreError::PermissionDenied(Permission::Location);
        assert_eq!(err.to_string(), "Location permission denied");
        let err = CoreError::PermissionDenied(Permission::Notifications);
        assert_eq!(err.to_string(), "Notification permission denied");
    }

    #[test]
    fn sqlite_failures_map_to_query_failed() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::QueryFailed(_)));
    }
}

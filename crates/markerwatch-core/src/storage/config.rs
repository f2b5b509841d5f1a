//! TOML-based application configuration.
//!
//! Holds the tunables of the proximity engine:
//! - Proximity threshold
//! - Location feed accuracy and filters
//! - Notification text and delivery timeout
//! - Marker-creation debounce delay
//!
//! Configuration is stored at `~/.config/markerwatch/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::engine::EngineConfig;
use crate::error::ConfigError;
use crate::feed::{AccuracyTier, FeedConfig};
use crate::notify::{NotificationTemplate, DEFAULT_DELIVERY_TIMEOUT};
use crate::proximity::Threshold;

/// Proximity classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProximitySection {
    /// Inclusive radius around each marker, in meters.
    #[serde(default = "default_threshold_m")]
    pub threshold_m: f64,
}

/// Location feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSection {
    #[serde(default)]
    pub accuracy: AccuracyTier,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_min_distance_m")]
    pub min_distance_m: f64,
    /// Classify the one-shot current location before live updates arrive.
    #[serde(default = "default_true")]
    pub use_initial_fix: bool,
}

/// Notification settings. `{id}` in title or body is replaced with the
/// marker id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsSection {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_body")]
    pub body: String,
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

/// Marker creation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkersSection {
    #[serde(default = "default_create_debounce_ms")]
    pub create_debounce_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/markerwatch/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub proximity: ProximitySection,
    #[serde(default)]
    pub location: LocationSection,
    #[serde(default)]
    pub notifications: NotificationsSection,
    #[serde(default)]
    pub markers: MarkersSection,
}

// Default functions
fn default_threshold_m() -> f64 {
    50.0
}
fn default_min_interval_ms() -> u64 {
    5_000
}
fn default_min_distance_m() -> f64 {
    5.0
}
fn default_true() -> bool {
    true
}
fn default_title() -> String {
    NotificationTemplate::default().title
}
fn default_body() -> String {
    NotificationTemplate::default().body
}
fn default_delivery_timeout_ms() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT.as_millis() as u64
}
fn default_create_debounce_ms() -> u64 {
    300
}

impl Default for ProximitySection {
    fn default() -> Self {
        Self {
            threshold_m: default_threshold_m(),
        }
    }
}

impl Default for LocationSection {
    fn default() -> Self {
        Self {
            accuracy: AccuracyTier::default(),
            min_interval_ms: default_min_interval_ms(),
            min_distance_m: default_min_distance_m(),
            use_initial_fix: true,
        }
    }
}

impl Default for NotificationsSection {
    fn default() -> Self {
        Self {
            title: default_title(),
            body: default_body(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

impl Default for MarkersSection {
    fn default() -> Self {
        Self {
            create_debounce_ms: default_create_debounce_ms(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, keeping the field's type.
    /// The change is held in memory; call [`Config::save`] to persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation. `self` is unchanged on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Every leaf value as `(dot.key, value)`, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out.sort();
        out
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        Threshold::meters(self.proximity.threshold_m)
            .map_err(|e| invalid("proximity.threshold_m", &e.to_string()))?;
        if !self.location.min_distance_m.is_finite() || self.location.min_distance_m < 0.0 {
            return Err(invalid(
                "location.min_distance_m",
                "must be a non-negative number of meters",
            ));
        }
        if self.notifications.delivery_timeout_ms == 0 {
            return Err(invalid("notifications.delivery_timeout_ms", "must be greater than zero"));
        }
        Ok(())
    }

    /// Build the engine settings from this config.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        self.validate()?;
        let threshold = Threshold::meters(self.proximity.threshold_m).map_err(|e| ConfigError::InvalidValue {
            key: "proximity.threshold_m".into(),
            message: e.to_string(),
        })?;
        Ok(EngineConfig {
            threshold,
            feed: FeedConfig {
                accuracy: self.location.accuracy,
                min_interval_ms: self.location.min_interval_ms,
                min_distance_m: self.location.min_distance_m,
            },
            use_initial_fix: self.location.use_initial_fix,
            template: NotificationTemplate {
                title: self.notifications.title.clone(),
                body: self.notifications.body.clone(),
            },
            delivery_timeout: Duration::from_millis(self.notifications.delivery_timeout_ms),
            create_debounce: Duration::from_millis(self.markers.create_debounce_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.proximity.threshold_m, 50.0);
        assert_eq!(parsed.location.accuracy, AccuracyTier::Balanced);
        assert_eq!(parsed.notifications.title, "You're near a marker!");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[proximity]\nthreshold_m = 120.0\n").unwrap();
        assert_eq!(parsed.proximity.threshold_m, 120.0);
        assert_eq!(parsed.markers.create_debounce_ms, 300);
        assert_eq!(parsed.location.min_interval_ms, 5_000);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("proximity.threshold_m").as_deref(), Some("50.0"));
        assert_eq!(cfg.get("location.accuracy").as_deref(), Some("balanced"));
        assert_eq!(cfg.get("location.use_initial_fix").as_deref(), Some("true"));
        assert!(cfg.get("location").is_none());
        assert!(cfg.get("location.missing_key").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.set("proximity.threshold_m", "75.5").unwrap();
        cfg.set("markers.create_debounce_ms", "500").unwrap();
        cfg.set("location.use_initial_fix", "false").unwrap();
        cfg.set("location.accuracy", "high").unwrap();
        cfg.set("notifications.body", "Marker {id} is close").unwrap();

        assert_eq!(cfg.proximity.threshold_m, 75.5);
        assert_eq!(cfg.markers.create_debounce_ms, 500);
        assert!(!cfg.location.use_initial_fix);
        assert_eq!(cfg.location.accuracy, AccuracyTier::High);
        assert_eq!(cfg.notifications.body, "Marker {id} is close");
    }

    #[test]
    fn set_integer_into_float_field() {
        let mut cfg = Config::default();
        cfg.set("proximity.threshold_m", "60").unwrap();
        assert_eq!(cfg.proximity.threshold_m, 60.0);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("proximity.radius", "10"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("", "10"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(cfg.set("location", "10"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_values_and_keeps_state() {
        let mut cfg = Config::default();
        assert!(cfg.set("location.use_initial_fix", "maybe").is_err());
        assert!(cfg.set("location.accuracy", "extreme").is_err());
        assert!(cfg.set("markers.create_debounce_ms", "1.5").is_err());
        assert!(cfg.set("proximity.threshold_m", "-1").is_err());
        assert!(cfg.set("notifications.delivery_timeout_ms", "0").is_err());

        assert_eq!(cfg.proximity.threshold_m, 50.0);
        assert!(cfg.location.use_initial_fix);
        assert_eq!(cfg.notifications.delivery_timeout_ms, 10_000);
    }

    #[test]
    fn entries_list_every_leaf() {
        let entries = Config::default().entries();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys.len(), 9);
        assert_eq!(keys[0], "location.accuracy");
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert!(keys.contains(&"proximity.threshold_m"));
        assert!(keys.contains(&"markers.create_debounce_ms"));
        assert!(entries
            .iter()
            .any(|(k, v)| k == "notifications.body" && v == "You are near saved marker {id}."));
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.proximity.threshold_m, 50.0);
        assert!(path.exists());
    }

    #[test]
    fn save_then_load_preserves_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.set("location.min_distance_m", "12.5").unwrap();
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.location.min_distance_m, 12.5);
    }

    #[test]
    fn load_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[proximity\nthreshold_m = ").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn engine_config_converts_units() {
        let mut cfg = Config::default();
        cfg.set("notifications.delivery_timeout_ms", "2500").unwrap();
        let engine = cfg.engine_config().unwrap();
        assert_eq!(engine.threshold.as_meters(), 50.0);
        assert_eq!(engine.delivery_timeout, Duration::from_millis(2_500));
        assert_eq!(engine.create_debounce, Duration::from_millis(300));
        assert_eq!(engine.feed.min_interval_ms, 5_000);
        assert!(engine.use_initial_fix);
    }
}

//! Plays a recorded track back as a live feed.
//!
//! Track files hold one point per line, either as JSON
//! (`{"latitude": 58.01, "longitude": 56.25}`) or as `lat,lon`. Blank lines
//! and lines starting with `#` are ignored.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use super::{FeedConfig, FixCallback, LocationFeed, Subscription};
use crate::error::FeedError;
use crate::geo::{distance_m, LocationFix};

/// One recorded position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
}

impl TrackPoint {
    fn to_fix(self) -> LocationFix {
        let mut fix = LocationFix::now(self.latitude, self.longitude);
        fix.accuracy_m = self.accuracy_m;
        fix
    }
}

/// Parse track text. Errors name the offending line (1-based).
pub fn parse_track(text: &str) -> Result<Vec<TrackPoint>, String> {
    let mut points = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let point = if line.starts_with('{') {
            serde_json::from_str::<TrackPoint>(line).map_err(|e| format!("line {}: {e}", i + 1))?
        } else {
            let mut parts = line.split(',').map(str::trim);
            let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(format!("line {}: expected `lat,lon`", i + 1));
            };
            let parse = |s: &str| {
                s.parse::<f64>()
                    .map_err(|e| format!("line {}: cannot parse '{s}' as number: {e}", i + 1))
            };
            TrackPoint {
                latitude: parse(lat)?,
                longitude: parse(lon)?,
                accuracy_m: None,
            }
        };
        points.push(point);
    }
    Ok(points)
}

pub struct ReplayFeed {
    points: Arc<Vec<TrackPoint>>,
    interval: Duration,
    done_tx: Arc<watch::Sender<bool>>,
    emitted: Arc<Mutex<usize>>,
}

impl ReplayFeed {
    pub fn new(points: Vec<TrackPoint>, interval: Duration) -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            points: Arc::new(points),
            interval,
            done_tx: Arc::new(done_tx),
            emitted: Arc::new(Mutex::new(0)),
        }
    }

    /// Load a track file from disk.
    pub fn from_file(path: &Path, interval: Duration) -> Result<Self, FeedError> {
        let track_err = |message: String| FeedError::Track {
            path: PathBuf::from(path),
            message,
        };
        let text = std::fs::read_to_string(path).map_err(|e| track_err(e.to_string()))?;
        let points = parse_track(&text).map_err(track_err)?;
        Ok(Self::new(points, interval))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of fixes delivered so far.
    pub fn emitted(&self) -> usize {
        self.emitted.lock().map(|n| *n).unwrap_or(0)
    }

    /// Resolves once the whole track has been played (or the subscription
    /// was removed).
    pub async fn finished(&self) {
        let mut rx = self.done_tx.subscribe();
        // Sender lives in self, so this only errs if it was dropped.
        let _ = rx.wait_for(|done| *done).await;
    }
}

#[async_trait]
impl LocationFeed for ReplayFeed {
    async fn request_permission(&self) -> bool {
        true
    }

    async fn current_fix(&self) -> Option<LocationFix> {
        self.points.first().map(|p| p.to_fix())
    }

    /// Plays the track on a background task. Points closer than
    /// `min_distance_m` to the last emitted one are skipped, like a platform
    /// distance filter would.
    async fn subscribe(&self, on_fix: FixCallback, config: FeedConfig) -> Result<Subscription, FeedError> {
        let points = self.points.clone();
        let interval = self.interval;
        let done_tx = self.done_tx.clone();
        let emitted = self.emitted.clone();
        done_tx.send_replace(false);

        let task = tokio::spawn(async move {
            let mut last: Option<TrackPoint> = None;
            for point in points.iter().copied() {
                if let Some(prev) = last {
                    let moved = distance_m(prev.latitude, prev.longitude, point.latitude, point.longitude);
                    if moved < config.min_distance_m {
                        debug!(moved_m = moved, "replay point within distance filter, skipped");
                        continue;
                    }
                    tokio::time::sleep(interval).await;
                }
                on_fix(Ok(point.to_fix()));
                if let Ok(mut n) = emitted.lock() {
                    *n += 1;
                }
                last = Some(point);
            }
            done_tx.send_replace(true);
        });

        let done_tx = self.done_tx.clone();
        Ok(Subscription::new(move || {
            task.abort();
            done_tx.send_replace(true);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn parses_csv_and_json_lines() {
        let text = "# walk\n58.01,56.25\n\n{\"latitude\": 1.5, \"longitude\": -2.0, \"accuracy_m\": 8.0}\n";
        let points = parse_track(text).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].latitude, 58.01);
        assert_eq!(points[1].accuracy_m, Some(8.0));
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_track("1.0,2.0\nnorth,east\n").unwrap_err();
        assert!(err.starts_with("line 2:"), "{err}");
        let err = parse_track("1.0,2.0,3.0\n").unwrap_err();
        assert!(err.contains("expected `lat,lon`"), "{err}");
    }

    #[test]
    fn from_file_wraps_errors_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "oops").unwrap();
        let err = ReplayFeed::from_file(file.path(), Duration::from_millis(1)).err().unwrap();
        assert!(matches!(err, FeedError::Track { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn plays_every_point_then_finishes() {
        let feed = ReplayFeed::new(
            parse_track("0.0,0.0\n0.0,0.01\n0.0,0.02\n").unwrap(),
            Duration::from_millis(100),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = feed
            .subscribe(
                Arc::new(move |r: Result<LocationFix, FeedError>| {
                    if let Ok(fix) = r {
                        sink.lock().unwrap().push(fix.longitude);
                    }
                }),
                FeedConfig::default(),
            )
            .await
            .unwrap();

        feed.finished().await;
        assert_eq!(*seen.lock().unwrap(), vec![0.0, 0.01, 0.02]);
        assert_eq!(feed.emitted(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn distance_filter_skips_jitter() {
        let feed = ReplayFeed::new(
            parse_track("0.0,0.0\n0.0,0.00001\n0.0,0.01\n").unwrap(),
            Duration::from_millis(10),
        );
        let count = Arc::new(Mutex::new(0usize));
        let c = count.clone();
        let _sub = feed
            .subscribe(
                Arc::new(move |_: Result<LocationFix, FeedError>| *c.lock().unwrap() += 1),
                FeedConfig {
                    min_distance_m: 5.0,
                    ..FeedConfig::default()
                },
            )
            .await
            .unwrap();

        feed.finished().await;
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn removing_subscription_stops_playback() {
        let feed = ReplayFeed::new(
            parse_track("0.0,0.0\n0.0,0.01\n0.0,0.02\n").unwrap(),
            Duration::from_secs(60),
        );
        let mut sub = feed
            .subscribe(Arc::new(|_: Result<LocationFix, FeedError>| {}), FeedConfig::default())
            .await
            .unwrap();
        tokio::task::yield_now().await;
        sub.remove();
        feed.finished().await;
        assert!(feed.emitted() < 3);
    }
}

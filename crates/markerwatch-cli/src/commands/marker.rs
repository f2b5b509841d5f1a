//! Saved marker commands for CLI.

use clap::Subcommand;
use markerwatch_core::{
    nearby, nearest, Config, Coordinate, LocationFix, MarkerId, MarkerStore, SqliteMarkerStore, StoreError,
    Threshold,
};
use serde::Serialize;

#[derive(Subcommand)]
pub enum MarkerAction {
    /// Save a marker
    Add {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// List saved markers, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a marker
    Delete {
        /// Marker id
        id: i64,
    },
    /// Show which markers are within the threshold of a position
    Near {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Radius in meters (defaults to proximity.threshold_m)
        #[arg(long)]
        threshold: Option<f64>,
    },
}

#[derive(Serialize)]
struct NearbyMarker {
    id: MarkerId,
    latitude: f64,
    longitude: f64,
    distance_m: f64,
}

#[derive(Serialize)]
struct NearReport {
    threshold_m: f64,
    nearby: Vec<NearbyMarker>,
    nearest: Option<NearbyMarker>,
}

pub fn run(action: MarkerAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = SqliteMarkerStore::open_default()?;

    match action {
        MarkerAction::Add { lat, lon } => {
            let id = store.add(Coordinate::checked(lat, lon)?)?;
            println!("Marker created: {id}");
        }
        MarkerAction::List { json } => {
            let markers = store.snapshot()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&markers)?);
            } else if markers.is_empty() {
                println!("no markers");
            } else {
                for m in &markers {
                    println!("{}\t{:.6}\t{:.6}", m.id, m.coordinate.latitude, m.coordinate.longitude);
                }
            }
        }
        MarkerAction::Delete { id } => {
            let id = MarkerId(id);
            if !store.delete(id)? {
                return Err(StoreError::NotFound(id).into());
            }
            println!("Marker deleted: {id}");
        }
        MarkerAction::Near { lat, lon, threshold } => {
            let here = Coordinate::checked(lat, lon)?;
            let threshold = match threshold {
                Some(m) => Threshold::meters(m)?,
                None => Config::load()?.engine_config()?.threshold,
            };
            let fix = LocationFix::now(here.latitude, here.longitude);
            let markers = store.snapshot()?;
            let ids = nearby(&fix, &markers, threshold);

            let describe = |id: MarkerId, c: Coordinate| NearbyMarker {
                id,
                latitude: c.latitude,
                longitude: c.longitude,
                distance_m: here.distance_to(&c),
            };
            let report = NearReport {
                threshold_m: threshold.as_meters(),
                nearby: markers
                    .iter()
                    .filter(|m| ids.contains(&m.id))
                    .map(|m| describe(m.id, m.coordinate))
                    .collect(),
                nearest: nearest(&fix, &markers).map(|(m, _)| describe(m.id, m.coordinate)),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

//! Proximity classification of markers against a single location fix.
//!
//! Pure and synchronous: one pass over the marker slice, no I/O. The
//! threshold is always supplied by the caller (see `[proximity]` in the
//! config file); the classifier itself never falls back to a radius.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geo::LocationFix;
use crate::marker::{Marker, MarkerId};

/// Proximity radius in meters. Always finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

/// Radius used when the config file does not set one.
pub const DEFAULT_THRESHOLD: Threshold = Threshold(50.0);

impl Threshold {
    pub fn meters(value: f64) -> Result<Self, ValidationError> {
        if value.is_finite() && value >= 0.0 {
            Ok(Self(value))
        } else {
            Err(ValidationError::InvalidValue {
                field: "threshold_m".into(),
                message: format!("must be a finite, non-negative number of meters (got {value})"),
            })
        }
    }

    pub fn as_meters(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Threshold {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Threshold::meters(value)
    }
}

impl From<Threshold> for f64 {
    fn from(t: Threshold) -> Self {
        t.0
    }
}

/// Ids of every marker whose distance from `fix` is at most `threshold`.
///
/// The boundary is inclusive.
pub fn nearby(fix: &LocationFix, markers: &[Marker], threshold: Threshold) -> BTreeSet<MarkerId> {
    let here = fix.coordinate();
    markers
        .iter()
        .filter(|m| here.distance_to(&m.coordinate) <= threshold.as_meters())
        .map(|m| m.id)
        .collect()
}

/// The closest marker to `fix` and its distance in meters.
pub fn nearest<'a>(fix: &LocationFix, markers: &'a [Marker]) -> Option<(&'a Marker, f64)> {
    let here = fix.coordinate();
    markers
        .iter()
        .map(|m| (m, here.distance_to(&m.coordinate)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::distance_m;
    use proptest::prelude::*;

    fn threshold(m: f64) -> Threshold {
        Threshold::meters(m).unwrap()
    }

    #[test]
    fn marker_at_fix_is_nearby() {
        let fix = LocationFix::now(0.0, 0.0);
        let markers = vec![Marker::new(1, 0.0, 0.0)];
        let ids = nearby(&fix, &markers, threshold(50.0));
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![MarkerId(1)]);
    }

    #[test]
    fn far_marker_is_excluded() {
        let fix = LocationFix::now(0.0, 0.01);
        let markers = vec![Marker::new(1, 0.0, 0.0)];
        assert!(nearby(&fix, &markers, threshold(50.0)).is_empty());
    }

    #[test]
    fn boundary_is_inclusive() {
        let markers = vec![Marker::new(7, 0.0, 0.001)];
        let fix = LocationFix::now(0.0, 0.0);
        let exact = distance_m(0.0, 0.0, 0.0, 0.001);
        assert!(nearby(&fix, &markers, threshold(exact)).contains(&MarkerId(7)));
        assert!(nearby(&fix, &markers, threshold(exact - 0.001)).is_empty());
    }

    #[test]
    fn zero_threshold_matches_only_exact_position() {
        let fix = LocationFix::now(10.0, 10.0);
        let markers = vec![Marker::new(1, 10.0, 10.0), Marker::new(2, 10.0, 10.000_01)];
        let ids = nearby(&fix, &markers, threshold(0.0));
        assert_eq!(ids.len(), 1);
        assert!(ids.contains(&MarkerId(1)));
    }

    #[test]
    fn empty_marker_set_yields_nothing() {
        let fix = LocationFix::now(0.0, 0.0);
        assert!(nearby(&fix, &[], threshold(1_000.0)).is_empty());
        assert!(nearest(&fix, &[]).is_none());
    }

    #[test]
    fn nearest_picks_closest_marker() {
        let fix = LocationFix::now(0.0, 0.0);
        let markers = vec![
            Marker::new(1, 0.0, 0.002),
            Marker::new(2, 0.0, 0.0005),
            Marker::new(3, 0.01, 0.0),
        ];
        let (m, d) = nearest(&fix, &markers).unwrap();
        assert_eq!(m.id, MarkerId(2));
        assert!(d < 60.0);
    }

    #[test]
    fn threshold_rejects_negative_and_nan() {
        assert!(Threshold::meters(-1.0).is_err());
        assert!(Threshold::meters(f64::NAN).is_err());
        assert!(Threshold::meters(f64::INFINITY).is_err());
        assert_eq!(threshold(50.0).as_meters(), 50.0);
    }

    fn arb_markers() -> impl Strategy<Value = Vec<Marker>> {
        prop::collection::vec((-0.01f64..0.01, -0.01f64..0.01), 0..40).prop_map(|pts| {
            pts.into_iter()
                .enumerate()
                .map(|(i, (lat, lon))| Marker::new(i as i64, lat, lon))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn nearby_matches_brute_force(
            lat in -0.01f64..0.01,
            lon in -0.01f64..0.01,
            t in 0.0f64..2_000.0,
            markers in arb_markers(),
        ) {
            let fix = LocationFix::now(lat, lon);
            let got = nearby(&fix, &markers, threshold(t));
            let mut expected = BTreeSet::new();
            for m in &markers {
                if distance_m(lat, lon, m.coordinate.latitude, m.coordinate.longitude) <= t {
                    expected.insert(m.id);
                }
            }
            prop_assert_eq!(got, expected);
        }
    }
}

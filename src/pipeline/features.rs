//! Pairing of independently fetched weather and irradiance horizons.
//!
//! The two upstream providers publish on their own cadences, so their
//! horizons may start at different hours or have gaps. Points are joined by
//! timestamp (floored to the hour); anything without a partner is dropped.
//! Joining by position would silently mispair data whenever the horizons
//! shift against each other.

use std::collections::BTreeMap;

use super::floor_to_hour;
use crate::domain::{IrradiancePoint, WeatherPoint};
use crate::predictor::FeaturePoint;

/// Result of pairing the two horizons
#[derive(Debug, Clone, PartialEq)]
pub struct PairedFeatures {
    /// Sorted by timestamp, one entry per hour both horizons cover
    pub points: Vec<FeaturePoint>,
    /// Input points that had no partner at the same hour
    pub unmatched: usize,
}

pub fn pair_by_timestamp(
    weather: &[WeatherPoint],
    irradiance: &[IrradiancePoint],
) -> PairedFeatures {
    let irradiance_by_hour: BTreeMap<_, _> = irradiance
        .iter()
        .map(|p| (floor_to_hour(p.timestamp), p.irradiance_wm2))
        .collect();

    let mut points: BTreeMap<_, FeaturePoint> = BTreeMap::new();
    for w in weather {
        let hour = floor_to_hour(w.timestamp);
        if let Some(&irradiance_wm2) = irradiance_by_hour.get(&hour) {
            points.insert(
                hour,
                FeaturePoint {
                    timestamp: hour,
                    temperature_c: w.temperature_c,
                    humidity_percent: w.humidity_percent,
                    cloud_cover: w.sky.cloud_cover_fraction(),
                    irradiance_wm2,
                },
            );
        }
    }

    let matched = points.len();
    let unmatched = (weather.len() - matched) + (irradiance_by_hour.len() - matched);
    PairedFeatures {
        points: points.into_values().collect(),
        unmatched,
    }
}

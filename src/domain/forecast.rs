//! Persisted forecast row types.
//!
//! Three time-indexed tables make up the pipeline's output: the hourly
//! forecast (authoritative), the daily rollup (derived, disposable) and the
//! intraday realtime counter. Natural keys are (plant, timestamp, version)
//! or (plant, date, version); the store enforces them as unique.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::plant::PlantId;

/// Opaque model-version tag. The pipeline never interprets its content; it
/// only filters and keys rows by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersion(pub String);

impl ModelVersion {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One predicted power value per (plant, hour, model version)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub plant_id: PlantId,
    pub timestamp: DateTime<Utc>,
    pub predicted_power_mw: f64,
    pub model_version: ModelVersion,
}

/// Daily total derived from the hourly table, one row per
/// (plant, calendar date, model version)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub plant_id: PlantId,
    pub date: NaiveDate,
    pub total_power_mwh: f64,
    pub model_version: ModelVersion,
}

/// Point prediction plus the running intraday total, one row per
/// (plant, hour, model version)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeGeneration {
    pub plant_id: PlantId,
    pub timestamp: DateTime<Utc>,
    pub predicted_power_mw: f64,
    pub cumulative_power_mwh: f64,
    pub model_version: ModelVersion,
}

//! Power prediction seam.
//!
//! The trained forecasting model is an external collaborator: a
//! deterministic function from feature vectors to power values. The
//! pipeline owns only the trait and a regression baseline; callers clamp
//! negative outputs before storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod baseline;

pub use baseline::IrradianceRegressionPredictor;

/// One model input: the paired weather and irradiance values for an hour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeaturePoint {
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
    pub humidity_percent: f64,
    /// Fractional cloud cover, 0.0 (clear) to 1.0 (overcast)
    pub cloud_cover: f64,
    /// GHI in W/m^2
    pub irradiance_wm2: f64,
}

/// One model output: predicted plant power for an hour
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedPoint {
    pub timestamp: DateTime<Utc>,
    pub power_mw: f64,
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("predictor produced no output")]
    EmptyOutput,

    #[error("prediction failed: {0}")]
    Failed(String),
}

/// Deterministic mapping from a feature sequence to per-hour power values.
/// The same input must always yield the same output.
pub trait PowerPredictor: Send + Sync {
    fn predict(&self, features: &[FeaturePoint]) -> Result<Vec<PredictedPoint>, PredictionError>;
}

//! Regression baseline predictor.
//!
//! Linear model over the irradiance/weather features with a capacity
//! ceiling. The coefficients are stand-ins for a trained export; the
//! structure (weights applied to a fixed feature order, capacity clamp)
//! mirrors what a real model artifact provides.

use super::{FeaturePoint, PowerPredictor, PredictedPoint, PredictionError};

/// Linear regression over (irradiance, temperature, humidity, cloud cover)
#[derive(Debug, Clone)]
pub struct IrradianceRegressionPredictor {
    /// Plant capacity in MW, the output ceiling
    pub capacity_mw: f64,
    /// MW produced per W/m^2 of irradiance at reference conditions
    pub irradiance_coeff: f64,
    /// Temperature derating per degree above the reference cell temperature
    pub temperature_coeff: f64,
    pub humidity_coeff: f64,
    pub cloud_coeff: f64,
    pub intercept: f64,
}

/// Reference cell temperature in degrees C; output derates above it
const REFERENCE_TEMP_C: f64 = 25.0;

impl IrradianceRegressionPredictor {
    pub fn new(capacity_mw: f64) -> Self {
        // Roughly: nameplate output at 1000 W/m^2, derated by heat,
        // humidity and cloud cover
        Self {
            capacity_mw,
            irradiance_coeff: capacity_mw / 1000.0,
            temperature_coeff: -0.004 * capacity_mw,
            humidity_coeff: -0.0005 * capacity_mw,
            cloud_coeff: -0.15 * capacity_mw,
            intercept: 0.0,
        }
    }

    fn predict_one(&self, f: &FeaturePoint) -> f64 {
        let temp_excess = (f.temperature_c - REFERENCE_TEMP_C).max(0.0);
        let raw = self.intercept
            + self.irradiance_coeff * f.irradiance_wm2
            + self.temperature_coeff * temp_excess
            + self.humidity_coeff * f.humidity_percent
            + self.cloud_coeff * f.cloud_cover;
        raw.min(self.capacity_mw)
    }
}

impl PowerPredictor for IrradianceRegressionPredictor {
    fn predict(&self, features: &[FeaturePoint]) -> Result<Vec<PredictedPoint>, PredictionError> {
        if features.is_empty() {
            return Err(PredictionError::EmptyOutput);
        }

        Ok(features
            .iter()
            .map(|f| PredictedPoint {
                timestamp: f.timestamp,
                power_mw: self.predict_one(f),
            })
            .collect())
    }
}

//! External forecast sources.
//!
//! Weather and irradiance come from two independent upstream services. Both
//! are fallible collaborators: a failed or empty fetch is an expected
//! per-plant outcome, never a pipeline-wide error.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{GeoLocation, IrradiancePoint, WeatherPoint};

pub mod kier;
pub mod kma;

pub use kier::KierIrradianceClient;
pub use kma::KmaWeatherClient;

/// Errors from an upstream provider call
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider rejected the request: {code}: {message}")]
    Api { code: String, message: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider returned no usable data")]
    Empty,
}

/// Source of weather observations and forward-looking weather forecasts
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch an hourly weather forecast covering the configured multi-day
    /// horizon, ordered by timestamp.
    async fn fetch_horizon(&self, location: GeoLocation) -> Result<Vec<WeatherPoint>, ProviderError>;

    /// Fetch the current-hour weather observation.
    async fn fetch_current(&self, location: GeoLocation) -> Result<WeatherPoint, ProviderError>;
}

/// Source of global horizontal irradiance data
#[async_trait]
pub trait IrradianceProvider: Send + Sync {
    /// Fetch an hourly irradiance forecast covering the configured
    /// multi-day horizon, ordered by timestamp.
    async fn fetch_horizon(
        &self,
        location: GeoLocation,
    ) -> Result<Vec<IrradiancePoint>, ProviderError>;

    /// Fetch the current-hour irradiance value.
    async fn fetch_current(&self, location: GeoLocation) -> Result<IrradiancePoint, ProviderError>;
}

//! Weather and irradiance observation types shared by the external
//! providers and the prediction pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Precipitation type reported by the weather provider (KMA PTY code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PrecipType {
    None,
    Rain,
    RainSnow,
    Snow,
    Drizzle,
    SnowShower,
    Unknown,
}

impl PrecipType {
    /// Decode the KMA `PTY` category value
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Rain,
            2 | 6 => Self::RainSnow,
            3 => Self::Snow,
            5 => Self::Drizzle,
            7 => Self::SnowShower,
            _ => Self::Unknown,
        }
    }
}

/// Sky condition reported by the weather provider (KMA SKY code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkyCondition {
    Clear,
    PartlyCloudy,
    Overcast,
    Unknown,
}

impl SkyCondition {
    /// Decode the KMA `SKY` category value
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Clear,
            3 => Self::PartlyCloudy,
            4 => Self::Overcast,
            _ => Self::Unknown,
        }
    }

    /// Approximate fractional cloud cover for this sky state, used as a
    /// model feature when the provider gives no numeric cloud value.
    pub fn cloud_cover_fraction(&self) -> f64 {
        match self {
            Self::Clear => 0.05,
            Self::PartlyCloudy | Self::Unknown => 0.5,
            Self::Overcast => 0.9,
        }
    }
}

/// One weather observation or forecast point for a plant location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherPoint {
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
    pub humidity_percent: f64,
    pub wind_speed_ms: f64,
    pub sky: SkyCondition,
    pub precip_type: PrecipType,
    /// Probability of precipitation in percent; observations carry 0.
    pub precip_probability: f64,
}

/// One global horizontal irradiance point for a plant location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrradiancePoint {
    pub timestamp: DateTime<Utc>,
    /// GHI in W/m^2
    pub irradiance_wm2: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, PrecipType::None)]
    #[case(1, PrecipType::Rain)]
    #[case(2, PrecipType::RainSnow)]
    #[case(3, PrecipType::Snow)]
    #[case(5, PrecipType::Drizzle)]
    #[case(6, PrecipType::RainSnow)]
    #[case(7, PrecipType::SnowShower)]
    #[case(42, PrecipType::Unknown)]
    fn decodes_pty_codes(#[case] code: i32, #[case] expected: PrecipType) {
        assert_eq!(PrecipType::from_code(code), expected);
    }

    #[rstest]
    #[case(1, SkyCondition::Clear)]
    #[case(3, SkyCondition::PartlyCloudy)]
    #[case(4, SkyCondition::Overcast)]
    #[case(9, SkyCondition::Unknown)]
    fn decodes_sky_codes(#[case] code: i32, #[case] expected: SkyCondition) {
        assert_eq!(SkyCondition::from_code(code), expected);
    }

    #[test]
    fn clear_sky_has_less_cloud_than_overcast() {
        assert!(
            SkyCondition::Clear.cloud_cover_fraction()
                < SkyCondition::Overcast.cloud_cover_fraction()
        );
    }
}

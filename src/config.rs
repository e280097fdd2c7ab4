use anyhow::{Context, Result};
use chrono_tz::Tz;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;

use crate::domain::Plant;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub scheduler: SchedulerSettings,
    pub weather: WeatherConfig,
    pub irradiance: IrradianceConfig,
    pub predictor: PredictorConfig,
    pub plants: Vec<Plant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub model_version: String,
    pub realtime_model_version: String,
    pub horizon_hours: i64,
    pub timezone: String,
}

impl PipelineConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid pipeline.timezone {:?}: {e}", self.timezone))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    pub realtime_interval_secs: u64,
    pub daily_run_hour: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    pub base_url: String,
    pub service_key: String,
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IrradianceConfig {
    pub base_url: String,
    pub service_key: String,
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictorConfig {
    pub capacity_mw: f64,
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("SOLAR__").split("__"));
        let config: Config = figment.extract().context("failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.plants.is_empty(), "at least one plant must be configured");
        anyhow::ensure!(
            (1..=720).contains(&self.pipeline.horizon_hours),
            "pipeline.horizon_hours must be between 1 and 720"
        );
        anyhow::ensure!(
            self.scheduler.daily_run_hour < 24,
            "scheduler.daily_run_hour must be 0-23"
        );
        anyhow::ensure!(
            self.predictor.capacity_mw > 0.0,
            "predictor.capacity_mw must be positive"
        );
        self.pipeline.timezone()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlantId;

    fn valid_config() -> Config {
        Config {
            pipeline: PipelineConfig {
                model_version: "m1".to_string(),
                realtime_model_version: "m1-rt".to_string(),
                horizon_hours: 72,
                timezone: "Asia/Seoul".to_string(),
            },
            scheduler: SchedulerSettings {
                realtime_interval_secs: 3600,
                daily_run_hour: 0,
            },
            weather: WeatherConfig {
                base_url: "http://localhost".to_string(),
                service_key: "key".to_string(),
                http_timeout_seconds: 30,
            },
            irradiance: IrradianceConfig {
                base_url: "http://localhost".to_string(),
                service_key: "key".to_string(),
                http_timeout_seconds: 30,
            },
            predictor: PredictorConfig { capacity_mw: 2.0 },
            plants: vec![Plant {
                id: PlantId(1),
                name: "test".to_string(),
                latitude: 34.75,
                longitude: 126.65,
            }],
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn horizon_hours_must_stay_in_bounds() {
        let mut cfg = valid_config();
        cfg.pipeline.horizon_hours = 0;
        assert!(cfg.validate().is_err());

        cfg.pipeline.horizon_hours = 100_000;
        assert!(cfg.validate().is_err());

        cfg.pipeline.horizon_hours = 720;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bad_timezone_is_rejected() {
        let mut cfg = valid_config();
        cfg.pipeline.timezone = "Mars/Olympus_Mons".to_string();
        assert!(cfg.validate().is_err());
    }
}

use anyhow::Result;
use solar_forecast_pipeline::{config, pipeline, predictor, providers, store, telemetry};

use config::Config;
use pipeline::{JobScheduler, RealtimeCounterJob, RetentionJob, RollingForecastJob, SchedulerConfig};
use predictor::IrradianceRegressionPredictor;
use providers::{KierIrradianceClient, KmaWeatherClient};
use solar_forecast_pipeline::domain::ModelVersion;
use std::sync::Arc;
use std::time::Duration;
use store::MemoryStore;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    if cfg.weather.service_key.is_empty() || cfg.weather.service_key.starts_with("__SET_VIA_ENV") {
        anyhow::bail!(
            "SOLAR__WEATHER__SERVICE_KEY environment variable must be set to a valid KMA service key"
        );
    }
    if cfg.irradiance.service_key.is_empty()
        || cfg.irradiance.service_key.starts_with("__SET_VIA_ENV")
    {
        anyhow::bail!(
            "SOLAR__IRRADIANCE__SERVICE_KEY environment variable must be set to a valid KIER service key"
        );
    }

    let timezone = cfg.pipeline.timezone()?;
    let horizon_hours = u32::try_from(cfg.pipeline.horizon_hours)?;
    let horizon_days = horizon_hours.div_ceil(24);

    let weather = Arc::new(KmaWeatherClient::new(
        cfg.weather.base_url.clone(),
        cfg.weather.service_key.clone(),
        timezone,
        horizon_hours,
        Duration::from_secs(cfg.weather.http_timeout_seconds),
    )?);
    let irradiance = Arc::new(KierIrradianceClient::new(
        cfg.irradiance.base_url.clone(),
        cfg.irradiance.service_key.clone(),
        timezone,
        horizon_days,
        Duration::from_secs(cfg.irradiance.http_timeout_seconds),
    )?);
    let predictor = Arc::new(IrradianceRegressionPredictor::new(cfg.predictor.capacity_mw));
    let store = Arc::new(MemoryStore::new());

    let rolling = Arc::new(RollingForecastJob::new(
        weather.clone(),
        irradiance.clone(),
        predictor.clone(),
        store.clone(),
        cfg.plants.clone(),
        ModelVersion(cfg.pipeline.model_version.clone()),
        timezone,
    ));
    let realtime = Arc::new(RealtimeCounterJob::new(
        weather,
        irradiance,
        predictor,
        store.clone(),
        cfg.plants.clone(),
        ModelVersion(cfg.pipeline.realtime_model_version.clone()),
        timezone,
    ));
    let retention = Arc::new(RetentionJob::new(store, timezone));

    info!(
        plants = cfg.plants.len(),
        horizon_hours,
        timezone = %timezone,
        "starting solar forecast pipeline"
    );

    // Seed the forecast window before any scheduled job can fire; the
    // jobs are not designed to run concurrently with each other
    if let Err(err) = rolling.run().await {
        warn!(error = %err, "initial forecast pass failed");
    }

    let scheduler = Arc::new(JobScheduler::new(
        SchedulerConfig {
            realtime_interval_secs: cfg.scheduler.realtime_interval_secs,
            daily_run_hour: cfg.scheduler.daily_run_hour,
        },
        timezone,
        rolling,
        realtime,
        retention,
    ));
    scheduler.start();

    telemetry::shutdown_signal().await;

    warn!("shutdown complete");
    Ok(())
}

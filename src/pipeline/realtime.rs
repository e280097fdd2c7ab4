//! Hourly realtime counter job.
//!
//! Each tick records one point prediction per plant and extends the day's
//! running total. The prior-row lookup is strictly before the current hour,
//! so a re-tick for the same hour recomputes the row instead of adding to
//! it, and a date change between the stored latest row and now resets the
//! total to this hour's value alone.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{info, warn};

use super::{floor_to_hour, local_date, PlantOutcome, RunReport, SkipReason};
use crate::domain::{ModelVersion, Plant, RealtimeGeneration};
use crate::predictor::{FeaturePoint, PowerPredictor};
use crate::providers::{IrradianceProvider, WeatherProvider};
use crate::store::ForecastStore;

pub struct RealtimeCounterJob {
    weather: Arc<dyn WeatherProvider>,
    irradiance: Arc<dyn IrradianceProvider>,
    predictor: Arc<dyn PowerPredictor>,
    store: Arc<dyn ForecastStore>,
    plants: Vec<Plant>,
    version: ModelVersion,
    timezone: Tz,
}

impl RealtimeCounterJob {
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        irradiance: Arc<dyn IrradianceProvider>,
        predictor: Arc<dyn PowerPredictor>,
        store: Arc<dyn ForecastStore>,
        plants: Vec<Plant>,
        version: ModelVersion,
        timezone: Tz,
    ) -> Self {
        Self {
            weather,
            irradiance,
            predictor,
            store,
            plants,
            version,
            timezone,
        }
    }

    /// Run one tick for all plants. `now` is the wall-clock trigger time;
    /// all rows are keyed by its hour floor.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let current_hour = floor_to_hour(now);
        let mut report = RunReport::default();

        for plant in &self.plants {
            let outcome = self
                .run_plant(plant, current_hour)
                .await
                .with_context(|| format!("realtime store failure for plant {}", plant.id))?;

            match &outcome {
                PlantOutcome::TickRecorded { timestamp, cumulative_power_mwh } => {
                    info!(plant = %plant.id, %timestamp, cumulative_power_mwh, "realtime tick recorded");
                }
                PlantOutcome::Skipped(reason) => {
                    warn!(plant = %plant.id, %reason, "plant skipped");
                }
                PlantOutcome::WindowReplaced { .. } => {
                    unreachable!("realtime job never replaces windows")
                }
            }
            report.record(plant.id, outcome);
        }

        Ok(report)
    }

    async fn run_plant(&self, plant: &Plant, current_hour: DateTime<Utc>) -> Result<PlantOutcome> {
        let location = plant.location();

        let weather = match self.weather.fetch_current(location).await {
            Ok(point) => point,
            Err(err) => return Ok(PlantOutcome::Skipped(SkipReason::WeatherFetch(err.to_string()))),
        };
        let irradiance = match self.irradiance.fetch_current(location).await {
            Ok(point) => point,
            Err(err) => {
                return Ok(PlantOutcome::Skipped(SkipReason::IrradianceFetch(err.to_string())))
            }
        };

        let feature = FeaturePoint {
            timestamp: current_hour,
            temperature_c: weather.temperature_c,
            humidity_percent: weather.humidity_percent,
            cloud_cover: weather.sky.cloud_cover_fraction(),
            irradiance_wm2: irradiance.irradiance_wm2,
        };

        let power_mw = match self.predictor.predict(&[feature]) {
            Ok(points) => match points.first() {
                Some(point) => point.power_mw.max(0.0),
                None => return Ok(PlantOutcome::Skipped(SkipReason::Prediction("empty output".into()))),
            },
            Err(err) => return Ok(PlantOutcome::Skipped(SkipReason::Prediction(err.to_string()))),
        };

        let today = local_date(current_hour, self.timezone);

        let mut txn = self.store.begin().await?;
        let prior = txn
            .latest_realtime_before(plant.id, &self.version, current_hour)
            .await?;

        // Accumulate only while the prior row is from the same local day;
        // anything else (no data, yesterday's row) starts over
        let cumulative_power_mwh = match prior {
            Some(ref row) if local_date(row.timestamp, self.timezone) == today => {
                row.cumulative_power_mwh + power_mw
            }
            _ => power_mw,
        };

        txn.upsert_realtime(RealtimeGeneration {
            plant_id: plant.id,
            timestamp: current_hour,
            predicted_power_mw: power_mw,
            cumulative_power_mwh,
            model_version: self.version.clone(),
        })
        .await?;
        txn.commit().await?;

        Ok(PlantOutcome::TickRecorded {
            timestamp: current_hour,
            cumulative_power_mwh,
        })
    }
}

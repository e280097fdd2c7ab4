//! Multi-day rolling forecast job, scheduled once per day.
//!
//! For each plant: fetch both horizons, pair them by timestamp, predict,
//! then atomically replace the covered hourly window and rebuild the daily
//! rollup it spans. The delete-then-insert replacement makes re-runs and
//! horizon shifts idempotent.

use anyhow::{Context, Result};
use chrono::Duration;
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    features::pair_by_timestamp, floor_to_hour, local_date, DailyAggregationEngine, PlantOutcome,
    RunReport, SkipReason,
};
use crate::domain::{HourlyForecast, ModelVersion, Plant};
use crate::predictor::PowerPredictor;
use crate::providers::{IrradianceProvider, WeatherProvider};
use crate::store::{ForecastStore, HourWindow};

pub struct RollingForecastJob {
    weather: Arc<dyn WeatherProvider>,
    irradiance: Arc<dyn IrradianceProvider>,
    predictor: Arc<dyn PowerPredictor>,
    store: Arc<dyn ForecastStore>,
    plants: Vec<Plant>,
    version: ModelVersion,
    aggregation: DailyAggregationEngine,
    timezone: Tz,
}

impl RollingForecastJob {
    #[allow(clippy::too_many_arguments)]
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
            aggregation: DailyAggregationEngine::new(timezone),
            timezone,
        }
    }

    /// Run one forecast pass over all plants. Fetch and prediction
    /// failures skip the affected plant; a store failure aborts the run
    /// (uncommitted work for the failing plant is discarded, previously
    /// committed plants keep their fresh data).
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::default();

        for plant in &self.plants {
            let outcome = self
                .run_plant(plant)
                .await
                .with_context(|| format!("rolling forecast store failure for plant {}", plant.id))?;

            match &outcome {
                PlantOutcome::WindowReplaced { window, rows } => {
                    info!(plant = %plant.id, start = %window.start, end = %window.end, rows, "hourly forecast replaced");
                }
                PlantOutcome::Skipped(reason) => {
                    warn!(plant = %plant.id, %reason, "plant skipped");
                }
                PlantOutcome::TickRecorded { .. } => unreachable!("rolling job never records ticks"),
            }
            report.record(plant.id, outcome);
        }

        info!(updated = report.updated(), skipped = report.skipped(), "rolling forecast run finished");
        Ok(report)
    }

    /// Errors returned here are store-level failures; everything upstream
    /// of the store becomes a skip outcome.
    async fn run_plant(&self, plant: &Plant) -> Result<PlantOutcome> {
        let location = plant.location();

        let weather = match self.weather.fetch_horizon(location).await {
            Ok(points) if !points.is_empty() => points,
            Ok(_) => return Ok(PlantOutcome::Skipped(SkipReason::WeatherFetch("empty horizon".into()))),
            Err(err) => return Ok(PlantOutcome::Skipped(SkipReason::WeatherFetch(err.to_string()))),
        };

        let irradiance = match self.irradiance.fetch_horizon(location).await {
            Ok(points) if !points.is_empty() => points,
            Ok(_) => {
                return Ok(PlantOutcome::Skipped(SkipReason::IrradianceFetch("empty horizon".into())))
            }
            Err(err) => return Ok(PlantOutcome::Skipped(SkipReason::IrradianceFetch(err.to_string()))),
        };

        let paired = pair_by_timestamp(&weather, &irradiance);
        if paired.points.is_empty() {
            return Ok(PlantOutcome::Skipped(SkipReason::MisalignedHorizons));
        }
        if paired.unmatched > 0 {
            warn!(plant = %plant.id, unmatched = paired.unmatched, "dropping horizon points without a partner timestamp");
        }

        let predictions = match self.predictor.predict(&paired.points) {
            Ok(points) if !points.is_empty() => points,
            Ok(_) => return Ok(PlantOutcome::Skipped(SkipReason::Prediction("empty output".into()))),
            Err(err) => return Ok(PlantOutcome::Skipped(SkipReason::Prediction(err.to_string()))),
        };

        // Covered window: first predicted hour to one hour past the last
        let first = floor_to_hour(predictions[0].timestamp);
        let last = floor_to_hour(predictions[predictions.len() - 1].timestamp);
        let window = HourWindow::new(first, last + Duration::hours(1));

        let mut txn = self.store.begin().await?;
        txn.delete_hourly_range(plant.id, &self.version, window).await?;
        for prediction in &predictions {
            txn.upsert_hourly(HourlyForecast {
                plant_id: plant.id,
                timestamp: floor_to_hour(prediction.timestamp),
                // Physically power output cannot be negative
                predicted_power_mw: prediction.power_mw.max(0.0),
                model_version: self.version.clone(),
            })
            .await?;
        }

        let first_date = local_date(window.start, self.timezone);
        let last_date = local_date(last, self.timezone);
        self.aggregation
            .rebuild(txn.as_mut(), plant.id, &self.version, first_date, last_date)
            .await?;

        txn.commit().await?;

        Ok(PlantOutcome::WindowReplaced {
            window,
            rows: predictions.len() as u64,
        })
    }
}

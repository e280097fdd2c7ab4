//! End-to-end behavior of the three jobs over the in-memory store:
//! window replacement, daily rollups, the cumulative counter, and
//! retention, all driven by scripted providers and a pass-through
//! predictor.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use solar_forecast_pipeline::domain::{
    GeoLocation, IrradiancePoint, ModelVersion, Plant, PlantId, PrecipType, SkyCondition,
    WeatherPoint,
};
use solar_forecast_pipeline::pipeline::{
    PlantOutcome, RealtimeCounterJob, RetentionJob, RollingForecastJob, SkipReason,
};
use solar_forecast_pipeline::predictor::{
    FeaturePoint, PowerPredictor, PredictedPoint, PredictionError,
};
use solar_forecast_pipeline::providers::{
    IrradianceProvider, ProviderError, WeatherProvider,
};
use solar_forecast_pipeline::store::{ForecastStore, HourWindow, MemoryStore};

const TZ: Tz = chrono_tz::UTC;

fn plant(id: u32) -> Plant {
    // Latitude doubles as the stub lookup key
    Plant {
        id: PlantId(id),
        name: format!("plant-{id}"),
        latitude: id as f64,
        longitude: 127.0,
    }
}

fn weather_at(ts: DateTime<Utc>) -> WeatherPoint {
    WeatherPoint {
        timestamp: ts,
        temperature_c: 20.0,
        humidity_percent: 50.0,
        wind_speed_ms: 2.0,
        sky: SkyCondition::Clear,
        precip_type: PrecipType::None,
        precip_probability: 0.0,
    }
}

/// Scripted provider: horizons and current values keyed by plant latitude.
/// A missing key means the fetch fails.
#[derive(Default)]
struct ScriptedProvider {
    horizons: Mutex<HashMap<u32, Vec<IrradiancePoint>>>,
}

impl ScriptedProvider {
    fn set(&self, plant_id: u32, points: Vec<IrradiancePoint>) {
        self.horizons.lock().insert(plant_id, points);
    }

    fn clear(&self, plant_id: u32) {
        self.horizons.lock().remove(&plant_id);
    }

    fn lookup(&self, location: GeoLocation) -> Result<Vec<IrradiancePoint>, ProviderError> {
        self.horizons
            .lock()
            .get(&(location.latitude as u32))
            .cloned()
            .ok_or(ProviderError::Empty)
    }
}

#[async_trait]
impl IrradianceProvider for ScriptedProvider {
    async fn fetch_horizon(
        &self,
        location: GeoLocation,
    ) -> Result<Vec<IrradiancePoint>, ProviderError> {
        self.lookup(location)
    }

    async fn fetch_current(&self, location: GeoLocation) -> Result<IrradiancePoint, ProviderError> {
        self.lookup(location)?
            .into_iter()
            .next_back()
            .ok_or(ProviderError::Empty)
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn fetch_horizon(
        &self,
        location: GeoLocation,
    ) -> Result<Vec<WeatherPoint>, ProviderError> {
        Ok(self
            .lookup(location)?
            .into_iter()
            .map(|p| weather_at(p.timestamp))
            .collect())
    }

    async fn fetch_current(&self, location: GeoLocation) -> Result<WeatherPoint, ProviderError> {
        let point = self
            .lookup(location)?
            .into_iter()
            .next_back()
            .ok_or(ProviderError::Empty)?;
        Ok(weather_at(point.timestamp))
    }
}

/// Pass-through model: power equals irradiance, which makes expected
/// store contents trivial to state.
struct IdentityPredictor;

impl PowerPredictor for IdentityPredictor {
    fn predict(&self, features: &[FeaturePoint]) -> Result<Vec<PredictedPoint>, PredictionError> {
        if features.is_empty() {
            return Err(PredictionError::EmptyOutput);
        }
        Ok(features
            .iter()
            .map(|f| PredictedPoint {
                timestamp: f.timestamp,
                power_mw: f.irradiance_wm2,
            })
            .collect())
    }
}

fn irradiance_series(
    start: DateTime<Utc>,
    values: &[f64],
) -> Vec<IrradiancePoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| IrradiancePoint {
            timestamp: start + Duration::hours(i as i64),
            irradiance_wm2: v,
        })
        .collect()
}

struct Fixture {
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryStore>,
    rolling: RollingForecastJob,
    realtime: RealtimeCounterJob,
    retention: RetentionJob,
    version: ModelVersion,
}

fn fixture(plants: Vec<Plant>) -> Fixture {
    let provider = Arc::new(ScriptedProvider::default());
    let store = Arc::new(MemoryStore::new());
    let predictor = Arc::new(IdentityPredictor);
    let version = ModelVersion::new("test-model");

    let rolling = RollingForecastJob::new(
        provider.clone(),
        provider.clone(),
        predictor.clone(),
        store.clone(),
        plants.clone(),
        version.clone(),
        TZ,
    );
    let realtime = RealtimeCounterJob::new(
        provider.clone(),
        provider.clone(),
        predictor,
        store.clone(),
        plants,
        version.clone(),
        TZ,
    );
    let retention = RetentionJob::new(store.clone(), TZ);

    Fixture {
        provider,
        store,
        rolling,
        realtime,
        retention,
        version,
    }
}

fn hour(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn rolling_run_twice_with_same_inputs_is_idempotent() {
    let fx = fixture(vec![plant(1)]);
    let start = hour(2026, 6, 1, 0);
    fx.provider.set(1, irradiance_series(start, &[100.0, 200.0, 300.0]));

    fx.rolling.run().await.unwrap();
    let first = fx
        .store
        .hourly_range(
            PlantId(1),
            &fx.version,
            HourWindow::new(start, start + Duration::hours(3)),
        )
        .await
        .unwrap();

    fx.rolling.run().await.unwrap();
    let second = fx
        .store
        .hourly_range(
            PlantId(1),
            &fx.version,
            HourWindow::new(start, start + Duration::hours(3)),
        )
        .await
        .unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);

    let daily = fx
        .store
        .daily_range(PlantId(1), &fx.version, date(2026, 6, 1), date(2026, 6, 1))
        .await
        .unwrap();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].total_power_mwh, 600.0);
}

#[tokio::test]
async fn rolling_replaces_old_window_rows() {
    let fx = fixture(vec![plant(1)]);
    let start = hour(2026, 6, 1, 0);

    fx.provider.set(1, irradiance_series(start, &[100.0, 100.0, 100.0]));
    fx.rolling.run().await.unwrap();

    // Next run: horizon shifted one hour forward with new values
    fx.provider
        .set(1, irradiance_series(start + Duration::hours(1), &[50.0, 50.0, 50.0]));
    fx.rolling.run().await.unwrap();

    let rows = fx
        .store
        .hourly_range(
            PlantId(1),
            &fx.version,
            HourWindow::new(start, start + Duration::hours(5)),
        )
        .await
        .unwrap();

    // The 00:00 row falls outside the new window and survives; the
    // overlapping hours carry the fresh values
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].timestamp, start);
    assert_eq!(rows[0].predicted_power_mw, 100.0);
    for row in &rows[1..] {
        assert_eq!(row.predicted_power_mw, 50.0);
    }
}

#[tokio::test]
async fn daily_rollup_groups_by_calendar_day() {
    let fx = fixture(vec![plant(1)]);
    // 22:00 June 1 through 03:00 June 2: the horizon straddles midnight
    let start = hour(2026, 6, 1, 22);
    fx.provider
        .set(1, irradiance_series(start, &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0]));

    fx.rolling.run().await.unwrap();

    let daily = fx
        .store
        .daily_range(PlantId(1), &fx.version, date(2026, 6, 1), date(2026, 6, 2))
        .await
        .unwrap();

    assert_eq!(daily.len(), 2);
    assert_eq!(daily[0].date, date(2026, 6, 1));
    assert_eq!(daily[0].total_power_mwh, 30.0); // 22:00 + 23:00
    assert_eq!(daily[1].date, date(2026, 6, 2));
    assert_eq!(daily[1].total_power_mwh, 180.0); // 00:00..=03:00
}

#[tokio::test]
async fn negative_predictions_are_stored_as_zero() {
    let fx = fixture(vec![plant(1)]);
    let start = hour(2026, 6, 1, 0);
    // IdentityPredictor passes these through as-is; the job clamps
    fx.provider.set(1, irradiance_series(start, &[-5.0, 10.0]));

    fx.rolling.run().await.unwrap();

    let rows = fx
        .store
        .hourly_range(
            PlantId(1),
            &fx.version,
            HourWindow::new(start, start + Duration::hours(2)),
        )
        .await
        .unwrap();
    assert_eq!(rows[0].predicted_power_mw, 0.0);
    assert_eq!(rows[1].predicted_power_mw, 10.0);

    let daily = fx
        .store
        .daily_range(PlantId(1), &fx.version, date(2026, 6, 1), date(2026, 6, 1))
        .await
        .unwrap();
    assert_eq!(daily[0].total_power_mwh, 10.0);
}

#[tokio::test]
async fn failing_plant_does_not_block_the_others() {
    let fx = fixture(vec![plant(1), plant(2), plant(3)]);
    let start = hour(2026, 6, 1, 0);

    // Seed all three, then break plant 2's feed
    for id in 1..=3 {
        fx.provider.set(id, irradiance_series(start, &[100.0]));
    }
    fx.rolling.run().await.unwrap();

    fx.provider.set(1, irradiance_series(start, &[250.0]));
    fx.provider.clear(2);
    fx.provider.set(3, irradiance_series(start, &[350.0]));
    let report = fx.rolling.run().await.unwrap();

    assert_eq!(report.updated(), 2);
    assert!(matches!(
        report.outcome_for(PlantId(2)),
        Some(PlantOutcome::Skipped(SkipReason::WeatherFetch(_)))
    ));

    let window = HourWindow::new(start, start + Duration::hours(1));
    let one = fx.store.hourly_range(PlantId(1), &fx.version, window).await.unwrap();
    let two = fx.store.hourly_range(PlantId(2), &fx.version, window).await.unwrap();
    let three = fx.store.hourly_range(PlantId(3), &fx.version, window).await.unwrap();

    assert_eq!(one[0].predicted_power_mw, 250.0);
    // Plant 2 keeps its previous rows untouched
    assert_eq!(two[0].predicted_power_mw, 100.0);
    assert_eq!(three[0].predicted_power_mw, 350.0);
}

#[tokio::test]
async fn realtime_counter_accumulates_within_a_day() {
    let fx = fixture(vec![plant(1)]);

    for (h, value) in [(9, 10.0), (10, 20.0), (11, 30.0)] {
        fx.provider.set(
            1,
            vec![IrradiancePoint {
                timestamp: hour(2026, 6, 1, h),
                irradiance_wm2: value,
            }],
        );
        fx.realtime.run(hour(2026, 6, 1, h)).await.unwrap();
    }

    let rows = fx
        .store
        .realtime_range(
            PlantId(1),
            &fx.version,
            HourWindow::new(hour(2026, 6, 1, 0), hour(2026, 6, 2, 0)),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].cumulative_power_mwh, 10.0);
    assert_eq!(rows[1].cumulative_power_mwh, 30.0);
    assert_eq!(rows[2].cumulative_power_mwh, 60.0);
    // Cumulative never decreases within the day
    assert!(rows.windows(2).all(|w| w[1].cumulative_power_mwh >= w[0].cumulative_power_mwh));
}

#[tokio::test]
async fn realtime_counter_resets_at_local_day_rollover() {
    let fx = fixture(vec![plant(1)]);

    fx.provider.set(
        1,
        vec![IrradiancePoint {
            timestamp: hour(2026, 6, 1, 23),
            irradiance_wm2: 40.0,
        }],
    );
    fx.realtime.run(hour(2026, 6, 1, 23)).await.unwrap();

    fx.provider.set(
        1,
        vec![IrradiancePoint {
            timestamp: hour(2026, 6, 2, 0),
            irradiance_wm2: 5.0,
        }],
    );
    fx.realtime.run(hour(2026, 6, 2, 0)).await.unwrap();

    let midnight_row = fx
        .store
        .realtime_range(
            PlantId(1),
            &fx.version,
            HourWindow::new(hour(2026, 6, 2, 0), hour(2026, 6, 2, 1)),
        )
        .await
        .unwrap();

    // New local day: the counter starts over instead of extending 40.0
    assert_eq!(midnight_row[0].cumulative_power_mwh, 5.0);
}

#[tokio::test]
async fn realtime_retry_within_the_hour_overwrites_not_doubles() {
    let fx = fixture(vec![plant(1)]);

    fx.provider.set(
        1,
        vec![IrradiancePoint {
            timestamp: hour(2026, 6, 1, 9),
            irradiance_wm2: 10.0,
        }],
    );
    fx.realtime.run(hour(2026, 6, 1, 9)).await.unwrap();

    // Same hour again with a revised reading
    fx.provider.set(
        1,
        vec![IrradiancePoint {
            timestamp: hour(2026, 6, 1, 9),
            irradiance_wm2: 12.0,
        }],
    );
    fx.realtime.run(hour(2026, 6, 1, 9)).await.unwrap();

    let rows = fx
        .store
        .realtime_range(
            PlantId(1),
            &fx.version,
            HourWindow::new(hour(2026, 6, 1, 0), hour(2026, 6, 2, 0)),
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].predicted_power_mw, 12.0);
    // The prior-row lookup excludes the current hour, so the retry cannot
    // compound its own earlier write
    assert_eq!(rows[0].cumulative_power_mwh, 12.0);
}

#[tokio::test]
async fn realtime_skip_leaves_prior_row_in_place() {
    let fx = fixture(vec![plant(1)]);

    fx.provider.set(
        1,
        vec![IrradiancePoint {
            timestamp: hour(2026, 6, 1, 9),
            irradiance_wm2: 10.0,
        }],
    );
    fx.realtime.run(hour(2026, 6, 1, 9)).await.unwrap();

    fx.provider.clear(1);
    let report = fx.realtime.run(hour(2026, 6, 1, 10)).await.unwrap();
    assert_eq!(report.skipped(), 1);

    let rows = fx
        .store
        .realtime_range(
            PlantId(1),
            &fx.version,
            HourWindow::new(hour(2026, 6, 1, 0), hour(2026, 6, 2, 0)),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, hour(2026, 6, 1, 9));
}

#[tokio::test]
async fn retention_purges_only_rows_before_local_midnight() {
    let fx = fixture(vec![plant(1)]);

    for (d, h) in [(1, 22), (1, 23), (2, 0), (2, 1)] {
        fx.provider.set(
            1,
            vec![IrradiancePoint {
                timestamp: hour(2026, 6, d, h),
                irradiance_wm2: 10.0,
            }],
        );
        fx.realtime.run(hour(2026, 6, d, h)).await.unwrap();
    }

    let purged = fx.retention.run(hour(2026, 6, 2, 2)).await.unwrap();
    assert_eq!(purged, 2);

    let rows = fx
        .store
        .realtime_range(
            PlantId(1),
            &fx.version,
            HourWindow::new(hour(2026, 6, 1, 0), hour(2026, 6, 3, 0)),
        )
        .await
        .unwrap();

    // 23:00 yesterday is gone, 00:00 today survives
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].timestamp, hour(2026, 6, 2, 0));
    assert_eq!(rows[1].timestamp, hour(2026, 6, 2, 1));

    // Re-running the same day purges nothing further
    assert_eq!(fx.retention.run(hour(2026, 6, 2, 3)).await.unwrap(), 0);
}

#[tokio::test]
async fn misaligned_horizons_skip_the_plant() {
    let fx = fixture(vec![plant(1)]);
    let start = hour(2026, 6, 1, 0);
    fx.provider.set(1, irradiance_series(start, &[100.0, 200.0]));

    // Weather stub on a disjoint set of hours: no pairable timestamps
    let weather = Arc::new(ScriptedProvider::default());
    weather.set(1, irradiance_series(start + Duration::hours(48), &[1.0, 2.0]));

    let rolling = RollingForecastJob::new(
        weather,
        fx.provider.clone(),
        Arc::new(IdentityPredictor),
        fx.store.clone(),
        vec![plant(1)],
        fx.version.clone(),
        TZ,
    );

    let report = rolling.run().await.unwrap();
    assert!(matches!(
        report.outcome_for(PlantId(1)),
        Some(PlantOutcome::Skipped(SkipReason::MisalignedHorizons))
    ));
}

//! The recurring forecast pipeline: three time-triggered jobs plus the
//! daily aggregation engine they share.
//!
//! Every job processes plants sequentially and independently. Upstream
//! failures (fetch, prediction) are captured as per-plant skip outcomes so
//! one plant can never block the others; only store failures abort a run.

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::fmt;

use crate::domain::PlantId;
use crate::store::HourWindow;

pub mod aggregation;
pub mod features;
pub mod realtime;
pub mod retention;
pub mod rolling;
pub mod scheduler;

pub use aggregation::DailyAggregationEngine;
pub use realtime::RealtimeCounterJob;
pub use retention::RetentionJob;
pub use rolling::RollingForecastJob;
pub use scheduler::{JobScheduler, SchedulerConfig, TaskStatus};

/// Why a plant produced no fresh data in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    WeatherFetch(String),
    IrradianceFetch(String),
    /// The two horizons share no timestamps, so no feature can be built
    MisalignedHorizons,
    Prediction(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeatherFetch(msg) => write!(f, "weather fetch failed: {msg}"),
            Self::IrradianceFetch(msg) => write!(f, "irradiance fetch failed: {msg}"),
            Self::MisalignedHorizons => write!(f, "weather and irradiance horizons share no timestamps"),
            Self::Prediction(msg) => write!(f, "prediction failed: {msg}"),
        }
    }
}

/// Per-plant result of one job run
#[derive(Debug, Clone, PartialEq)]
pub enum PlantOutcome {
    /// The rolling job replaced this hourly window
    WindowReplaced { window: HourWindow, rows: u64 },
    /// The realtime job recorded one tick
    TickRecorded {
        timestamp: DateTime<Utc>,
        cumulative_power_mwh: f64,
    },
    Skipped(SkipReason),
}

/// Aggregated outcome of one job run over all plants
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<(PlantId, PlantOutcome)>,
}

impl RunReport {
    pub fn record(&mut self, plant_id: PlantId, outcome: PlantOutcome) {
        self.outcomes.push((plant_id, outcome));
    }

    pub fn updated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| !matches!(o, PlantOutcome::Skipped(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.updated()
    }

    pub fn outcome_for(&self, plant_id: PlantId) -> Option<&PlantOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == plant_id)
            .map(|(_, o)| o)
    }
}

/// Floor a timestamp to the start of its hour
pub fn floor_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Calendar date of a timestamp in the pipeline timezone
pub fn local_date(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// Start of a calendar day in the pipeline timezone, as UTC. `None` only
/// if midnight does not exist in that zone on that date (DST gap).
pub fn local_midnight_utc(date: NaiveDate, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

//! Daily rollup over the authoritative hourly table.
//!
//! The daily table is a derived, disposable cache: every rebuild deletes
//! the requested date range and recomputes it wholesale from hourly rows.
//! It never patches totals incrementally.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use chrono::NaiveDate;
use itertools::Itertools;
use tracing::debug;

use super::{local_date, local_midnight_utc};
use crate::domain::{DailyForecast, ModelVersion, PlantId};
use crate::store::{HourWindow, StoreTransaction};

/// Rebuilds daily totals for a plant/version over an inclusive date range
#[derive(Debug, Clone, Copy)]
pub struct DailyAggregationEngine {
    timezone: Tz,
}

impl DailyAggregationEngine {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Recompute DailyForecast rows for `first..=last` from the hourly
    /// table, inside the caller's transaction. Dates without any hourly
    /// row get no daily row. Calling this twice with unchanged hourly data
    /// is a no-op the second time.
    pub async fn rebuild(
        &self,
        txn: &mut dyn StoreTransaction,
        plant_id: PlantId,
        version: &ModelVersion,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<u64> {
        txn.delete_daily_range(plant_id, version, first, last).await?;

        let start = local_midnight_utc(first, self.timezone)
            .with_context(|| format!("no midnight for {first} in {}", self.timezone))?;
        let end = local_midnight_utc(last.succ_opt().context("date overflow")?, self.timezone)
            .with_context(|| format!("no midnight after {last} in {}", self.timezone))?;

        let rows = txn
            .query_hourly_range(plant_id, version, HourWindow::new(start, end))
            .await?;

        // Group by the calendar date derived from each row's timestamp,
        // not by any stored date field
        let totals = rows
            .iter()
            .map(|r| (local_date(r.timestamp, self.timezone), r.predicted_power_mw))
            .into_grouping_map()
            .sum();

        let mut written = 0;
        for (date, total_power_mwh) in totals.into_iter().sorted_by_key(|(date, _)| *date) {
            txn.upsert_daily(DailyForecast {
                plant_id,
                date,
                total_power_mwh,
                model_version: version.clone(),
            })
            .await?;
            written += 1;
        }

        debug!(%plant_id, %version, %first, %last, written, "daily rollup rebuilt");
        Ok(written)
    }
}

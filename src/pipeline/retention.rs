//! Realtime-table retention, scheduled at day start.
//!
//! Deletes every realtime row whose timestamp is strictly before today's
//! local midnight. Safe to run any number of times per day; repeat runs
//! delete nothing.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::info;

use super::{local_date, local_midnight_utc};
use crate::store::ForecastStore;

pub struct RetentionJob {
    store: Arc<dyn ForecastStore>,
    timezone: Tz,
}

impl RetentionJob {
    pub fn new(store: Arc<dyn ForecastStore>, timezone: Tz) -> Self {
        Self { store, timezone }
    }

    /// Purge realtime rows from days before `now`'s local date. Returns
    /// the number of deleted rows.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<u64> {
        let today = local_date(now, self.timezone);
        let cutoff = local_midnight_utc(today, self.timezone)
            .with_context(|| format!("no midnight for {today} in {}", self.timezone))?;

        let mut txn = self.store.begin().await?;
        let purged = txn.delete_realtime_before(cutoff).await?;
        txn.commit().await?;

        info!(purged, %cutoff, "stale realtime rows purged");
        Ok(purged)
    }
}

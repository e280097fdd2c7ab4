//! In-memory store implementation.
//!
//! Tables are ordered maps keyed by the natural keys, so range deletes and
//! queries are straight `BTreeMap::range` scans. A transaction works on a
//! private copy of the tables and swaps it in whole on commit; dropping the
//! transaction discards the copy. Writers are serialized through a lock
//! held from `begin` to commit or drop, so the swap can never erase work
//! committed by an overlapping transaction. Readers are never blocked.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{ForecastStore, HourWindow, StoreError, StoreTransaction};
use crate::domain::{DailyForecast, HourlyForecast, ModelVersion, PlantId, RealtimeGeneration};

type HourlyKey = (PlantId, ModelVersion, DateTime<Utc>);
type DailyKey = (PlantId, ModelVersion, NaiveDate);
type RealtimeKey = (PlantId, ModelVersion, DateTime<Utc>);

#[derive(Debug, Clone, Default)]
struct Tables {
    hourly: BTreeMap<HourlyKey, HourlyForecast>,
    daily: BTreeMap<DailyKey, DailyForecast>,
    realtime: BTreeMap<RealtimeKey, RealtimeGeneration>,
}

impl Tables {
    fn hourly_range(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        window: HourWindow,
    ) -> Vec<HourlyForecast> {
        self.hourly
            .range(
                (plant_id, version.clone(), window.start)..(plant_id, version.clone(), window.end),
            )
            .map(|(_, row)| row.clone())
            .collect()
    }

    fn daily_range(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Vec<DailyForecast> {
        self.daily
            .range(
                (plant_id, version.clone(), first)
                    ..=(plant_id, version.clone(), last),
            )
            .map(|(_, row)| row.clone())
            .collect()
    }

    fn realtime_range(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        window: HourWindow,
    ) -> Vec<RealtimeGeneration> {
        self.realtime
            .range(
                (plant_id, version.clone(), window.start)..(plant_id, version.clone(), window.end),
            )
            .map(|(_, row)| row.clone())
            .collect()
    }

    fn latest_realtime_before(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        before: DateTime<Utc>,
    ) -> Option<RealtimeGeneration> {
        self.realtime
            .range((plant_id, version.clone(), DateTime::<Utc>::MIN_UTC)..(plant_id, version.clone(), before))
            .next_back()
            .map(|(_, row)| row.clone())
    }
}

/// Shared in-memory forecast store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ForecastStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        // The snapshot must be taken after the writer lock is held, or a
        // commit landing in between would be invisible to this snapshot
        // and erased by ours.
        let guard = Arc::clone(&self.writer).lock_owned().await;
        let work = self.tables.read().clone();
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.tables),
            work,
            _guard: guard,
        }))
    }

    async fn hourly_range(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        window: HourWindow,
    ) -> Result<Vec<HourlyForecast>, StoreError> {
        Ok(self.tables.read().hourly_range(plant_id, version, window))
    }

    async fn daily_range(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<Vec<DailyForecast>, StoreError> {
        Ok(self.tables.read().daily_range(plant_id, version, first, last))
    }

    async fn realtime_range(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        window: HourWindow,
    ) -> Result<Vec<RealtimeGeneration>, StoreError> {
        Ok(self.tables.read().realtime_range(plant_id, version, window))
    }

    async fn latest_realtime_before(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        before: DateTime<Utc>,
    ) -> Result<Option<RealtimeGeneration>, StoreError> {
        Ok(self
            .tables
            .read()
            .latest_realtime_before(plant_id, version, before))
    }
}

struct MemoryTransaction {
    shared: Arc<RwLock<Tables>>,
    work: Tables,
    // Released on commit or drop, letting the next writer begin
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn delete_hourly_range(
        &mut self,
        plant_id: PlantId,
        version: &ModelVersion,
        window: HourWindow,
    ) -> Result<u64, StoreError> {
        let keys: Vec<HourlyKey> = self
            .work
            .hourly
            .range(
                (plant_id, version.clone(), window.start)..(plant_id, version.clone(), window.end),
            )
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            self.work.hourly.remove(key);
        }
        Ok(keys.len() as u64)
    }

    async fn upsert_hourly(&mut self, row: HourlyForecast) -> Result<(), StoreError> {
        self.work.hourly.insert(
            (row.plant_id, row.model_version.clone(), row.timestamp),
            row,
        );
        Ok(())
    }

    async fn query_hourly_range(
        &mut self,
        plant_id: PlantId,
        version: &ModelVersion,
        window: HourWindow,
    ) -> Result<Vec<HourlyForecast>, StoreError> {
        Ok(self.work.hourly_range(plant_id, version, window))
    }

    async fn delete_daily_range(
        &mut self,
        plant_id: PlantId,
        version: &ModelVersion,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<u64, StoreError> {
        let keys: Vec<DailyKey> = self
            .work
            .daily
            .range((plant_id, version.clone(), first)..=(plant_id, version.clone(), last))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            self.work.daily.remove(key);
        }
        Ok(keys.len() as u64)
    }

    async fn upsert_daily(&mut self, row: DailyForecast) -> Result<(), StoreError> {
        self.work
            .daily
            .insert((row.plant_id, row.model_version.clone(), row.date), row);
        Ok(())
    }

    async fn upsert_realtime(&mut self, row: RealtimeGeneration) -> Result<(), StoreError> {
        self.work.realtime.insert(
            (row.plant_id, row.model_version.clone(), row.timestamp),
            row,
        );
        Ok(())
    }

    async fn latest_realtime_before(
        &mut self,
        plant_id: PlantId,
        version: &ModelVersion,
        before: DateTime<Utc>,
    ) -> Result<Option<RealtimeGeneration>, StoreError> {
        Ok(self.work.latest_realtime_before(plant_id, version, before))
    }

    async fn delete_realtime_before(&mut self, before: DateTime<Utc>) -> Result<u64, StoreError> {
        let before_len = self.work.realtime.len();
        self.work.realtime.retain(|(_, _, ts), _| *ts >= before);
        Ok((before_len - self.work.realtime.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        *self.shared.write() = self.work;
        Ok(())
    }
}

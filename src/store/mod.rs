//! Persistence contract for the three forecast tables.
//!
//! The pipeline only ever talks to these traits. Writes for one job
//! invocation over one plant go through a single [`StoreTransaction`]; a
//! transaction that is dropped without [`StoreTransaction::commit`] leaves
//! the store untouched, so readers never observe a half-replaced window.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::domain::{DailyForecast, HourlyForecast, ModelVersion, PlantId, RealtimeGeneration};

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Half-open time window `[start, end)` over hourly rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl HourWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Read side of the store, shared with API consumers
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// Open an atomic unit of work.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    async fn hourly_range(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        window: HourWindow,
    ) -> Result<Vec<HourlyForecast>, StoreError>;

    async fn daily_range(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<Vec<DailyForecast>, StoreError>;

    async fn realtime_range(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        window: HourWindow,
    ) -> Result<Vec<RealtimeGeneration>, StoreError>;

    /// Most recent realtime row strictly before `before`, regardless of
    /// which calendar day it belongs to.
    async fn latest_realtime_before(
        &self,
        plant_id: PlantId,
        version: &ModelVersion,
        before: DateTime<Utc>,
    ) -> Result<Option<RealtimeGeneration>, StoreError>;
}

/// Write side of the store. All mutations are buffered until `commit`.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn delete_hourly_range(
        &mut self,
        plant_id: PlantId,
        version: &ModelVersion,
        window: HourWindow,
    ) -> Result<u64, StoreError>;

    async fn upsert_hourly(&mut self, row: HourlyForecast) -> Result<(), StoreError>;

    /// Range query that sees this transaction's own uncommitted writes,
    /// used by the aggregation rebuild inside the rolling job.
    async fn query_hourly_range(
        &mut self,
        plant_id: PlantId,
        version: &ModelVersion,
        window: HourWindow,
    ) -> Result<Vec<HourlyForecast>, StoreError>;

    async fn delete_daily_range(
        &mut self,
        plant_id: PlantId,
        version: &ModelVersion,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<u64, StoreError>;

    async fn upsert_daily(&mut self, row: DailyForecast) -> Result<(), StoreError>;

    async fn upsert_realtime(&mut self, row: RealtimeGeneration) -> Result<(), StoreError>;

    async fn latest_realtime_before(
        &mut self,
        plant_id: PlantId,
        version: &ModelVersion,
        before: DateTime<Utc>,
    ) -> Result<Option<RealtimeGeneration>, StoreError>;

    /// Purge realtime rows older than `before` across all plants and
    /// versions, returning the number of deleted rows.
    async fn delete_realtime_before(&mut self, before: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Make every buffered mutation visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

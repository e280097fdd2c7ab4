//! Irradiance provider backed by the KIER solar-energy API.
//!
//! The service returns one day of hourly global horizontal irradiance per
//! request, so the multi-day horizon is assembled from one request per day.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{IrradianceProvider, ProviderError};
use crate::domain::{GeoLocation, IrradiancePoint};

/// Irradiance client for the KIER getSolarIrradiance API
pub struct KierIrradianceClient {
    client: Client,
    base_url: String,
    service_key: String,
    timezone: Tz,
    horizon_days: u32,
}

impl KierIrradianceClient {
    pub fn new(
        base_url: String,
        service_key: String,
        timezone: Tz,
        horizon_days: u32,
        timeout: std::time::Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            service_key,
            timezone,
            horizon_days,
        })
    }

    async fn fetch_day(
        &self,
        location: GeoLocation,
        date: NaiveDate,
    ) -> Result<Vec<IrradiancePoint>, ProviderError> {
        let date_param = date.format("%Y%m%d").to_string();
        debug!(date = %date_param, "querying KIER irradiance");

        let response: KierResponse = self
            .client
            .get(&self.base_url)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("lat", &location.latitude.to_string()),
                ("lng", &location.longitude.to_string()),
                ("date", &date_param),
                ("type", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut points = Vec::new();
        for item in response.items {
            let Some(hour) = item.hour() else {
                continue;
            };
            let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            let Some(local) = self.timezone.from_local_datetime(&naive).single() else {
                continue;
            };
            points.push(IrradiancePoint {
                timestamp: local.with_timezone(&Utc),
                irradiance_wm2: item.solar,
            });
        }

        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }
}

#[async_trait]
impl IrradianceProvider for KierIrradianceClient {
    async fn fetch_horizon(
        &self,
        location: GeoLocation,
    ) -> Result<Vec<IrradiancePoint>, ProviderError> {
        let today = Utc::now().with_timezone(&self.timezone).date_naive();
        let mut points = Vec::new();

        for offset in 0..i64::from(self.horizon_days) {
            let date = today + Duration::days(offset);
            match self.fetch_day(location, date).await {
                Ok(day_points) => points.extend(day_points),
                // Partial horizons are usable; the pairing step trims the
                // window to what both providers actually cover.
                Err(err) if !points.is_empty() => {
                    warn!(%date, error = %err, "irradiance horizon truncated");
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        if points.is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(points)
    }

    async fn fetch_current(&self, location: GeoLocation) -> Result<IrradiancePoint, ProviderError> {
        let local_now = Utc::now().with_timezone(&self.timezone);
        let points = self.fetch_day(location, local_now.date_naive()).await?;

        let current_hour = local_now.hour();
        points
            .iter()
            .find(|p| p.timestamp.with_timezone(&self.timezone).hour() == current_hour)
            .or_else(|| points.last())
            .copied()
            .ok_or(ProviderError::Empty)
    }
}

// KIER API response structures
#[derive(Debug, Deserialize)]
struct KierResponse {
    #[serde(default)]
    items: Vec<KierItem>,
}

#[derive(Debug, Deserialize)]
struct KierItem {
    #[serde(default)]
    time: Option<TimeField>,
    #[serde(default)]
    solar: f64,
}

/// The API is inconsistent about the `time` field, returning either a
/// number or a zero-padded string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimeField {
    Num(u32),
    Text(String),
}

impl KierItem {
    fn hour(&self) -> Option<u32> {
        match &self.time {
            Some(TimeField::Num(h)) if *h < 24 => Some(*h),
            Some(TimeField::Text(s)) => s.trim().parse().ok().filter(|h| *h < 24),
            _ => None,
        }
    }
}

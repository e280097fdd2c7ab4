//! Weather provider backed by the KMA short-term forecast API
//! (VilageFcstInfoService).
//!
//! Three endpoints are involved: `getUltraSrtNcst` (current-hour
//! observation), `getUltraSrtFcst` (ultra-short-term forecast, used as a
//! fallback when the observation call fails) and `getVilageFcst` (the
//! multi-day hourly forecast the rolling job consumes). The API addresses
//! locations on a Lambert conformal conic grid, so latitude/longitude must
//! be converted before every call.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::{ProviderError, WeatherProvider};
use crate::domain::{GeoLocation, PrecipType, SkyCondition, WeatherPoint};

const RESULT_OK: &str = "00";

/// Forecast base hours published by the short-term forecast endpoint
const VILAGE_BASE_HOURS: [u32; 8] = [2, 5, 8, 11, 14, 17, 20, 23];

/// KMA grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPoint {
    pub nx: i32,
    pub ny: i32,
}

/// Convert WGS84 latitude/longitude to the KMA Lambert conformal conic grid
pub fn to_kma_grid(latitude: f64, longitude: f64) -> GridPoint {
    const RE: f64 = 6371.00877; // earth radius, km
    const GRID: f64 = 5.0; // grid spacing, km
    const SLAT1: f64 = 30.0; // projection latitude 1
    const SLAT2: f64 = 60.0; // projection latitude 2
    const OLON: f64 = 126.0; // origin longitude
    const OLAT: f64 = 38.0; // origin latitude
    const XO: f64 = 43.0; // origin grid x
    const YO: f64 = 136.0; // origin grid y

    let degrad = std::f64::consts::PI / 180.0;
    let re = RE / GRID;
    let slat1 = SLAT1 * degrad;
    let slat2 = SLAT2 * degrad;
    let olon = OLON * degrad;
    let olat = OLAT * degrad;

    let sn_val = (std::f64::consts::FRAC_PI_4 + slat2 * 0.5).tan()
        / (std::f64::consts::FRAC_PI_4 + slat1 * 0.5).tan();
    let sn = (slat1.cos() / slat2.cos()).ln() / sn_val.ln();

    let sf = (std::f64::consts::FRAC_PI_4 + slat1 * 0.5).tan().powf(sn) * slat1.cos() / sn;
    let ro = re * sf / (std::f64::consts::FRAC_PI_4 + olat * 0.5).tan().powf(sn);

    let ra = re * sf / (std::f64::consts::FRAC_PI_4 + latitude * degrad * 0.5).tan().powf(sn);
    let mut theta = longitude * degrad - olon;
    if theta > std::f64::consts::PI {
        theta -= 2.0 * std::f64::consts::PI;
    }
    if theta < -std::f64::consts::PI {
        theta += 2.0 * std::f64::consts::PI;
    }
    theta *= sn;

    GridPoint {
        nx: (ra * theta.sin() + XO + 0.5).floor() as i32,
        ny: (ro - ra * theta.cos() + YO + 0.5).floor() as i32,
    }
}

/// Base date/time for the current-hour observation endpoint. Observations
/// for hour H are published around H:10, so the first ten minutes of each
/// hour still query the previous hour.
pub fn observation_base_time(local_now: DateTime<Tz>) -> (String, String) {
    let base = if local_now.minute() < 10 {
        local_now - Duration::hours(1)
    } else {
        local_now
    };
    (base.format("%Y%m%d").to_string(), format!("{:02}00", base.hour()))
}

/// Base date/time for the ultra-short-term forecast endpoint, published
/// every hour at H:30 with a 45 minute availability delay.
pub fn ultra_short_base_time(local_now: DateTime<Tz>) -> (String, String) {
    let base = if local_now.minute() < 45 {
        local_now - Duration::hours(1)
    } else {
        local_now
    };
    (base.format("%Y%m%d").to_string(), format!("{:02}30", base.hour()))
}

/// Base date/time for the short-term (multi-day) forecast endpoint, which
/// publishes eight times a day at fixed hours.
pub fn vilage_base_time(local_now: DateTime<Tz>) -> (String, String) {
    let hour = local_now.hour();
    match VILAGE_BASE_HOURS.iter().rev().find(|&&h| h <= hour) {
        Some(&h) => (local_now.format("%Y%m%d").to_string(), format!("{h:02}00")),
        // 00:00-01:59 falls back to yesterday's 23:00 publication
        None => (
            (local_now - Duration::days(1)).format("%Y%m%d").to_string(),
            "2300".to_string(),
        ),
    }
}

/// Weather client for the KMA VilageFcstInfoService API
pub struct KmaWeatherClient {
    client: Client,
    base_url: String,
    service_key: String,
    timezone: Tz,
    horizon_hours: i64,
}

impl KmaWeatherClient {
    pub fn new(
        base_url: String,
        service_key: String,
        timezone: Tz,
        horizon_hours: u32,
        timeout: std::time::Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            service_key,
            timezone,
            horizon_hours: i64::from(horizon_hours),
        })
    }

    async fn get_items(
        &self,
        endpoint: &str,
        base_date: &str,
        base_time: &str,
        grid: GridPoint,
        num_rows: u32,
    ) -> Result<Vec<KmaItem>, ProviderError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint);
        debug!(%url, base_date, base_time, nx = grid.nx, ny = grid.ny, "querying KMA");

        let response: KmaResponse = self
            .client
            .get(&url)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("numOfRows", &num_rows.to_string()),
                ("pageNo", "1"),
                ("dataType", "JSON"),
                ("base_date", base_date),
                ("base_time", base_time),
                ("nx", &grid.nx.to_string()),
                ("ny", &grid.ny.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let header = response.response.header;
        if header.result_code != RESULT_OK {
            return Err(ProviderError::Api {
                code: header.result_code,
                message: header.result_msg,
            });
        }

        response
            .response
            .body
            .map(|b| b.items.item)
            .ok_or_else(|| ProviderError::Malformed("response body missing".to_string()))
    }

    fn parse_local(&self, date: &str, time: &str) -> Result<DateTime<Utc>, ProviderError> {
        let naive = NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y%m%d%H%M")
            .map_err(|e| ProviderError::Malformed(format!("bad forecast timestamp: {e}")))?;
        self.timezone
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| ProviderError::Malformed(format!("ambiguous local time {naive}")))
    }

    /// Ultra-short-term forecast fallback for the current conditions. Only
    /// used when the observation endpoint fails; takes the latest
    /// forecast hour from the response.
    async fn fetch_ultra_short(&self, grid: GridPoint) -> Result<WeatherPoint, ProviderError> {
        let local_now = Utc::now().with_timezone(&self.timezone);
        let (base_date, base_time) = ultra_short_base_time(local_now);
        let items = self
            .get_items("getUltraSrtFcst", &base_date, &base_time, grid, 100)
            .await?;

        // Group by forecast time, keep the most recent slot
        let mut slots: BTreeMap<(String, String), Vec<KmaItem>> = BTreeMap::new();
        for item in items {
            let (Some(date), Some(time)) = (item.fcst_date.clone(), item.fcst_time.clone()) else {
                continue;
            };
            slots.entry((date, time)).or_default().push(item);
        }

        let ((date, time), slot) = slots.into_iter().next_back().ok_or(ProviderError::Empty)?;
        let timestamp = self.parse_local(&date, &time)?;
        Ok(weather_point_from_categories(
            timestamp,
            slot.iter()
                .filter_map(|i| i.fcst_value.as_deref().map(|v| (i.category.as_str(), v))),
        ))
    }
}

#[async_trait]
impl WeatherProvider for KmaWeatherClient {
    async fn fetch_horizon(
        &self,
        location: GeoLocation,
    ) -> Result<Vec<WeatherPoint>, ProviderError> {
        let grid = to_kma_grid(location.latitude, location.longitude);
        let local_now = Utc::now().with_timezone(&self.timezone);
        let (base_date, base_time) = vilage_base_time(local_now);

        let items = self
            .get_items("getVilageFcst", &base_date, &base_time, grid, 1000)
            .await?;

        let mut slots: BTreeMap<(String, String), Vec<KmaItem>> = BTreeMap::new();
        for item in items {
            let (Some(date), Some(time)) = (item.fcst_date.clone(), item.fcst_time.clone()) else {
                continue;
            };
            slots.entry((date, time)).or_default().push(item);
        }

        let window_end = local_now + Duration::hours(self.horizon_hours);
        let mut points = Vec::new();
        for ((date, time), slot) in slots {
            let timestamp = self.parse_local(&date, &time)?;
            let local_ts = timestamp.with_timezone(&self.timezone);
            if local_ts < local_now || local_ts > window_end {
                continue;
            }
            points.push(weather_point_from_categories(
                timestamp,
                slot.iter()
                    .filter_map(|i| i.fcst_value.as_deref().map(|v| (i.category.as_str(), v))),
            ));
        }

        if points.is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(points)
    }

    async fn fetch_current(&self, location: GeoLocation) -> Result<WeatherPoint, ProviderError> {
        let grid = to_kma_grid(location.latitude, location.longitude);
        let local_now = Utc::now().with_timezone(&self.timezone);
        let (base_date, base_time) = observation_base_time(local_now);

        match self
            .get_items("getUltraSrtNcst", &base_date, &base_time, grid, 100)
            .await
        {
            Ok(items) => {
                let hour = local_now
                    .with_minute(0)
                    .and_then(|t| t.with_second(0))
                    .and_then(|t| t.with_nanosecond(0))
                    .unwrap_or(local_now)
                    .with_timezone(&Utc);
                Ok(weather_point_from_categories(
                    hour,
                    items
                        .iter()
                        .filter_map(|i| i.obsr_value.as_deref().map(|v| (i.category.as_str(), v))),
                ))
            }
            Err(err) => {
                warn!(error = %err, "KMA observation failed, falling back to ultra-short forecast");
                self.fetch_ultra_short(grid).await
            }
        }
    }
}

/// Assemble a weather point from KMA (category, value) pairs, tolerating
/// missing categories. `T1H` and `TMP` are the observation and forecast
/// temperature codes respectively.
fn weather_point_from_categories<'a>(
    timestamp: DateTime<Utc>,
    pairs: impl Iterator<Item = (&'a str, &'a str)>,
) -> WeatherPoint {
    let mut point = WeatherPoint {
        timestamp,
        temperature_c: 0.0,
        humidity_percent: 0.0,
        wind_speed_ms: 0.0,
        sky: SkyCondition::Unknown,
        precip_type: PrecipType::None,
        precip_probability: 0.0,
    };

    for (category, value) in pairs {
        match category {
            "T1H" | "TMP" => point.temperature_c = value.parse().unwrap_or(point.temperature_c),
            "REH" => point.humidity_percent = value.parse().unwrap_or(point.humidity_percent),
            "WSD" => point.wind_speed_ms = value.parse().unwrap_or(point.wind_speed_ms),
            "SKY" => point.sky = SkyCondition::from_code(value.parse().unwrap_or(-1)),
            "PTY" => point.precip_type = PrecipType::from_code(value.parse().unwrap_or(-1)),
            "POP" => point.precip_probability = value.parse().unwrap_or(0.0),
            _ => {}
        }
    }

    point
}

// KMA API response structures
#[derive(Debug, Deserialize)]
struct KmaResponse {
    response: KmaInner,
}

#[derive(Debug, Deserialize)]
struct KmaInner {
    header: KmaHeader,
    body: Option<KmaBody>,
}

#[derive(Debug, Deserialize)]
struct KmaHeader {
    #[serde(rename = "resultCode")]
    result_code: String,
    #[serde(rename = "resultMsg")]
    result_msg: String,
}

#[derive(Debug, Deserialize)]
struct KmaBody {
    items: KmaItems,
}

#[derive(Debug, Deserialize)]
struct KmaItems {
    item: Vec<KmaItem>,
}

#[derive(Debug, Deserialize)]
struct KmaItem {
    category: String,
    #[serde(rename = "obsrValue")]
    obsr_value: Option<String>,
    #[serde(rename = "fcstValue")]
    fcst_value: Option<String>,
    #[serde(rename = "fcstDate")]
    fcst_date: Option<String>,
    #[serde(rename = "fcstTime")]
    fcst_time: Option<String>,
}

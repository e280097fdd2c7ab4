//! Time-based job triggers.
//!
//! Cooperative tokio tasks: the realtime counter ticks on a fixed interval,
//! the daily pass (retention, then rolling forecast) fires once a day at a
//! configured local hour. A tick runs to completion before the next one
//! fires for that job, and every error is absorbed and logged at the job
//! boundary so the trigger loop never dies.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{error, info};

use super::{RealtimeCounterJob, RetentionJob, RollingForecastJob};

/// Cadence configuration for the three jobs
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Realtime counter interval (seconds)
    pub realtime_interval_secs: u64,
    /// Local hour (0-23) of the daily retention + rolling forecast pass
    pub daily_run_hour: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            realtime_interval_secs: 3600, // hourly on the hour
            daily_run_hour: 0,            // midnight
        }
    }
}

/// Per-task run bookkeeping
#[derive(Debug, Clone, Default)]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
}

impl TaskStatus {
    fn started(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
        self.run_count += 1;
    }

    fn succeeded(&mut self, now: DateTime<Utc>) {
        self.last_success = Some(now);
        self.success_count += 1;
        self.last_error = None;
    }

    fn failed(&mut self, err: &anyhow::Error) {
        self.error_count += 1;
        self.last_error = Some(err.to_string());
    }
}

/// Next wall-clock instant at which the daily pass should fire
pub fn next_daily_run(now: DateTime<Utc>, hour: u32, tz: Tz) -> DateTime<Utc> {
    let local_now = now.with_timezone(&tz);
    let today_run = local_now
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .and_then(|naive| tz.from_local_datetime(&naive).earliest());

    match today_run {
        Some(run) if run > local_now => run.with_timezone(&Utc),
        _ => {
            let tomorrow = local_now.date_naive() + ChronoDuration::days(1);
            tomorrow
                .and_hms_opt(hour, 0, 0)
                .and_then(|naive| tz.from_local_datetime(&naive).earliest())
                .map(|run| run.with_timezone(&Utc))
                // DST gap at the target hour: fall back to 24h from now
                .unwrap_or(now + ChronoDuration::days(1))
        }
    }
}

/// Spawns and tracks the pipeline's periodic jobs
pub struct JobScheduler {
    config: SchedulerConfig,
    timezone: Tz,
    rolling: Arc<RollingForecastJob>,
    realtime: Arc<RealtimeCounterJob>,
    retention: Arc<RetentionJob>,
    rolling_status: Arc<RwLock<TaskStatus>>,
    realtime_status: Arc<RwLock<TaskStatus>>,
    retention_status: Arc<RwLock<TaskStatus>>,
}

impl JobScheduler {
    pub fn new(
        config: SchedulerConfig,
        timezone: Tz,
        rolling: Arc<RollingForecastJob>,
        realtime: Arc<RealtimeCounterJob>,
        retention: Arc<RetentionJob>,
    ) -> Self {
        Self {
            config,
            timezone,
            rolling,
            realtime,
            retention,
            rolling_status: Arc::new(RwLock::new(TaskStatus::default())),
            realtime_status: Arc::new(RwLock::new(TaskStatus::default())),
            retention_status: Arc::new(RwLock::new(TaskStatus::default())),
        }
    }

    /// Start both trigger loops
    pub fn start(self: Arc<Self>) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_realtime_loop().await;
        });

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_daily_loop().await;
        });

        info!(
            realtime_interval_secs = self.config.realtime_interval_secs,
            daily_run_hour = self.config.daily_run_hour,
            "pipeline jobs scheduled"
        );
    }

    async fn run_realtime_loop(&self) {
        let mut ticker = interval(Duration::from_secs(self.config.realtime_interval_secs));
        // A slow run must not cause a burst of catch-up ticks
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let now = Utc::now();
            self.realtime_status.write().await.started(now);

            match self.realtime.run(now).await {
                Ok(report) => {
                    self.realtime_status.write().await.succeeded(now);
                    info!(updated = report.updated(), skipped = report.skipped(), "realtime tick finished");
                }
                Err(err) => {
                    self.realtime_status.write().await.failed(&err);
                    error!(error = %err, "realtime tick failed");
                }
            }
        }
    }

    async fn run_daily_loop(&self) {
        loop {
            let now = Utc::now();
            let next = next_daily_run(now, self.config.daily_run_hour, self.timezone);
            let wait = (next - now).to_std().unwrap_or(Duration::from_secs(60));
            info!(next_run = %next, "daily forecast pass scheduled");
            sleep(wait).await;

            let now = Utc::now();

            // Retention first: yesterday's realtime rows go before the new
            // forecast window is written
            self.retention_status.write().await.started(now);
            match self.retention.run(now).await {
                Ok(_) => self.retention_status.write().await.succeeded(now),
                Err(err) => {
                    self.retention_status.write().await.failed(&err);
                    error!(error = %err, "retention run failed");
                }
            }

            self.rolling_status.write().await.started(now);
            match self.rolling.run().await {
                Ok(_) => self.rolling_status.write().await.succeeded(now),
                Err(err) => {
                    self.rolling_status.write().await.failed(&err);
                    error!(error = %err, "rolling forecast run failed");
                }
            }
        }
    }

    pub async fn rolling_status(&self) -> TaskStatus {
        self.rolling_status.read().await.clone()
    }

    pub async fn realtime_status(&self) -> TaskStatus {
        self.realtime_status.read().await.clone()
    }

    pub async fn retention_status(&self) -> TaskStatus {
        self.retention_status.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Seoul;

    #[test]
    fn next_daily_run_later_today() {
        // 03:00 UTC = 12:00 KST; a 14:00 KST run is still ahead
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 3, 0, 0).unwrap();
        let next = next_daily_run(now, 14, Seoul);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 5, 1, 5, 0, 0).unwrap());
    }

    #[test]
    fn next_daily_run_rolls_to_tomorrow() {
        // 12:00 KST with a 09:00 KST target -> tomorrow 09:00 KST
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 3, 0, 0).unwrap();
        let next = next_daily_run(now, 9, Seoul);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn next_daily_run_midnight_target() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 3, 0, 0).unwrap();
        let next = next_daily_run(now, 0, Seoul);
        // Next KST midnight is 15:00 UTC the same day
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 5, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn next_run_is_always_in_the_future() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        for hour in 0..24 {
            assert!(next_daily_run(now, hour, Seoul) > now);
        }
    }
}

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_cron_scheduler::Job;
use tracing::{debug, error, info};

use crate::{config::ScheduleConfig, error::BotError, monitor::Monitor};

/// Source of "now" for the monitor.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = at;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Calls a job every `period`, handing it the clock's current time.
///
/// The first call happens immediately. A job that overruns delays the next
/// tick instead of bunching calls up.
pub struct PeriodicTask {
    period: Duration,
    clock: Arc<dyn Clock>,
}

impl PeriodicTask {
    pub fn new(period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { period, clock }
    }

    pub async fn run<F, Fut>(&self, mut job: F)
    where
        F: FnMut(DateTime<Utc>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut tick = tokio::time::interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            let now = self.clock.now();
            debug!(%now, "periodic tick");
            job(now).await;
        }
    }
}

/// Cron job that pushes a forced digest to `chat`.
pub fn digest_job(
    schedule: &ScheduleConfig,
    monitor: Arc<Monitor>,
    chat: u64,
) -> Result<Job, BotError> {
    let cron = schedule.cron_expression();
    let tz = schedule.tz()?;

    let job = Job::new_async_tz(cron.as_str(), tz, move |_uuid, _l| {
        let monitor = Arc::clone(&monitor);

        Box::pin(async move {
            let report = monitor.run_digest(chat, None, Utc::now(), None).await;
            if report.failures > 0 {
                error!(chat_id = chat, failures = report.failures, "digest had failures");
            }
        })
    })
    .map_err(|e| BotError::config(format!("schedule.cron `{cron}` rejected: {e}")))?;

    info!(cron = %cron, timezone = %tz, chat_id = chat, "digest scheduled");
    Ok(job)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn manual_clock_moves_on_demand() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::minutes(15));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(15));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_ticks_every_period() {
        let calls = Arc::new(AtomicUsize::new(0));
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap();
        let task = PeriodicTask::new(Duration::from_secs(60), Arc::new(ManualClock::new(start)));

        let counter = Arc::clone(&calls);
        let handle = tokio::spawn(async move {
            task.run(move |now| {
                assert_eq!(now, start);
                counter.fetch_add(1, Ordering::SeqCst);
                async {}
            })
            .await
        });

        // ticks at 0s, 60s and 120s
        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        handle.abort();
    }
}

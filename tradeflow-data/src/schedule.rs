//! Wall-clock scheduling for reports and the liveness heartbeat.
//!
//! Scheduling is independent of feed health: reports fire on time even while
//! the connection is down, and a missed instant is never replayed — sleeping
//! to the next occurrence yields at most one firing per scheduled instant.

use crate::{
    notify::Notifier,
    report::{self, TradeSource, window_for_hour},
};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Times of day (in a fixed named zone) at which flow reports are emitted.
#[derive(Debug, Clone)]
pub struct ReportSchedule {
    times: Vec<NaiveTime>,
    tz: Tz,
}

impl ReportSchedule {
    pub fn new(mut times: Vec<NaiveTime>, tz: Tz) -> Self {
        times.sort();
        times.dedup();
        Self { times, tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// The earliest configured time-of-day strictly after `now`, rolling
    /// over to the next day when today's firings are all past.
    pub fn next_fire_after(&self, now: DateTime<Tz>) -> DateTime<Tz> {
        for day_offset in 0..=1 {
            let date = now.date_naive() + Duration::days(day_offset);
            for time in &self.times {
                let candidate = self.tz.from_local_datetime(&date.and_time(*time));
                if let Some(candidate) = candidate.earliest() {
                    if candidate > now {
                        return candidate;
                    }
                }
            }
        }
        // Only reachable with an empty schedule; idle a day at a time.
        now + Duration::days(1)
    }
}

/// One aggregation pass: read from the configured source, aggregate for the
/// window implied by `reference`, and deliver. The notifier is invoked even
/// for an empty window; delivery failure is logged and the cycle ends.
pub async fn aggregate_and_report(
    source: &dyn TradeSource,
    notifier: &dyn Notifier,
    symbol: &str,
    reference: DateTime<Tz>,
) {
    let window = window_for_hour(reference.hour());
    let cutoff = reference.with_timezone(&Utc) - window.span;
    let trades = source.trades_since(cutoff);
    let report = report::aggregate(&trades, reference);

    info!(
        trades = report.trade_count,
        window = report.window_label,
        "aggregated flow report"
    );

    match notifier.notify(&report.subject(symbol), &report.body()).await {
        Ok(()) => info!("flow report delivered"),
        Err(e) => error!(error = %e, "flow report delivery failed"),
    }
}

/// Fire [`aggregate_and_report`] at each scheduled instant, forever.
pub async fn run_report_loop(
    schedule: ReportSchedule,
    source: Arc<dyn TradeSource>,
    notifier: Arc<dyn Notifier>,
    symbol: String,
) {
    loop {
        let now = schedule.now();
        let fire_at = schedule.next_fire_after(now);
        let wait = (fire_at - now).to_std().unwrap_or_default();
        info!(fire_at = %fire_at, "next flow report scheduled");
        tokio::time::sleep(wait).await;

        aggregate_and_report(source.as_ref(), notifier.as_ref(), &symbol, schedule.now()).await;
    }
}

/// Fixed-interval liveness log line, independent of feed state. Missed ticks
/// are skipped, not replayed.
pub async fn run_heartbeat(every: std::time::Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        info!("heartbeat: service is running");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer::TradeBuffer, error::NotifyError};
    use async_trait::async_trait;
    use chrono_tz::Asia::Kuala_Lumpur;
    use parking_lot::Mutex;

    fn schedule() -> ReportSchedule {
        ReportSchedule::new(
            vec![
                NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            ],
            Kuala_Lumpur,
        )
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
            self.sent.lock().push((subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_next_fire_before_first_time() {
        let schedule = schedule();
        let now = Kuala_Lumpur.with_ymd_and_hms(2025, 3, 10, 5, 0, 0).unwrap();
        let next = schedule.next_fire_after(now);
        assert_eq!(next, Kuala_Lumpur.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap());
    }

    #[test]
    fn test_next_fire_is_strictly_after_now() {
        let schedule = schedule();
        // Exactly at a firing instant: that instant is spent, take the next.
        let now = Kuala_Lumpur.with_ymd_and_hms(2025, 3, 10, 6, 0, 0).unwrap();
        let next = schedule.next_fire_after(now);
        assert_eq!(next, Kuala_Lumpur.with_ymd_and_hms(2025, 3, 10, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_next_fire_rolls_over_to_tomorrow() {
        let schedule = schedule();
        let now = Kuala_Lumpur.with_ymd_and_hms(2025, 3, 10, 19, 0, 0).unwrap();
        let next = schedule.next_fire_after(now);
        assert_eq!(next, Kuala_Lumpur.with_ymd_and_hms(2025, 3, 11, 6, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_empty_window_still_notifies() {
        let buffer = TradeBuffer::with_default_retention();
        let notifier = RecordingNotifier::default();
        let reference = Kuala_Lumpur.with_ymd_and_hms(2025, 3, 10, 18, 0, 0).unwrap();

        aggregate_and_report(&buffer, &notifier, "MONUSDT", reference).await;

        let sent = notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        let (subject, body) = &sent[0];
        assert_eq!(subject, "Bybit MONUSDT Flow Report");
        assert!(body.contains("Buy Volume: 0.00"), "body was: {body}");
        assert!(body.contains("Trading Frequency: 0.00%"), "body was: {body}");
    }
}

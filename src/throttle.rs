//! Fixed-interval request spacing for one chat session.
//!
//! The throttle only remembers when the last request went out; the interval
//! is owned by the caller and passed in.

use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct Throttle {
    last_request: Option<Instant>,
    last_request_at: Option<DateTime<Local>>,
}

impl Throttle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall-clock time of the last request, for display.
    pub fn last_request_at(&self) -> Option<DateTime<Local>> {
        self.last_request_at
    }

    /// How long a request made at `now` has to wait. Zero before the first
    /// request and once `min_interval` has fully elapsed.
    pub fn wait_time(&self, min_interval: Duration, now: Instant) -> Duration {
        match self.last_request {
            Some(last) => min_interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Sleep until a request may be sent.
    pub async fn wait(&self, min_interval: Duration) {
        let wait = self.wait_time(min_interval, Instant::now());
        if !wait.is_zero() {
            tracing::debug!("Throttling request for {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    pub fn mark_sent(&mut self, at: Instant) {
        self.last_request = Some(at);
        self.last_request_at = Some(Local::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN: Duration = Duration::from_secs(10);

    #[test]
    fn first_request_does_not_wait() {
        let throttle = Throttle::new();
        assert_eq!(throttle.wait_time(TEN, Instant::now()), Duration::ZERO);
    }

    #[test]
    fn waits_for_remaining_interval() {
        let mut throttle = Throttle::new();
        let start = Instant::now();
        throttle.mark_sent(start);
        assert_eq!(
            throttle.wait_time(TEN, start + Duration::from_secs(3)),
            Duration::from_secs(7)
        );
        assert_eq!(throttle.wait_time(TEN, start), Duration::from_secs(10));
    }

    #[test]
    fn no_wait_after_interval_elapsed() {
        let mut throttle = Throttle::new();
        let start = Instant::now();
        throttle.mark_sent(start);
        assert_eq!(
            throttle.wait_time(TEN, start + Duration::from_secs(10)),
            Duration::ZERO
        );
        assert_eq!(
            throttle.wait_time(TEN, start + Duration::from_secs(60)),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_out_the_interval() {
        let mut throttle = Throttle::new();
        let start = Instant::now();
        throttle.mark_sent(start);
        throttle.wait(TEN).await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }
}

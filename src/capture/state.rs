use crate::config::CaptureConfig;
use serde::Serialize;

/// Long-lived device state. The scheduler owns the timing fields, the
/// reliability monitor owns the failure counters. Never holds a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureCycleState {
    paused: bool,
    interval_ms: u64,
    minimum_interval_ms: u64,
    last_capture_ms: Option<u64>,
    consecutive_capture_failures: u32,
    consecutive_delivery_failures: u32,
}

impl CaptureCycleState {
    pub fn new(interval_ms: u64, minimum_interval_ms: u64) -> Self {
        Self {
            paused: false,
            interval_ms: interval_ms.max(minimum_interval_ms),
            minimum_interval_ms,
            last_capture_ms: None,
            consecutive_capture_failures: 0,
            consecutive_delivery_failures: 0,
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.interval_ms, config.minimum_interval_ms)
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn minimum_interval_ms(&self) -> u64 {
        self.minimum_interval_ms
    }

    /// Time of the last successful capture.
    pub fn last_capture_ms(&self) -> Option<u64> {
        self.last_capture_ms
    }

    pub fn consecutive_capture_failures(&self) -> u32 {
        self.consecutive_capture_failures
    }

    pub fn consecutive_delivery_failures(&self) -> u32 {
        self.consecutive_delivery_failures
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Requests below the floor are raised to it. Returns the stored value.
    pub(crate) fn set_interval(&mut self, interval_ms: u64) -> u64 {
        self.interval_ms = interval_ms.max(self.minimum_interval_ms);
        self.interval_ms
    }

    pub(crate) fn set_last_capture(&mut self, now_ms: u64) {
        self.last_capture_ms = Some(now_ms);
    }

    pub(crate) fn record_capture_failure(&mut self) {
        self.consecutive_capture_failures = self.consecutive_capture_failures.saturating_add(1);
    }

    pub(crate) fn reset_capture_failures(&mut self) {
        self.consecutive_capture_failures = 0;
    }

    pub(crate) fn record_delivery_failure(&mut self) {
        self.consecutive_delivery_failures = self.consecutive_delivery_failures.saturating_add(1);
    }

    pub(crate) fn reset_delivery_failures(&mut self) {
        self.consecutive_delivery_failures = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    /// Total capture attempts per cycle.
    pub max_capture_retries: u32,
    /// Total delivery attempts per cycle.
    pub max_delivery_retries: u32,
    pub retry_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &CaptureConfig) -> Self {
        Self {
            max_capture_retries: config.max_capture_retries.max(1),
            max_delivery_retries: config.max_delivery_retries.max(1),
            retry_delay_ms: config.retry_delay_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_clamped_to_the_floor() {
        let mut state = CaptureCycleState::new(200, 1_000);
        assert_eq!(state.interval_ms(), 1_000);

        assert_eq!(state.set_interval(5_000), 5_000);
        assert_eq!(state.set_interval(999), 1_000);
        assert_eq!(state.set_interval(0), 1_000);
        assert_eq!(state.interval_ms(), 1_000);
    }

    #[test]
    fn counters_reset_independently() {
        let mut state = CaptureCycleState::new(10_000, 1_000);
        state.record_capture_failure();
        state.record_capture_failure();
        state.record_delivery_failure();
        state.reset_capture_failures();
        assert_eq!(state.consecutive_capture_failures(), 0);
        assert_eq!(state.consecutive_delivery_failures(), 1);
    }
}

use super::state::CaptureCycleState;
use crate::config::ReliabilityConfig;
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Health {
    Healthy,
    Degraded,
    Critical,
}

/// Snapshot for the status surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounters {
    pub consecutive_capture_failures: u32,
    pub consecutive_delivery_failures: u32,
    pub total_cycles: u64,
    pub successful_captures: u64,
    pub skipped_cycles: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    cycles: u64,
    captures: u64,
    skipped: u64,
    deliveries: u64,
    delivery_failures: u64,
}

/// Tracks consecutive capture and delivery failures and classifies device
/// health. It never resets the device: when health is Critical the control
/// loop stops feeding the watchdog and the external reset does the recovery.
pub struct ReliabilityMonitor {
    degraded_after: u32,
    critical_after: u32,
    totals: Totals,
    last_health: Health,
}

impl ReliabilityMonitor {
    pub fn new(config: &ReliabilityConfig) -> Self {
        Self {
            degraded_after: config.degraded_after,
            critical_after: config.critical_after,
            totals: Totals::default(),
            last_health: Health::Healthy,
        }
    }

    /// A cycle produced a frame (possibly after retries).
    pub fn record_capture_success(&mut self, state: &mut CaptureCycleState) {
        self.totals.cycles += 1;
        self.totals.captures += 1;
        state.reset_capture_failures();
        self.observe(state);
    }

    /// A cycle exhausted its capture attempts. Counts once per cycle, not
    /// once per attempt.
    pub fn record_capture_failure(&mut self, state: &mut CaptureCycleState) {
        self.totals.cycles += 1;
        self.totals.skipped += 1;
        state.record_capture_failure();
        self.observe(state);
    }

    pub fn record_delivery_success(&mut self, state: &mut CaptureCycleState) {
        self.totals.deliveries += 1;
        state.reset_delivery_failures();
        self.observe(state);
    }

    pub fn record_delivery_failure(&mut self, state: &mut CaptureCycleState) {
        self.totals.delivery_failures += 1;
        state.record_delivery_failure();
        self.observe(state);
    }

    pub fn health(&self, state: &CaptureCycleState) -> Health {
        let worst = state
            .consecutive_capture_failures()
            .max(state.consecutive_delivery_failures());
        if worst >= self.critical_after {
            Health::Critical
        } else if worst >= self.degraded_after {
            Health::Degraded
        } else {
            Health::Healthy
        }
    }

    /// Gate for the external watchdog feed.
    pub fn should_feed_watchdog(&self, state: &CaptureCycleState) -> bool {
        self.health(state) != Health::Critical
    }

    pub fn counters(&self, state: &CaptureCycleState) -> FailureCounters {
        FailureCounters {
            consecutive_capture_failures: state.consecutive_capture_failures(),
            consecutive_delivery_failures: state.consecutive_delivery_failures(),
            total_cycles: self.totals.cycles,
            successful_captures: self.totals.captures,
            skipped_cycles: self.totals.skipped,
            deliveries: self.totals.deliveries,
            delivery_failures: self.totals.delivery_failures,
        }
    }

    fn observe(&mut self, state: &CaptureCycleState) {
        let health = self.health(state);
        if health == self.last_health {
            return;
        }
        match health {
            Health::Healthy => info!("Device health recovered"),
            Health::Degraded => warn!(
                "Device health degraded: {} capture / {} delivery failures in a row",
                state.consecutive_capture_failures(),
                state.consecutive_delivery_failures()
            ),
            Health::Critical => error!(
                "Device health critical: {} capture / {} delivery failures in a row, withholding watchdog feed",
                state.consecutive_capture_failures(),
                state.consecutive_delivery_failures()
            ),
        }
        self.last_health = health;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ReliabilityMonitor, CaptureCycleState) {
        (
            ReliabilityMonitor::new(&ReliabilityConfig {
                degraded_after: 2,
                critical_after: 4,
            }),
            CaptureCycleState::new(10_000, 1_000),
        )
    }

    #[test]
    fn health_escalates_with_consecutive_failures() {
        let (mut monitor, mut state) = setup();
        assert_eq!(monitor.health(&state), Health::Healthy);

        monitor.record_capture_failure(&mut state);
        assert_eq!(monitor.health(&state), Health::Healthy);
        monitor.record_capture_failure(&mut state);
        assert_eq!(monitor.health(&state), Health::Degraded);
        monitor.record_capture_failure(&mut state);
        monitor.record_capture_failure(&mut state);
        assert_eq!(monitor.health(&state), Health::Critical);
        assert!(!monitor.should_feed_watchdog(&state));
    }

    #[test]
    fn any_success_resets_its_counter() {
        let (mut monitor, mut state) = setup();
        for _ in 0..3 {
            monitor.record_capture_failure(&mut state);
        }
        monitor.record_capture_success(&mut state);
        assert_eq!(state.consecutive_capture_failures(), 0);
        assert_eq!(monitor.health(&state), Health::Healthy);
        assert!(monitor.should_feed_watchdog(&state));
    }

    #[test]
    fn delivery_failures_count_towards_health() {
        let (mut monitor, mut state) = setup();
        monitor.record_capture_success(&mut state);
        for _ in 0..4 {
            monitor.record_delivery_failure(&mut state);
        }
        assert_eq!(monitor.health(&state), Health::Critical);

        monitor.record_delivery_success(&mut state);
        assert_eq!(monitor.health(&state), Health::Healthy);
    }

    #[test]
    fn counters_track_totals() {
        let (mut monitor, mut state) = setup();
        monitor.record_capture_success(&mut state);
        monitor.record_delivery_success(&mut state);
        monitor.record_capture_failure(&mut state);
        monitor.record_capture_success(&mut state);
        monitor.record_delivery_failure(&mut state);

        assert_eq!(
            monitor.counters(&state),
            FailureCounters {
                consecutive_capture_failures: 0,
                consecutive_delivery_failures: 1,
                total_cycles: 3,
                successful_captures: 2,
                skipped_cycles: 1,
                deliveries: 1,
                delivery_failures: 1,
            }
        );
    }
}

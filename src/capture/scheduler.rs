use super::state::{CaptureCycleState, RetryPolicy};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Externally visible scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerPhase {
    Idle,
    Paused,
    Retrying { attempt: u32, retry_at_ms: u64 },
}

/// What the control loop should do this iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Wait,
    Capture { attempt: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaptureNowDecision {
    Accepted,
    /// Inside the minimum-interval floor; fires once the floor elapses.
    Deferred { ready_at_ms: u64 },
    RejectedPaused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    RetryScheduled { next_attempt: u32, retry_at_ms: u64 },
    /// Every attempt failed; the cycle is skipped.
    Skipped { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRetry {
    next_attempt: u32,
    retry_at_ms: u64,
}

/// Interval-driven capture state machine:
/// `Idle -> Capturing -> {Idle | Retrying -> Capturing ... -> Idle}`.
///
/// Never blocks. A retry delay is a deadline checked on each poll, so the
/// loop keeps feeding the watchdog and handling commands while it waits.
pub struct CaptureScheduler {
    policy: RetryPolicy,
    retry: Option<PendingRetry>,
    last_cycle_start_ms: Option<u64>,
    capture_now_pending: bool,
}

impl CaptureScheduler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retry: None,
            last_cycle_start_ms: None,
            capture_now_pending: false,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn phase(&self, state: &CaptureCycleState) -> SchedulerPhase {
        match self.retry {
            Some(retry) => SchedulerPhase::Retrying {
                attempt: retry.next_attempt,
                retry_at_ms: retry.retry_at_ms,
            },
            None if state.paused() => SchedulerPhase::Paused,
            None => SchedulerPhase::Idle,
        }
    }

    /// Decide whether to capture now. A cycle that is already retrying runs
    /// to completion even if a pause arrived meanwhile.
    pub fn poll(&mut self, state: &CaptureCycleState, now_ms: u64) -> Tick {
        if let Some(retry) = self.retry {
            return if now_ms >= retry.retry_at_ms {
                Tick::Capture {
                    attempt: retry.next_attempt,
                }
            } else {
                Tick::Wait
            };
        }

        if state.paused() {
            return Tick::Wait;
        }

        let timer_due = self
            .last_cycle_start_ms
            .map_or(true, |start| now_ms.saturating_sub(start) >= state.interval_ms());
        let trigger_due = self.capture_now_pending && floor_elapsed(state, now_ms);

        if timer_due || trigger_due {
            if trigger_due && !timer_due {
                debug!("Capture-now request firing at {}ms", now_ms);
            }
            self.last_cycle_start_ms = Some(now_ms);
            self.capture_now_pending = false;
            Tick::Capture { attempt: 1 }
        } else {
            Tick::Wait
        }
    }

    pub fn record_success(&mut self, state: &mut CaptureCycleState, now_ms: u64) {
        self.retry = None;
        state.set_last_capture(now_ms);
    }

    pub fn record_failure(&mut self, attempt: u32, now_ms: u64) -> AttemptOutcome {
        if attempt >= self.policy.max_capture_retries {
            self.retry = None;
            warn!("Capture failed {} times, skipping cycle", attempt);
            return AttemptOutcome::Skipped { attempts: attempt };
        }

        let retry = PendingRetry {
            next_attempt: attempt + 1,
            retry_at_ms: now_ms.saturating_add(self.policy.retry_delay_ms),
        };
        self.retry = Some(retry);
        debug!(
            "Capture attempt {} failed, retrying at {}ms",
            attempt, retry.retry_at_ms
        );
        AttemptOutcome::RetryScheduled {
            next_attempt: retry.next_attempt,
            retry_at_ms: retry.retry_at_ms,
        }
    }

    /// Bypasses the interval timer, but neither the pause gate nor the
    /// minimum-interval floor measured from the last successful capture.
    /// Repeated requests coalesce into one.
    pub fn request_capture_now(&mut self, state: &CaptureCycleState, now_ms: u64) -> CaptureNowDecision {
        if state.paused() {
            debug!("Capture-now rejected while paused");
            return CaptureNowDecision::RejectedPaused;
        }
        self.capture_now_pending = true;
        if floor_elapsed(state, now_ms) {
            CaptureNowDecision::Accepted
        } else {
            let ready_at_ms = state
                .last_capture_ms()
                .map_or(now_ms, |last| last.saturating_add(state.minimum_interval_ms()));
            debug!("Capture-now deferred until {}ms", ready_at_ms);
            CaptureNowDecision::Deferred { ready_at_ms }
        }
    }

    pub fn pause(&mut self, state: &mut CaptureCycleState) {
        if !state.paused() {
            info!("Capture paused");
        }
        state.set_paused(true);
        self.capture_now_pending = false;
    }

    pub fn resume(&mut self, state: &mut CaptureCycleState) {
        if state.paused() {
            info!("Capture resumed");
        }
        state.set_paused(false);
    }

    /// Returns the interval actually stored, after clamping to the floor.
    pub fn set_interval(&mut self, state: &mut CaptureCycleState, interval_ms: u64) -> u64 {
        let stored = state.set_interval(interval_ms);
        if stored != interval_ms {
            debug!(
                "Requested interval {}ms raised to minimum {}ms",
                interval_ms, stored
            );
        }
        info!("Capture interval set to {}ms", stored);
        stored
    }

    /// When the interval timer next fires, if a cycle has run before.
    pub fn next_due_ms(&self, state: &CaptureCycleState) -> Option<u64> {
        self.last_cycle_start_ms
            .map(|start| start.saturating_add(state.interval_ms()))
    }
}

fn floor_elapsed(state: &CaptureCycleState, now_ms: u64) -> bool {
    state
        .last_capture_ms()
        .map_or(true, |last| now_ms.saturating_sub(last) >= state.minimum_interval_ms())
}

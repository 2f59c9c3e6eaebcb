use crate::{
    capture::{
        AttemptOutcome, CaptureCycleState, CaptureScheduler, FailureCounters, FrameSource,
        OutputSink, ReliabilityMonitor, RetryPolicy, Tick, Watchdog,
    },
    command::{Command, CommandEnvelope, CommandResponse, StatusReport},
    common::{Clock, Frame, SystemClock},
    config::Configuration,
    error::AppError,
    pipeline::{ClassificationAggregator, Confidence, SkyCondition, Verdict},
};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// What one loop iteration did about the capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleReport {
    Idle,
    RetryScheduled { next_attempt: u32, retry_at_ms: u64 },
    Skipped { attempts: u32 },
    Completed {
        condition: SkyCondition,
        confidence: Confidence,
        delivered: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopStep {
    pub cycle: CycleReport,
    pub watchdog_fed: bool,
}

/// Single-threaded control loop. Each `poll` runs at most one capture
/// attempt and always finishes by consulting the watchdog gate, so nothing
/// in an iteration waits on a retry delay.
pub struct Coordinator {
    configuration: Configuration,
    state: CaptureCycleState,
    scheduler: CaptureScheduler,
    aggregator: ClassificationAggregator,
    monitor: ReliabilityMonitor,
    source: Box<dyn FrameSource>,
    sink: Box<dyn OutputSink>,
    watchdog: Option<Box<dyn Watchdog>>,
    clock: Box<dyn Clock>,
    last_verdict: Option<Verdict>,
}

impl Coordinator {
    pub fn builder(configuration: Configuration) -> CoordinatorBuilder {
        CoordinatorBuilder::new(configuration)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn state(&self) -> &CaptureCycleState {
        &self.state
    }

    pub fn last_verdict(&self) -> Option<&Verdict> {
        self.last_verdict.as_ref()
    }

    pub fn counters(&self) -> FailureCounters {
        self.monitor.counters(&self.state)
    }

    /// One iteration of the control loop.
    pub fn poll(&mut self) -> LoopStep {
        let now_ms = self.clock.now_ms();
        let cycle = match self.scheduler.poll(&self.state, now_ms) {
            Tick::Wait => CycleReport::Idle,
            Tick::Capture { attempt } => self.attempt_capture(attempt),
        };
        let watchdog_fed = self.feed_watchdog();
        LoopStep {
            cycle,
            watchdog_fed,
        }
    }

    fn attempt_capture(&mut self, attempt: u32) -> CycleReport {
        let captured = self.source.capture();
        let now_ms = self.clock.now_ms();
        match captured {
            Ok(frame) => {
                self.scheduler.record_success(&mut self.state, now_ms);
                self.monitor.record_capture_success(&mut self.state);
                self.process_frame(frame)
            }
            Err(e) => {
                warn!("Capture attempt {} failed: {}", attempt, e);
                match self.scheduler.record_failure(attempt, now_ms) {
                    AttemptOutcome::RetryScheduled {
                        next_attempt,
                        retry_at_ms,
                    } => CycleReport::RetryScheduled {
                        next_attempt,
                        retry_at_ms,
                    },
                    AttemptOutcome::Skipped { attempts } => {
                        self.monitor.record_capture_failure(&mut self.state);
                        CycleReport::Skipped { attempts }
                    }
                }
            }
        }
    }

    // The frame is dropped when this returns; only the verdict outlives the cycle.
    fn process_frame(&mut self, frame: Frame) -> CycleReport {
        let expected = self.configuration.watchdog.expected_width as usize
            * self.configuration.watchdog.expected_height as usize;
        if frame.pixel_count() > expected {
            warn!(
                "Frame {}x{} is larger than the expected {}x{}",
                frame.width(),
                frame.height(),
                self.configuration.watchdog.expected_width,
                self.configuration.watchdog.expected_height
            );
        }
        let cost = self.aggregator.sample_cost(&frame);
        if cost > self.configuration.watchdog.sample_budget {
            warn!(
                "Analysis of frame {} visits {} samples, over the budget of {}",
                frame.id(),
                cost,
                self.configuration.watchdog.sample_budget
            );
        }

        let verdict = self.aggregator.analyze(&frame);
        let delivered = self.deliver(&frame, &verdict);
        let report = CycleReport::Completed {
            condition: verdict.overall_condition(),
            confidence: verdict.confidence(),
            delivered,
        };
        self.last_verdict = Some(verdict);
        report
    }

    fn deliver(&mut self, frame: &Frame, verdict: &Verdict) -> bool {
        let attempts = self.scheduler.policy().max_delivery_retries;
        for attempt in 1..=attempts {
            match self.sink.deliver(frame, verdict) {
                Ok(()) => {
                    self.monitor.record_delivery_success(&mut self.state);
                    return true;
                }
                Err(e) => warn!("Delivery attempt {}/{} failed: {}", attempt, attempts, e),
            }
        }
        error!("Verdict for frame {} was not delivered", frame.id());
        self.monitor.record_delivery_failure(&mut self.state);
        false
    }

    fn feed_watchdog(&mut self) -> bool {
        let allowed = self.monitor.should_feed_watchdog(&self.state);
        let Some(watchdog) = self.watchdog.as_mut() else {
            return false;
        };
        if allowed {
            watchdog.feed();
        } else {
            debug!("Health is critical, withholding watchdog feed");
        }
        allowed
    }

    pub fn handle_command(&mut self, command: Command) -> CommandResponse {
        debug!("Handling command {:?}", command);
        match command {
            Command::Pause => {
                self.scheduler.pause(&mut self.state);
                CommandResponse::Paused
            }
            Command::Resume => {
                self.scheduler.resume(&mut self.state);
                CommandResponse::Resumed
            }
            Command::CaptureNow => {
                let now_ms = self.clock.now_ms();
                CommandResponse::CaptureNow(self.scheduler.request_capture_now(&self.state, now_ms))
            }
            Command::SetInterval(interval_ms) => CommandResponse::IntervalSet {
                interval_ms: self.scheduler.set_interval(&mut self.state, interval_ms),
            },
            Command::GetStatus => CommandResponse::Status(self.status()),
        }
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            paused: self.state.paused(),
            interval_ms: self.state.interval_ms(),
            phase: self.scheduler.phase(&self.state),
            health: self.monitor.health(&self.state),
            counters: self.monitor.counters(&self.state),
            last_capture_ms: self.state.last_capture_ms(),
            next_due_ms: self.scheduler.next_due_ms(&self.state),
            last_verdict: self.last_verdict.clone(),
        }
    }

    /// Drive the loop every `loop_period_ms` until `shutdown` resolves.
    /// Commands are handled between iterations, never during one.
    pub async fn run<S>(
        mut self,
        mut commands: Receiver<CommandEnvelope>,
        shutdown: S,
    ) -> Result<FailureCounters, AppError>
    where
        S: Future<Output = ()>,
    {
        let period = Duration::from_millis(self.configuration.capture.loop_period_ms);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            "Control loop started: interval {}ms, analyzers {:?}",
            self.state.interval_ms(),
            self.aggregator.enabled()
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping control loop");
                    break;
                }
                Some(envelope) = commands.recv() => {
                    let response = self.handle_command(envelope.command);
                    if envelope.reply.send(response).is_err() {
                        debug!("Command sender went away before the reply");
                    }
                }
                _ = ticker.tick() => {
                    self.poll();
                }
            }
        }

        let counters = self.counters();
        info!(
            "Control loop stopped after {} cycles ({} skipped)",
            counters.total_cycles, counters.skipped_cycles
        );
        Ok(counters)
    }
}

pub struct CoordinatorBuilder {
    configuration: Configuration,
    source: Option<Box<dyn FrameSource>>,
    sink: Option<Box<dyn OutputSink>>,
    watchdog: Option<Box<dyn Watchdog>>,
    clock: Option<Box<dyn Clock>>,
}

impl CoordinatorBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            source: None,
            sink: None,
            watchdog: None,
            clock: None,
        }
    }

    // Sets the retry policy, this will override the default configuration.
    pub fn retries(mut self, max_capture_retries: u32, max_delivery_retries: u32) -> Self {
        self.configuration.capture.max_capture_retries = max_capture_retries;
        self.configuration.capture.max_delivery_retries = max_delivery_retries;
        self
    }

    pub fn source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn sink(mut self, sink: Box<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn watchdog(mut self, watchdog: Box<dyn Watchdog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    // Defaults to the system clock.
    pub fn clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Coordinator, AppError> {
        self.configuration.validate()?;
        let source = self
            .source
            .ok_or(AppError::Coordinator("Frame source not set".to_string()))?;
        let sink = self
            .sink
            .ok_or(AppError::Coordinator("Output sink not set".to_string()))?;
        if self.watchdog.is_none() && self.configuration.watchdog.enabled {
            warn!("Watchdog enabled in configuration but none was attached");
        }

        let aggregator = ClassificationAggregator::from_config(&self.configuration.analysis)?;
        Ok(Coordinator {
            state: CaptureCycleState::from_config(&self.configuration.capture),
            scheduler: CaptureScheduler::new(RetryPolicy::from_config(&self.configuration.capture)),
            monitor: ReliabilityMonitor::new(&self.configuration.reliability),
            aggregator,
            source,
            sink,
            watchdog: self.watchdog,
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock::new())),
            last_verdict: None,
            configuration: self.configuration,
        })
    }
}

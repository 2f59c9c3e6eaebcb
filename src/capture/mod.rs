pub mod ports;
pub mod reliability;
pub mod scheduler;
pub mod state;

pub use ports::{FrameSource, OutputSink, Watchdog};
pub use reliability::{FailureCounters, Health, ReliabilityMonitor};
pub use scheduler::{AttemptOutcome, CaptureNowDecision, CaptureScheduler, SchedulerPhase, Tick};
pub use state::{CaptureCycleState, RetryPolicy};

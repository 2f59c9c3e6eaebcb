use crate::capture::{CaptureNowDecision, FailureCounters, Health, SchedulerPhase};
use crate::error::AppError;
use crate::pipeline::Verdict;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

/// Operator commands accepted by the control loop between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    CaptureNow,
    SetInterval(u64),
    GetStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CommandResponse {
    Paused,
    Resumed,
    CaptureNow(CaptureNowDecision),
    /// The interval actually stored, after clamping.
    IntervalSet { interval_ms: u64 },
    Status(StatusReport),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub paused: bool,
    pub interval_ms: u64,
    pub phase: SchedulerPhase,
    pub health: Health,
    pub counters: FailureCounters,
    pub last_capture_ms: Option<u64>,
    pub next_due_ms: Option<u64>,
    pub last_verdict: Option<Verdict>,
}

pub struct CommandEnvelope {
    pub command: Command,
    pub reply: oneshot::Sender<CommandResponse>,
}

/// Sending half of the command channel.
#[derive(Clone)]
pub struct CommandHandle {
    tx: mpsc::Sender<CommandEnvelope>,
}

impl CommandHandle {
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<CommandEnvelope>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// Queue a command and wait for the loop to answer it.
    pub async fn send(&self, command: Command) -> Result<CommandResponse, AppError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(CommandEnvelope { command, reply })
            .await
            .map_err(|_| AppError::Coordinator("Control loop is not running".to_string()))?;
        response
            .await
            .map_err(|_| AppError::Coordinator("Control loop dropped the command".to_string()))
    }
}

use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Coordinator Error: {0}")]
    Coordinator(String),
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
}

// Rejected at start-up, never per cycle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Sample stride for the {0} analyzer must be greater than 0")]
    ZeroStride(&'static str),
    #[error("Brightness thresholds must be strictly descending, got {0:?}")]
    UnorderedBrightnessThresholds([f32; 4]),
    #[error("At least one analyzer must be enabled")]
    NoAnalyzerEnabled,
    #[error("Minimum capture interval must be greater than 0")]
    ZeroMinimumInterval,
    #[error("At least one capture attempt per cycle is required")]
    ZeroCaptureAttempts,
    #[error("At least one delivery attempt per cycle is required")]
    ZeroDeliveryAttempts,
    #[error("Degraded threshold ({degraded}) must be below critical threshold ({critical})")]
    HealthThresholds { degraded: u32, critical: u32 },
    #[error("Fraction threshold {name} must be within 0.0..=1.0, got {value}")]
    FractionOutOfRange { name: &'static str, value: f32 },
    #[error("Sky thresholds overlap: clear {clear_fraction}, cloudy {cloudy_ratio}, overcast {overcast_fraction}")]
    UnorderedSkyThresholds {
        clear_fraction: f32,
        cloudy_ratio: f32,
        overcast_fraction: f32,
    },
    #[error("Loop period {loop_period_ms}ms must be shorter than the watchdog timeout {timeout_ms}ms")]
    LoopPeriodTooLong { loop_period_ms: u64, timeout_ms: u64 },
    #[error("Worst-case analysis cost of {samples} samples exceeds the budget of {budget}")]
    SampleBudgetExceeded { samples: u64, budget: u64 },
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Frame dimensions must be non-zero, got {0}x{1}")]
    ZeroDimension(u32, u32),
    #[error("Buffer holds {actual} bytes but {width}x{height} {format} needs {expected}")]
    LengthMismatch {
        width: u32,
        height: u32,
        format: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Sensor failed to produce a frame: {0}")]
    Sensor(String),
    #[error("Captured frame was unusable: {0}")]
    InvalidFrame(#[from] FrameError),
}

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Output sink rejected the frame: {0}")]
    Rejected(String),
    #[error("Output sink is unreachable: {0}")]
    Unreachable(String),
    #[error("Failed to encode verdict: {0}")]
    Encode(#[from] serde_json::Error),
}

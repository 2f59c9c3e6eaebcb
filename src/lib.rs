pub mod capture;
pub mod command;
pub mod common;
pub mod config;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod pipeline;

pub use error::{AppError, CaptureError, ConfigError, DeliveryError, FrameError};

pub use command::{Command, CommandHandle, CommandResponse, StatusReport};
pub use config::Configuration;
pub use coordinator::{Coordinator, CoordinatorBuilder};
pub use pipeline::{ClassificationAggregator, Confidence, SkyCondition, Verdict};

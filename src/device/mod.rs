pub mod directory_source;
pub mod json_sink;
pub mod watchdog;

pub use directory_source::DirectorySource;
pub use json_sink::JsonSink;
pub use watchdog::SoftwareWatchdog;

use skywatch::command::CommandHandle;
use skywatch::config::Configuration;
use skywatch::coordinator::Coordinator;
use skywatch::device::{DirectorySource, JsonSink, SoftwareWatchdog};
use skywatch::error::AppError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};

fn init_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let configuration = Configuration::load(config_path.as_deref())?;
    init_logging(&configuration.log_level);

    let source = DirectorySource::open(&configuration.source.image_dir)?;
    let mut builder = Coordinator::builder(configuration.clone())
        .source(Box::new(source))
        .sink(Box::new(JsonSink::new(std::io::stdout())));

    let monitor = if configuration.watchdog.enabled {
        let watchdog =
            SoftwareWatchdog::new(Duration::from_millis(configuration.watchdog.timeout_ms));
        builder = builder.watchdog(Box::new(watchdog.clone()));
        Some(watchdog.spawn_monitor())
    } else {
        None
    };
    let coordinator = builder.build()?;

    // Held so the command channel stays open.
    let (_commands, command_rx) = CommandHandle::channel(16);
    let counters = coordinator
        .run(command_rx, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    if let Some(monitor) = monitor {
        monitor.abort();
    }
    info!(
        "Stopped: {} cycles, {} captures, {} skipped, {} delivered",
        counters.total_cycles,
        counters.successful_captures,
        counters.skipped_cycles,
        counters.deliveries
    );
    Ok(())
}

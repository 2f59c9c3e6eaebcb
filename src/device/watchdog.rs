use crate::capture::Watchdog;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Host-side stand-in for the hardware watchdog. It cannot reset anything,
/// so an expired timer is reported instead.
#[derive(Clone)]
pub struct SoftwareWatchdog {
    timeout: Duration,
    last_feed: Arc<Mutex<Instant>>,
}

impl SoftwareWatchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_feed: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn since_last_feed(&self) -> Duration {
        match self.last_feed.lock() {
            Ok(last) => last.elapsed(),
            Err(poisoned) => poisoned.into_inner().elapsed(),
        }
    }

    pub fn expired(&self) -> bool {
        self.since_last_feed() >= self.timeout
    }

    /// Check the timer periodically and log once per missed window.
    pub fn spawn_monitor(&self) -> JoinHandle<()> {
        let watchdog = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval((watchdog.timeout / 4).max(Duration::from_millis(1)));
            let mut reported = false;
            loop {
                ticker.tick().await;
                match (watchdog.expired(), reported) {
                    (true, false) => {
                        error!(
                            "Watchdog not fed for {}ms, a hardware watchdog would reset the device now",
                            watchdog.since_last_feed().as_millis()
                        );
                        reported = true;
                    }
                    (false, true) => {
                        info!("Watchdog feeding resumed");
                        reported = false;
                    }
                    _ => {}
                }
            }
        })
    }
}

impl Watchdog for SoftwareWatchdog {
    fn feed(&mut self) {
        let now = Instant::now();
        match self.last_feed.lock() {
            Ok(mut last) => *last = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feeding_rearms_the_timer() {
        let mut watchdog = SoftwareWatchdog::new(Duration::from_millis(30));
        assert!(!watchdog.expired());

        std::thread::sleep(Duration::from_millis(40));
        assert!(watchdog.expired());

        watchdog.feed();
        assert!(!watchdog.expired());
    }

    #[test]
    fn clones_share_the_timer() {
        let watchdog = SoftwareWatchdog::new(Duration::from_millis(30));
        let mut fed_by_loop = watchdog.clone();
        std::thread::sleep(Duration::from_millis(40));
        fed_by_loop.feed();
        assert!(!watchdog.expired());
    }
}

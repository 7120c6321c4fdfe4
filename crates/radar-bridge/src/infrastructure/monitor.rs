//! Port monitor: notices when serial endpoints appear or disappear.
//!
//! The monitor only compares endpoint *paths* between polls; it never
//! touches an open link.  The supervisor decides what a change means.

use std::collections::BTreeSet;
use std::time::Duration;

use radar_core::SerialEndpoint;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

pub struct PortMonitor {
    ticker: Interval,
    last_seen: Option<BTreeSet<String>>,
}

impl PortMonitor {
    /// Creates a monitor whose first tick fires one `period` from now.
    pub fn new(period: Duration) -> Self {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            last_seen: None,
        }
    }

    /// Waits for the next poll.
    pub async fn tick(&mut self) {
        self.ticker.tick().await;
    }

    /// Records the current endpoint set.
    ///
    /// Returns `true` if it differs from the previous observation.  The very
    /// first observation only sets the baseline and returns `false`.
    pub fn observe(&mut self, ports: &[SerialEndpoint]) -> bool {
        let current: BTreeSet<String> = ports.iter().map(|p| p.path.clone()).collect();
        match self.last_seen.replace(current) {
            Some(previous) => self.last_seen.as_ref() != Some(&previous),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(paths: &[&str]) -> Vec<SerialEndpoint> {
        paths.iter().map(|p| SerialEndpoint::new(*p)).collect()
    }

    #[tokio::test]
    async fn test_first_observation_is_baseline() {
        let mut monitor = PortMonitor::new(Duration::from_secs(3));
        assert!(!monitor.observe(&ports(&["/dev/ttyUSB0"])));
    }

    #[tokio::test]
    async fn test_detects_added_and_removed_endpoints() {
        // Arrange
        let mut monitor = PortMonitor::new(Duration::from_secs(3));
        monitor.observe(&ports(&["/dev/ttyS0"]));

        // Act / Assert
        assert!(monitor.observe(&ports(&["/dev/ttyS0", "/dev/ttyUSB0"])));
        assert!(!monitor.observe(&ports(&["/dev/ttyUSB0", "/dev/ttyS0"])), "order is irrelevant");
        assert!(monitor.observe(&ports(&["/dev/ttyS0"])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let start = Instant::now();
        let mut monitor = PortMonitor::new(Duration::from_secs(3));

        monitor.tick().await;
        monitor.tick().await;

        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }
}

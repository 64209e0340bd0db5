use crate::config::ConnectivityConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Backend reachability as last observed by the prober
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectivityState {
    pub online: bool,
    pub consecutive_failures: u32,
    pub last_check: Option<DateTime<Utc>>,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            online: true,
            consecutive_failures: 0,
            last_check: None,
        }
    }
}

/// What the controller has to do after a probe result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivitySignal {
    None,
    EnterMaintenance,
    Recovered,
}

/// Counts consecutive probe failures and owns the polling cadence.
///
/// The controller feeds every probe result through [`record_probe`] and acts
/// on the returned signal. The prober task follows the cadence published on
/// the watch channel, so switching between the online and maintenance
/// interval re-arms its sleep immediately.
///
/// [`record_probe`]: ConnectivityMonitor::record_probe
pub struct ConnectivityMonitor {
    state: ConnectivityState,
    failure_threshold: u32,
    online_poll: Duration,
    maintenance_poll: Duration,
    cadence: watch::Sender<Duration>,
}

impl ConnectivityMonitor {
    /// Create a monitor along with the cadence receiver for the prober
    pub fn new(config: &ConnectivityConfig) -> (Self, watch::Receiver<Duration>) {
        let (cadence, cadence_rx) = watch::channel(config.online_poll());
        let monitor = Self {
            state: ConnectivityState::default(),
            failure_threshold: config.failure_threshold.max(1),
            online_poll: config.online_poll(),
            maintenance_poll: config.maintenance_poll(),
            cadence,
        };
        (monitor, cadence_rx)
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn current_poll_interval(&self) -> Duration {
        *self.cadence.borrow()
    }

    pub fn record_probe(&mut self, healthy: bool, in_maintenance: bool) -> ConnectivitySignal {
        self.record_probe_at(healthy, in_maintenance, Utc::now())
    }

    pub fn record_probe_at(
        &mut self,
        healthy: bool,
        in_maintenance: bool,
        now: DateTime<Utc>,
    ) -> ConnectivitySignal {
        self.state.last_check = Some(now);

        if healthy {
            if self.state.consecutive_failures > 0 {
                info!(
                    "Backend reachable again after {} failed health checks",
                    self.state.consecutive_failures
                );
            }
            self.state.consecutive_failures = 0;
            self.state.online = true;

            if in_maintenance {
                self.set_cadence(self.online_poll);
                return ConnectivitySignal::Recovered;
            }
            return ConnectivitySignal::None;
        }

        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
        self.state.online = false;
        warn!(
            "Health check failed ({}/{})",
            self.state.consecutive_failures, self.failure_threshold
        );

        if !in_maintenance && self.state.consecutive_failures >= self.failure_threshold {
            self.set_cadence(self.maintenance_poll);
            return ConnectivitySignal::EnterMaintenance;
        }
        ConnectivitySignal::None
    }

    fn set_cadence(&self, interval: Duration) {
        debug!("Health probe interval set to {:?}", interval);
        // send_replace keeps the value even if the prober has not subscribed yet
        self.cadence.send_replace(interval);
    }
}

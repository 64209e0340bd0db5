use crate::events::ControllerMessage;
use crate::verify::VerificationBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Periodic backend health probe.
///
/// Probes once on start, then sleeps for whatever interval the monitor
/// currently publishes. Results go to the controller as
/// [`ControllerMessage::ProbeCompleted`]; a probe that errors or exceeds the
/// health timeout counts as a failure.
pub struct HealthProber {
    backend: Arc<dyn VerificationBackend>,
    timeout: Duration,
    cadence: watch::Receiver<Duration>,
    messages: mpsc::Sender<ControllerMessage>,
    cancel: CancellationToken,
    cadence_open: bool,
}

impl HealthProber {
    pub fn new(
        backend: Arc<dyn VerificationBackend>,
        timeout: Duration,
        cadence: watch::Receiver<Duration>,
        messages: mpsc::Sender<ControllerMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            timeout,
            cadence,
            messages,
            cancel,
            cadence_open: true,
        }
    }

    pub async fn run(mut self) {
        info!("Health prober started");

        loop {
            let healthy = tokio::select! {
                _ = self.cancel.cancelled() => break,
                healthy = self.probe() => healthy,
            };

            if self
                .messages
                .send(ControllerMessage::ProbeCompleted { healthy })
                .await
                .is_err()
            {
                debug!("Controller gone, stopping health prober");
                break;
            }

            if !self.wait_for_next_probe().await {
                break;
            }
        }

        info!("Health prober stopped");
    }

    async fn probe(&self) -> bool {
        match tokio::time::timeout(self.timeout, self.backend.health_check()).await {
            Ok(Ok(healthy)) => {
                debug!("Health check returned {}", healthy);
                healthy
            }
            Ok(Err(e)) => {
                warn!("Health check failed: {}", e);
                false
            }
            Err(_) => {
                warn!("Health check timed out after {:?}", self.timeout);
                false
            }
        }
    }

    /// Sleep until the next probe is due. A cadence change restarts the wait
    /// with the new interval. Returns false once cancelled.
    async fn wait_for_next_probe(&mut self) -> bool {
        loop {
            let interval = *self.cadence.borrow_and_update();
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(interval) => return true,
                changed = self.cadence.changed(), if self.cadence_open => {
                    if changed.is_err() {
                        self.cadence_open = false;
                    } else {
                        debug!("Probe cadence changed, re-arming");
                    }
                }
            }
        }
    }
}

use super::machine::KioskController;
use crate::events::ControllerMessage;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Drive the controller until shutdown.
///
/// This is the only task that mutates kiosk state. Messages from capture,
/// workers, the prober and operator input arrive on `messages`; the display
/// tick is generated here.
pub async fn run_controller(
    mut controller: KioskController,
    mut messages: mpsc::Receiver<ControllerMessage>,
    tick: Duration,
    cancel: CancellationToken,
) -> KioskController {
    info!("Kiosk controller started in {}", controller.state());

    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                controller.handle(ControllerMessage::Shutdown);
                break;
            }
            message = messages.recv() => match message {
                Some(message) => {
                    if !controller.handle(message) {
                        break;
                    }
                }
                None => {
                    debug!("All controller senders dropped");
                    controller.handle(ControllerMessage::Shutdown);
                    break;
                }
            },
            _ = ticker.tick() => {
                controller.handle(ControllerMessage::Tick);
            }
        }
    }

    info!("Kiosk controller stopped in {}", controller.state());
    controller
}

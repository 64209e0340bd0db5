use super::{KioskOrchestrator, ShutdownReason};
use crate::error::{KioskError, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

type ShutdownSlot = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

impl KioskOrchestrator {
    /// Run until a signal, the operator or [`request_shutdown`] stops the
    /// kiosk, then shut down gracefully
    ///
    /// [`request_shutdown`]: KioskOrchestrator::request_shutdown
    pub async fn run(&mut self) -> Result<i32> {
        info!("Kiosk is running");

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| KioskError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers();

        let reason = tokio::select! {
            reason = shutdown_receiver => reason.map_err(|_| {
                KioskError::system("Shutdown channel closed unexpectedly")
            })?,
            _ = self.user_quit.cancelled() => ShutdownReason::UserRequest,
        };
        info!("Shutdown initiated: {}", reason);

        let exit_code = self.shutdown().await?;
        info!("Kiosk shutdown complete");
        Ok(exit_code)
    }

    pub async fn request_shutdown(&self, reason: ShutdownReason) {
        send_shutdown(&self.shutdown_sender, reason).await;
    }

    fn setup_signal_handlers(&self) {
        #[cfg(unix)]
        {
            let slot = Arc::clone(&self.shutdown_sender);
            tokio::spawn(async move {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        if sigterm.recv().await.is_some() {
                            info!("Received SIGTERM signal");
                            send_shutdown(&slot, ShutdownReason::Signal("SIGTERM".to_string()))
                                .await;
                        }
                    }
                    Err(e) => error!("Failed to register SIGTERM handler: {}", e),
                }
            });
        }

        let slot = Arc::clone(&self.shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                send_shutdown(&slot, ShutdownReason::Signal("SIGINT".to_string())).await;
            }
        });
    }
}

async fn send_shutdown(slot: &ShutdownSlot, reason: ShutdownReason) {
    if let Some(sender) = slot.lock().await.take() {
        let _ = sender.send(reason);
    }
}

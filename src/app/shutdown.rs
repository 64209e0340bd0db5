use super::{ComponentState, KioskOrchestrator};
use crate::error::{KioskError, Result};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info};

const CONTROLLER_STOP_TIMEOUT: Duration = Duration::from_secs(10);
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl KioskOrchestrator {
    /// Stop every component. The controller goes first so the camera is
    /// released before the collaborators disappear.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if let Some(handle) = self.controller_task.take() {
            match self
                .await_component("controller", handle, CONTROLLER_STOP_TIMEOUT)
                .await
            {
                Ok(controller) => info!("Controller stopped in {}", controller.state()),
                Err(e) => {
                    error!("Error stopping controller: {}", e);
                    exit_code = 1;
                }
            }
        }

        for (component, handle) in std::mem::take(&mut self.tasks) {
            if let Err(e) = self
                .await_component(component, handle, TASK_STOP_TIMEOUT)
                .await
            {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        if self.keyboard_enabled {
            if let Some(keyboard_handler) = &self.keyboard_handler {
                self.set_component_state("keyboard", ComponentState::Stopping)
                    .await;
                match timeout(Duration::from_secs(2), keyboard_handler.stop()).await {
                    Ok(Ok(())) => {
                        self.set_component_state("keyboard", ComponentState::Stopped)
                            .await
                    }
                    _ => {
                        error!("Error stopping keyboard console");
                        self.set_component_state("keyboard", ComponentState::Failed)
                            .await;
                        exit_code = 1;
                    }
                }
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn await_component<T>(
        &self,
        component: &str,
        handle: JoinHandle<T>,
        limit: Duration,
    ) -> Result<T> {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(limit, handle).await {
            Ok(Ok(value)) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(value)
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(KioskError::component(
                    component,
                    format!("task failed: {}", e),
                ))
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(KioskError::system(format!(
                    "{} component stop timeout",
                    component
                )))
            }
        }
    }
}

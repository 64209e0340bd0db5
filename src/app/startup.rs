use super::{ComponentState, KioskOrchestrator};
use crate::connectivity::HealthProber;
use crate::controller::run_controller;
use crate::display::DisplayPresenter;
use crate::error::{KioskError, Result};
use crate::events::{ControllerMessage, OperatorCommand};
use std::sync::Arc;
use tracing::{error, info};

impl KioskOrchestrator {
    /// Register every component as stopped
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing kiosk components");

        let mut states = self.component_states.lock().await;
        for component in ["presenter", "controller", "prober"] {
            states.insert(component.to_string(), ComponentState::Stopped);
        }
        if self.keyboard_enabled {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }
        #[cfg(all(feature = "touch", target_os = "linux"))]
        states.insert("touch".to_string(), ComponentState::Stopped);
        drop(states);

        info!("All components initialized");
        Ok(())
    }

    /// Start all components. The presenter subscribes before the controller
    /// runs so it sees the very first transition.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting kiosk");

        let pending = self
            .pending
            .take()
            .ok_or_else(|| KioskError::system("Kiosk already started"))?;

        self.set_component_state("presenter", ComponentState::Starting)
            .await;
        let presenter = DisplayPresenter::new(&self.event_bus);
        self.tasks.push((
            "presenter",
            tokio::spawn(presenter.run(self.cancellation_token.clone())),
        ));
        self.set_component_state("presenter", ComponentState::Running)
            .await;

        self.set_component_state("controller", ComponentState::Starting)
            .await;
        self.controller_task = Some(tokio::spawn(run_controller(
            pending.controller,
            pending.messages,
            self.config.display.tick(),
            self.cancellation_token.clone(),
        )));
        self.set_component_state("controller", ComponentState::Running)
            .await;

        self.set_component_state("prober", ComponentState::Starting)
            .await;
        let prober = HealthProber::new(
            Arc::clone(&self.backend),
            self.config.backend.health_timeout(),
            pending.cadence,
            self.messages.clone(),
            self.cancellation_token.clone(),
        );
        self.tasks.push(("prober", tokio::spawn(prober.run())));
        self.set_component_state("prober", ComponentState::Running)
            .await;

        if self.keyboard_enabled {
            if let Some(keyboard_handler) = &self.keyboard_handler {
                self.set_component_state("keyboard", ComponentState::Starting)
                    .await;
                match keyboard_handler.start().await {
                    Ok(()) => {
                        self.set_component_state("keyboard", ComponentState::Running)
                            .await
                    }
                    Err(e) => {
                        error!("Failed to start keyboard console: {}", e);
                        self.set_component_state("keyboard", ComponentState::Failed)
                            .await;
                    }
                }
            }
        }

        #[cfg(all(feature = "touch", target_os = "linux"))]
        {
            let touch = crate::touch::TouchInputHandler::new(
                &self.config.display,
                self.messages.clone(),
            );
            touch.start(self.cancellation_token.clone());
            self.set_component_state("touch", ComponentState::Running)
                .await;
        }

        if self.auto_start {
            info!("Auto-start enabled, acquiring camera");
            self.messages
                .send(ControllerMessage::Operator(OperatorCommand::StartScanning))
                .await
                .map_err(|_| KioskError::system("Controller queue closed during startup"))?;
        }

        info!("Kiosk started");
        Ok(())
    }
}

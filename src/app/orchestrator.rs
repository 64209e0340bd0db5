use super::types::{CameraSetup, ComponentState, ShutdownReason};
use crate::capture::{ScanCapture, ScanScript};
use crate::config::KioskConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::controller::KioskController;
use crate::error::Result;
use crate::events::{ControllerMessage, EventBus};
use crate::keyboard_input::KeyboardInputHandler;
use crate::ocr::TextExtractor;
use crate::scanlog::JsonFileScanLog;
use crate::state::SharedKioskState;
use crate::verify::{VerificationBackend, VerificationDispatcher};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Built at construction, consumed by `start`
pub(super) struct PendingComponents {
    pub(super) controller: KioskController,
    pub(super) messages: mpsc::Receiver<ControllerMessage>,
    pub(super) cadence: watch::Receiver<Duration>,
}

/// Wires the kiosk components together and manages their lifecycle
pub struct KioskOrchestrator {
    pub(super) config: KioskConfig,
    pub(super) event_bus: EventBus,
    pub(super) shared_state: SharedKioskState,
    pub(super) backend: Arc<dyn VerificationBackend>,
    pub(super) messages: mpsc::Sender<ControllerMessage>,
    pub(super) pending: Option<PendingComponents>,

    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,
    pub(super) auto_start: bool,

    // Lifecycle management
    pub(super) controller_task: Option<JoinHandle<KioskController>>,
    pub(super) tasks: Vec<(&'static str, JoinHandle<()>)>,
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) user_quit: CancellationToken,
    pub(super) cancellation_token: CancellationToken,
}

impl KioskOrchestrator {
    pub fn new(
        config: KioskConfig,
        backend: Arc<dyn VerificationBackend>,
        extractor: Arc<dyn TextExtractor>,
        camera: CameraSetup,
    ) -> Result<Self> {
        let event_bus = EventBus::new(config.system.event_bus_capacity);
        let shared_state = SharedKioskState::default();
        let (messages, messages_rx) = mpsc::channel(config.system.queue_capacity);
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let user_quit = CancellationToken::new();

        let scan_log = Arc::new(JsonFileScanLog::in_dir(
            &config.system.data_dir,
            config.system.scan_log_capacity,
        )?);
        info!("Scan log at {}", scan_log.path().display());

        let capture = ScanCapture::new(
            &config.camera,
            &config.scan,
            camera.opener,
            camera.decoder,
            shared_state.clone(),
            messages.clone(),
            event_bus.clone(),
        );
        let dispatcher = VerificationDispatcher::new(
            &config,
            Arc::clone(&backend),
            extractor,
            messages.clone(),
        )?;
        let (connectivity, cadence) = ConnectivityMonitor::new(&config.connectivity);

        let controller = KioskController::new(
            &config,
            Box::new(capture),
            dispatcher,
            connectivity,
            shared_state.clone(),
            event_bus.clone(),
            scan_log,
        );

        let keyboard_handler = Some(KeyboardInputHandler::new(
            messages.clone(),
            user_quit.clone(),
        ));

        Ok(Self {
            config,
            event_bus,
            shared_state,
            backend,
            messages,
            pending: Some(PendingComponents {
                controller,
                messages: messages_rx,
                cadence,
            }),
            keyboard_handler,
            keyboard_enabled: false,
            auto_start: false,
            controller_task: None,
            tasks: Vec::new(),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            shutdown_receiver: Some(shutdown_receiver),
            user_quit,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable the operator keyboard console
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    /// Start scanning as soon as the controller runs instead of waiting for
    /// the operator
    pub fn set_auto_start(&mut self, enabled: bool) {
        self.auto_start = enabled;
    }

    /// Bind the console digit keys to payloads shown to the synthetic camera
    pub fn set_scripted_payloads(&mut self, script: ScanScript, payloads: Vec<String>) {
        self.keyboard_handler = self
            .keyboard_handler
            .take()
            .map(|handler| handler.with_scripted_payloads(script, payloads));
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn shared_state(&self) -> SharedKioskState {
        self.shared_state.clone()
    }

    /// Queue into the controller, for operator front ends
    pub fn controller_sender(&self) -> mpsc::Sender<ControllerMessage> {
        self.messages.clone()
    }
}

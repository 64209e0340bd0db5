use crate::capture::CaptureControl;
use crate::config::KioskConfig;
use crate::connectivity::{ConnectivityMonitor, ConnectivitySignal, ConnectivityState};
use crate::display::{CountdownKind, DisplayTimer, TimerTick};
use crate::events::{
    ControllerMessage, EventBus, KioskEvent, OperatorCommand, ScanEvent, ScanSource, TouchSignal,
};
use crate::ocr::{OcrCaptureFlow, OcrCaptureStep};
use crate::scanlog::{ScanLogEntry, ScanLogSink};
use crate::state::{KioskState, SharedKioskState};
use crate::verify::{VerificationDispatcher, VerificationOutcome};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

pub const PROCESSING_TIMEOUT_MESSAGE: &str =
    "Verification is taking too long. Please try again.";

/// The kiosk state machine.
///
/// Owns every piece of mutable kiosk state and is driven by a single task
/// through [`handle`](KioskController::handle). Any (state, message) pair
/// without a transition is a no-op.
pub struct KioskController {
    state: KioskState,
    shared_state: SharedKioskState,
    flow: OcrCaptureFlow,
    timer: DisplayTimer,
    /// Bumped on every dispatch and every abandonment; completions carrying
    /// an older generation are stale
    generation: u64,
    processing_ticks: u32,
    processing_timeout_ticks: u32,
    connectivity: ConnectivityMonitor,
    capture: Box<dyn CaptureControl>,
    dispatcher: VerificationDispatcher,
    event_bus: EventBus,
    scan_log: Arc<dyn ScanLogSink>,
}

impl KioskController {
    pub fn new(
        config: &KioskConfig,
        capture: Box<dyn CaptureControl>,
        dispatcher: VerificationDispatcher,
        connectivity: ConnectivityMonitor,
        shared_state: SharedKioskState,
        event_bus: EventBus,
        scan_log: Arc<dyn ScanLogSink>,
    ) -> Self {
        shared_state.set(KioskState::CameraOff);
        Self {
            state: KioskState::CameraOff,
            shared_state,
            flow: OcrCaptureFlow::new(),
            timer: DisplayTimer::from_config(&config.display),
            generation: 0,
            processing_ticks: 0,
            processing_timeout_ticks: config
                .display
                .ticks_for_seconds(config.display.processing_timeout_seconds),
            connectivity,
            capture,
            dispatcher,
            event_bus,
            scan_log,
        }
    }

    pub fn state(&self) -> KioskState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity.state()
    }

    pub fn timer(&self) -> &DisplayTimer {
        &self.timer
    }

    pub fn ocr_step(&self) -> OcrCaptureStep {
        self.flow.step()
    }

    /// Apply one message. Returns false once the controller has shut down.
    pub fn handle(&mut self, message: ControllerMessage) -> bool {
        debug!("Controller handling {} in {}", message.kind(), self.state);

        match message {
            ControllerMessage::Operator(command) => self.on_operator(command),
            ControllerMessage::Scan(scan) => self.on_scan(scan),
            ControllerMessage::VerificationCompleted {
                generation,
                outcome,
            } => self.on_verification(generation, outcome),
            ControllerMessage::ProbeCompleted { healthy } => self.on_probe(healthy),
            ControllerMessage::Tick => self.on_tick(),
            ControllerMessage::Touch(signal) => self.on_touch(signal),
            ControllerMessage::Shutdown => {
                self.shutdown();
                return false;
            }
        }
        true
    }

    fn on_operator(&mut self, command: OperatorCommand) {
        match (self.state, command) {
            (KioskState::CameraOff, OperatorCommand::StartScanning) => {
                if self.acquire_camera() {
                    self.transition(KioskState::Idle);
                }
            }
            (KioskState::CameraOff | KioskState::Idle, OperatorCommand::StartLabelScan) => {
                if self.acquire_camera() {
                    self.flow.reset();
                    self.transition(KioskState::OcrCapture);
                    self.publish_ocr_step();
                }
            }
            (KioskState::OcrCapture, OperatorCommand::Capture) => {
                let Some(frame) = self.capture.latest_frame() else {
                    warn!("No camera frame available for label capture");
                    return;
                };
                match self.flow.capture(frame) {
                    Ok(_) => self.publish_ocr_step(),
                    Err(e) => debug!("Label capture ignored: {}", e),
                }
            }
            (KioskState::OcrCapture, OperatorCommand::Retake) => match self.flow.retake() {
                Ok(_) => self.publish_ocr_step(),
                Err(e) => debug!("Retake ignored: {}", e),
            },
            (KioskState::OcrCapture, OperatorCommand::Submit) => match self.flow.submit() {
                Ok(payload) => {
                    self.publish_ocr_step();
                    let generation = self.begin_processing(ScanSource::Ocr);
                    self.dispatcher.dispatch_label(generation, payload);
                    self.flow.reset();
                }
                Err(e) => debug!("Submit rejected: {}", e),
            },
            (KioskState::OcrCapture, OperatorCommand::Cancel) => {
                self.flow.cancel();
                self.transition(KioskState::Idle);
            }
            (state, command) => {
                debug!("Ignoring operator {:?} in {}", command, state);
            }
        }
    }

    fn on_scan(&mut self, scan: ScanEvent) {
        if !self.state.accepts_scans() {
            debug!("Dropping scan received in {}", self.state);
            return;
        }
        info!("Scan accepted ({} characters)", scan.payload.len());
        let generation = self.begin_processing(scan.source);
        self.dispatcher.dispatch_scan(generation, scan.payload);
    }

    fn begin_processing(&mut self, source: ScanSource) -> u64 {
        self.generation += 1;
        self.transition(KioskState::Processing);
        self.event_bus.publish(KioskEvent::ScanAccepted {
            source,
            generation: self.generation,
            timestamp: SystemTime::now(),
        });
        self.generation
    }

    fn on_verification(&mut self, generation: u64, outcome: VerificationOutcome) {
        if self.state != KioskState::Processing || generation != self.generation {
            debug!(
                "Dropping stale {} result (generation {}, current {}, state {})",
                outcome.kind(),
                generation,
                self.generation,
                self.state
            );
            return;
        }

        match ScanLogEntry::from_outcome(&outcome) {
            Ok(entry) => self.scan_log.append(entry),
            Err(e) => error!("Failed to serialize scan log entry: {}", e),
        }

        match outcome {
            VerificationOutcome::Certificate(result) => {
                self.show_result(KioskState::DisplayCertificate);
                self.event_bus.publish(KioskEvent::CertificateReady {
                    result: Arc::new(result),
                });
            }
            VerificationOutcome::Product(result) => {
                self.show_result(KioskState::DisplayProduct);
                self.event_bus.publish(KioskEvent::ProductReady {
                    result: Arc::new(result),
                });
            }
            VerificationOutcome::Compliance(result) => {
                self.show_result(KioskState::DisplayCompliance);
                self.event_bus.publish(KioskEvent::ComplianceReady {
                    result: Arc::new(result),
                });
            }
            VerificationOutcome::Failed(failure) => {
                self.show_error(failure.user_message(), false);
            }
        }
    }

    fn show_result(&mut self, state: KioskState) {
        self.transition(state);
        self.timer.start(CountdownKind::Result);
    }

    fn show_error(&mut self, message: String, persistent: bool) {
        self.transition(KioskState::Error);
        if persistent {
            self.timer.cancel();
        } else {
            self.timer.start(CountdownKind::Error);
        }
        self.event_bus
            .publish(KioskEvent::ErrorShown { message, persistent });
    }

    fn on_tick(&mut self) {
        match self.timer.tick() {
            TimerTick::Running { remaining } => {
                self.event_bus.publish(KioskEvent::CountdownTick {
                    remaining_seconds: self.timer.ticks_to_seconds(remaining),
                });
            }
            TimerTick::Expired(kind) => {
                if self.state.is_display() || self.state == KioskState::Error {
                    debug!("{:?} countdown expired", kind);
                    self.transition(KioskState::Idle);
                }
            }
            TimerTick::Paused { .. } | TimerTick::Inactive => {}
        }

        if self.state == KioskState::Processing {
            self.processing_ticks += 1;
            if self.processing_ticks >= self.processing_timeout_ticks {
                warn!(
                    "No verification result for generation {}, giving up",
                    self.generation
                );
                // Abandon the in-flight request so a late result is dropped
                self.generation += 1;
                self.show_error(PROCESSING_TIMEOUT_MESSAGE.to_string(), false);
            }
        }
    }

    fn on_touch(&mut self, signal: TouchSignal) {
        let changed = match signal {
            TouchSignal::Pressed => self.timer.pause(),
            TouchSignal::Released => self.timer.resume(),
        };
        if !changed {
            return;
        }

        let remaining_seconds = self.timer.remaining_seconds();
        let event = match signal {
            TouchSignal::Pressed => KioskEvent::CountdownPaused { remaining_seconds },
            TouchSignal::Released => KioskEvent::CountdownResumed { remaining_seconds },
        };
        self.event_bus.publish(event);
    }

    fn on_probe(&mut self, healthy: bool) {
        let before = self.connectivity.state();
        let signal = self
            .connectivity
            .record_probe(healthy, self.state == KioskState::Maintenance);
        let after = self.connectivity.state();

        if before.online != after.online {
            self.event_bus.publish(KioskEvent::ConnectivityChanged {
                online: after.online,
                consecutive_failures: after.consecutive_failures,
            });
        }

        match signal {
            ConnectivitySignal::EnterMaintenance => self.enter_maintenance(),
            ConnectivitySignal::Recovered => self.leave_maintenance(),
            ConnectivitySignal::None => {}
        }
    }

    fn enter_maintenance(&mut self) {
        let failures = self.connectivity.state().consecutive_failures;
        warn!(
            "Entering maintenance mode from {} after {} failed health checks",
            self.state, failures
        );

        self.timer.cancel();
        self.flow.reset();
        // Anything in flight belongs to the abandoned session
        self.generation += 1;
        self.capture.stop();
        self.transition(KioskState::Maintenance);
        self.event_bus.publish(KioskEvent::MaintenanceEntered {
            consecutive_failures: failures,
            timestamp: SystemTime::now(),
        });
    }

    fn leave_maintenance(&mut self) {
        info!("Verification service reachable, leaving maintenance mode");
        self.event_bus.publish(KioskEvent::MaintenanceExited {
            timestamp: SystemTime::now(),
        });
        if self.acquire_camera() {
            self.transition(KioskState::Idle);
        }
    }

    /// Start the capture loop, or show a persistent error when no camera
    /// can be opened
    fn acquire_camera(&mut self) -> bool {
        match self.capture.start() {
            Ok(()) => true,
            Err(e) => {
                error!("Camera unavailable: {}", e);
                self.show_error(format!("Camera unavailable: {}", e), true);
                false
            }
        }
    }

    fn publish_ocr_step(&self) {
        self.event_bus.publish(KioskEvent::OcrStepChanged {
            step: self.flow.step(),
        });
    }

    fn transition(&mut self, to: KioskState) {
        let from = self.state;
        if from == to {
            return;
        }
        if from == KioskState::Processing {
            self.processing_ticks = 0;
        }
        if to == KioskState::Idle {
            self.timer.cancel();
        }

        self.state = to;
        self.shared_state.set(to);
        self.event_bus.publish(KioskEvent::StateChanged {
            from,
            to,
            timestamp: SystemTime::now(),
        });
    }

    fn shutdown(&mut self) {
        info!("Controller shutting down from {}", self.state);
        self.timer.cancel();
        self.capture.stop();
        self.event_bus.publish(KioskEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: "controller stopped".to_string(),
        });
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: KioskState) {
        self.state = state;
        self.shared_state.set(state);
    }
}

use super::debounce::ScanDebouncer;
use super::device::{CameraDevice, CameraOpener, SymbolDecoder};
use crate::config::{CameraConfig, ScanConfig};
use crate::error::CameraError;
use crate::events::{ControllerMessage, EventBus, KioskEvent, ScanEvent};
use crate::frame::FrameData;
use crate::state::SharedKioskState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, trace, warn};

/// Camera lifecycle as seen by the controller
pub trait CaptureControl: Send {
    /// Acquire a camera and start the capture loop. No-op while running.
    fn start(&mut self) -> Result<(), CameraError>;

    /// Stop the loop and release the camera
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Most recent frame, used by the label capture flow
    fn latest_frame(&self) -> Option<FrameData>;
}

/// State shared between [`ScanCapture`] and its capture thread
struct LoopShared {
    running: AtomicBool,
    frame_counter: AtomicU64,
    latest: Mutex<Option<FrameData>>,
    debouncer: Mutex<ScanDebouncer>,
    decoder: Mutex<Box<dyn SymbolDecoder>>,
}

/// Owns the camera and runs the continuous acquire/decode loop on a
/// dedicated thread, forwarding debounced scans to the controller.
pub struct ScanCapture {
    config: CameraConfig,
    opener: Arc<dyn CameraOpener>,
    state: SharedKioskState,
    scans: mpsc::Sender<ControllerMessage>,
    event_bus: EventBus,
    shared: Arc<LoopShared>,
    worker: Option<JoinHandle<()>>,
}

impl ScanCapture {
    pub fn new(
        camera: &CameraConfig,
        scan: &ScanConfig,
        opener: Arc<dyn CameraOpener>,
        decoder: Box<dyn SymbolDecoder>,
        state: SharedKioskState,
        scans: mpsc::Sender<ControllerMessage>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            config: camera.clone(),
            opener,
            state,
            scans,
            event_bus,
            shared: Arc::new(LoopShared {
                running: AtomicBool::new(false),
                frame_counter: AtomicU64::new(0),
                latest: Mutex::new(None),
                debouncer: Mutex::new(ScanDebouncer::new(scan.cooldown())),
                decoder: Mutex::new(decoder),
            }),
            worker: None,
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.shared.frame_counter.load(Ordering::Relaxed)
    }

    fn open_first_device(&self) -> Result<Box<dyn CameraDevice>, CameraError> {
        for &index in &self.config.device_indices {
            match self.opener.open(index, &self.config) {
                Ok(device) => {
                    info!("Opened camera device {}", index);
                    return Ok(device);
                }
                Err(e) => debug!("Camera device {} unavailable: {}", index, e),
            }
        }
        Err(CameraError::NoDevice {
            tried: self.config.device_indices.clone(),
        })
    }
}

impl CaptureControl for ScanCapture {
    fn start(&mut self) -> Result<(), CameraError> {
        if self.shared.running.load(Ordering::Acquire) {
            warn!("Scan capture is already running");
            return Ok(());
        }
        // Reap a loop that exited on its own
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        let device = self.open_first_device()?;
        self.shared.running.store(true, Ordering::Release);

        let context = LoopContext {
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            state: self.state.clone(),
            scans: self.scans.clone(),
            event_bus: self.event_bus.clone(),
        };

        let worker = std::thread::Builder::new()
            .name("scan-capture".to_string())
            .spawn(move || context.run(device))
            .map_err(|e| {
                self.shared.running.store(false, Ordering::Release);
                CameraError::Configuration {
                    details: format!("failed to spawn capture thread: {}", e),
                }
            })?;
        self.worker = Some(worker);

        info!("Scan capture started");
        Ok(())
    }

    fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Scan capture thread panicked");
            }
            info!("Scan capture stopped, camera released");
        }
        *self.shared.latest.lock() = None;
    }

    fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    fn latest_frame(&self) -> Option<FrameData> {
        self.shared.latest.lock().clone()
    }
}

impl Drop for ScanCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LoopContext {
    config: CameraConfig,
    shared: Arc<LoopShared>,
    state: SharedKioskState,
    scans: mpsc::Sender<ControllerMessage>,
    event_bus: EventBus,
}

impl LoopContext {
    fn run(self, mut device: Box<dyn CameraDevice>) {
        let interval = self.config.frame_interval();
        let preview_every = u64::from(self.config.preview_every_n_frames.max(1));
        info!("Capture loop started on device {}", device.index());

        while self.shared.running.load(Ordering::Acquire) {
            let started = Instant::now();

            match device.read_frame() {
                Ok(frame) => {
                    let n = self.shared.frame_counter.fetch_add(1, Ordering::Relaxed) + 1;
                    *self.shared.latest.lock() = Some(frame.clone());

                    if n % preview_every == 0 {
                        self.event_bus
                            .publish(KioskEvent::PreviewFrame { frame: frame.clone() });
                    }

                    if self.state.get().accepts_scans() && !self.decode_and_forward(&frame) {
                        break;
                    }
                }
                Err(e) => trace!("Transient frame read failure: {}", e),
            }

            if let Some(rest) = interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }

        self.shared.running.store(false, Ordering::Release);
        info!("Capture loop stopped on device {}", device.index());
    }

    /// Returns false once the controller queue is gone
    fn decode_and_forward(&self, frame: &FrameData) -> bool {
        let symbols = self.shared.decoder.lock().decode(frame);
        let Some(payload) = symbols
            .iter()
            .map(|s| s.payload.trim())
            .find(|p| !p.is_empty())
        else {
            return true;
        };

        if !self.shared.debouncer.lock().accept(payload, Instant::now()) {
            trace!("Suppressed repeated scan");
            return true;
        }

        match self.scans.try_send(ControllerMessage::Scan(ScanEvent::qr(payload))) {
            Ok(()) => {
                debug!("Forwarded scan from frame {}", frame.id);
                true
            }
            Err(TrySendError::Full(_)) => {
                // Let the same code through again on the next frame
                warn!("Controller queue full, dropping scan");
                self.shared.debouncer.lock().reset();
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Controller queue closed, stopping capture loop");
                false
            }
        }
    }
}

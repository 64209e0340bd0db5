use crate::config::DisplayConfig;
use crate::error::{KioskError, Result};
use crate::events::{ControllerMessage, TouchSignal};
use evdev::{Device, EventType, InputEvent, InputEventKind, Key};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const MAX_RETRIES: u32 = 10;
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Forwards press and release of the touch screen to the controller
pub struct TouchInputHandler {
    device_path: String,
    messages: mpsc::Sender<ControllerMessage>,
    retry_delay: Duration,
}

impl TouchInputHandler {
    pub fn new(config: &DisplayConfig, messages: mpsc::Sender<ControllerMessage>) -> Self {
        Self {
            device_path: config.touch_device.clone(),
            messages,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Monitor the device on the blocking pool, reopening it with backoff
    /// after failures
    pub fn start(&self, cancel: CancellationToken) {
        info!("Starting touch input handler for device: {}", self.device_path);

        let device_path = self.device_path.clone();
        let messages = self.messages.clone();
        let retry_delay = self.retry_delay;

        tokio::task::spawn_blocking(move || {
            let mut retry_count = 0;

            while !cancel.is_cancelled() {
                match monitor_touch_device(&device_path, &messages, &cancel) {
                    Ok(()) => {
                        info!("Touch device monitoring ended");
                        break;
                    }
                    Err(e) => {
                        retry_count += 1;
                        error!("Touch device error ({}/{}): {}", retry_count, MAX_RETRIES, e);
                        if retry_count >= MAX_RETRIES {
                            error!("Touch input disabled after {} attempts", MAX_RETRIES);
                            break;
                        }

                        let delay = retry_delay * 2_u32.pow(retry_count.min(5));
                        warn!("Retrying touch device in {:?}", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        });
    }
}

fn monitor_touch_device(
    device_path: &str,
    messages: &mpsc::Sender<ControllerMessage>,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut device = Device::open(device_path).map_err(|e| {
        let reason = match e.kind() {
            std::io::ErrorKind::NotFound => "device not found".to_string(),
            std::io::ErrorKind::PermissionDenied => "permission denied".to_string(),
            _ => e.to_string(),
        };
        KioskError::component("touch_input", format!("{}: {}", device_path, reason))
    })?;

    info!(
        "Touch device opened: {} ({})",
        device_path,
        device.name().unwrap_or("Unknown")
    );
    validate_touch_device(&device, device_path)?;

    let mut consecutive_errors = 0;
    while !cancel.is_cancelled() {
        match device.fetch_events() {
            Ok(events) => {
                consecutive_errors = 0;
                for event in events {
                    let Some(signal) = touch_signal(&event) else {
                        continue;
                    };
                    debug!("Touch {:?}", signal);
                    if messages
                        .blocking_send(ControllerMessage::Touch(signal))
                        .is_err()
                    {
                        return Ok(());
                    }
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(KioskError::component(
                        "touch_input",
                        format!("Too many consecutive read errors: {}", e),
                    ));
                }
                warn!("Error reading touch device (attempt {}): {}", consecutive_errors, e);
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
    Ok(())
}

fn validate_touch_device(device: &Device, device_path: &str) -> Result<()> {
    if !device.supported_events().contains(EventType::KEY) {
        return Err(KioskError::component(
            "touch_input",
            format!("{} does not report key events", device_path),
        ));
    }

    if let Some(keys) = device.supported_keys() {
        if !(keys.contains(Key::BTN_TOUCH) || keys.contains(Key::BTN_LEFT)) {
            warn!("Device {} has no touch keys, monitoring anyway", device_path);
        }
    }
    Ok(())
}

/// Press (value 1) and release (value 0) of a touch key; repeats are ignored
pub(crate) fn touch_signal(event: &InputEvent) -> Option<TouchSignal> {
    match event.kind() {
        InputEventKind::Key(Key::BTN_TOUCH | Key::BTN_LEFT) => match event.value() {
            1 => Some(TouchSignal::Pressed),
            0 => Some(TouchSignal::Released),
            _ => None,
        },
        _ => None,
    }
}

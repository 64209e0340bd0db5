use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct KioskConfig {
    pub camera: CameraConfig,
    pub scan: ScanConfig,
    pub backend: BackendConfig,
    pub display: DisplayConfig,
    pub connectivity: ConnectivityConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Device indices tried in order when acquiring the camera (-1 = any)
    #[serde(default = "default_device_indices")]
    pub device_indices: Vec<i32>,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Target frames per second of the capture loop
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Hand every Nth frame to the display collaborator
    #[serde(default = "default_preview_every_n_frames")]
    pub preview_every_n_frames: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScanConfig {
    /// Identical payloads inside this window are suppressed
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,

    /// Prefixes that identify a bare certificate ID payload
    #[serde(default = "default_certificate_prefixes")]
    pub certificate_prefixes: Vec<String>,

    /// Run the QR decoder on every Nth frame (1 = every frame)
    #[serde(default = "default_decode_every_n_frames")]
    pub decode_every_n_frames: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    /// Verification API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for a single verification request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Timeout for a single health probe
    #[serde(default = "default_health_timeout")]
    pub health_timeout_seconds: u64,

    /// Confirm that a resolved certificate document actually exists before
    /// granting `pending` status to a certificate missing from the ledger
    #[serde(default = "default_require_document_check")]
    pub require_document_check: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DisplayConfig {
    /// How long verification results stay on screen
    #[serde(default = "default_result_seconds")]
    pub result_seconds: u32,

    /// How long error screens stay on screen
    #[serde(default = "default_error_seconds")]
    pub error_seconds: u32,

    /// Countdown tick granularity in milliseconds
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,

    /// Processing gives up after this long without a verification result
    #[serde(default = "default_processing_timeout")]
    pub processing_timeout_seconds: u32,

    /// evdev touch device; sustained touch pauses the result countdown
    #[serde(default = "default_touch_device")]
    pub touch_device: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConnectivityConfig {
    /// Consecutive failed probes that force maintenance mode
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Probe interval while online
    #[serde(default = "default_online_poll")]
    pub online_poll_seconds: u64,

    /// Probe interval while in maintenance
    #[serde(default = "default_maintenance_poll")]
    pub maintenance_poll_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Directory holding the scan log
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Scan log keeps only the most recent entries
    #[serde(default = "default_scan_log_capacity")]
    pub scan_log_capacity: usize,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Inbound controller queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Separator placed between front and back label text
    #[serde(default = "default_label_separator")]
    pub label_separator: String,
}

impl KioskConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("verikiosk.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "camera.device_indices",
                default_device_indices()
                    .into_iter()
                    .map(i64::from)
                    .collect::<Vec<_>>(),
            )?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default(
                "camera.preview_every_n_frames",
                default_preview_every_n_frames(),
            )?
            .set_default("scan.cooldown_seconds", default_cooldown_seconds())?
            .set_default("scan.certificate_prefixes", default_certificate_prefixes())?
            .set_default(
                "scan.decode_every_n_frames",
                default_decode_every_n_frames(),
            )?
            .set_default("backend.base_url", default_base_url())?
            .set_default("backend.request_timeout_seconds", default_request_timeout())?
            .set_default("backend.health_timeout_seconds", default_health_timeout())?
            .set_default(
                "backend.require_document_check",
                default_require_document_check(),
            )?
            .set_default("display.result_seconds", default_result_seconds())?
            .set_default("display.error_seconds", default_error_seconds())?
            .set_default("display.tick_millis", default_tick_millis())?
            .set_default(
                "display.processing_timeout_seconds",
                default_processing_timeout(),
            )?
            .set_default("display.touch_device", default_touch_device())?
            .set_default(
                "connectivity.failure_threshold",
                default_failure_threshold(),
            )?
            .set_default("connectivity.online_poll_seconds", default_online_poll())?
            .set_default(
                "connectivity.maintenance_poll_seconds",
                default_maintenance_poll(),
            )?
            .set_default("system.data_dir", default_data_dir())?
            .set_default(
                "system.scan_log_capacity",
                default_scan_log_capacity() as i64,
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.queue_capacity", default_queue_capacity() as i64)?
            .set_default("system.label_separator", default_label_separator())?
            .add_source(File::with_name(&path_str).required(false))
            // VERIKIOSK_BACKEND__BASE_URL overrides backend.base_url
            .add_source(
                Environment::with_prefix("VERIKIOSK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: KioskConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.device_indices.is_empty() {
            return Err(ConfigError::Message(
                "At least one camera device index must be configured".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.camera.preview_every_n_frames == 0 {
            return Err(ConfigError::Message(
                "Camera preview_every_n_frames must be greater than 0".to_string(),
            ));
        }

        if !self.scan.cooldown_seconds.is_finite() || self.scan.cooldown_seconds < 0.0 {
            return Err(ConfigError::Message(
                "Scan cooldown_seconds must be a non-negative number".to_string(),
            ));
        }

        if self.scan.decode_every_n_frames == 0 {
            return Err(ConfigError::Message(
                "Scan decode_every_n_frames must be greater than 0".to_string(),
            ));
        }

        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::Message(
                "Backend base_url must not be empty".to_string(),
            ));
        }

        if self.backend.request_timeout_seconds == 0 || self.backend.health_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Backend timeouts must be greater than 0".to_string(),
            ));
        }

        if self.display.result_seconds == 0 || self.display.error_seconds == 0 {
            return Err(ConfigError::Message(
                "Display durations must be greater than 0".to_string(),
            ));
        }

        if self.display.tick_millis == 0 {
            return Err(ConfigError::Message(
                "Display tick_millis must be greater than 0".to_string(),
            ));
        }

        if self.display.processing_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Display processing_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.connectivity.failure_threshold == 0 {
            return Err(ConfigError::Message(
                "Connectivity failure_threshold must be greater than 0".to_string(),
            ));
        }

        if self.connectivity.online_poll_seconds == 0
            || self.connectivity.maintenance_poll_seconds == 0
        {
            return Err(ConfigError::Message(
                "Connectivity poll intervals must be greater than 0".to_string(),
            ));
        }

        if self.system.scan_log_capacity == 0 {
            return Err(ConfigError::Message(
                "Scan log capacity must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 || self.system.queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus and queue capacities must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl ScanConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_seconds)
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_seconds)
    }
}

impl DisplayConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    /// Convert a duration in seconds into countdown ticks (at least one)
    pub fn ticks_for_seconds(&self, seconds: u32) -> u32 {
        let ticks = (u64::from(seconds) * 1000) / self.tick_millis.max(1);
        ticks.clamp(1, u64::from(u32::MAX)) as u32
    }
}

impl ConnectivityConfig {
    pub fn online_poll(&self) -> Duration {
        Duration::from_secs(self.online_poll_seconds)
    }

    pub fn maintenance_poll(&self) -> Duration {
        Duration::from_secs(self.maintenance_poll_seconds)
    }
}

impl CameraConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.fps.max(1)))
    }
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                device_indices: default_device_indices(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                preview_every_n_frames: default_preview_every_n_frames(),
            },
            scan: ScanConfig {
                cooldown_seconds: default_cooldown_seconds(),
                certificate_prefixes: default_certificate_prefixes(),
                decode_every_n_frames: default_decode_every_n_frames(),
            },
            backend: BackendConfig {
                base_url: default_base_url(),
                request_timeout_seconds: default_request_timeout(),
                health_timeout_seconds: default_health_timeout(),
                require_document_check: default_require_document_check(),
            },
            display: DisplayConfig {
                result_seconds: default_result_seconds(),
                error_seconds: default_error_seconds(),
                tick_millis: default_tick_millis(),
                processing_timeout_seconds: default_processing_timeout(),
                touch_device: default_touch_device(),
            },
            connectivity: ConnectivityConfig {
                failure_threshold: default_failure_threshold(),
                online_poll_seconds: default_online_poll(),
                maintenance_poll_seconds: default_maintenance_poll(),
            },
            system: SystemConfig {
                data_dir: default_data_dir(),
                scan_log_capacity: default_scan_log_capacity(),
                event_bus_capacity: default_event_bus_capacity(),
                queue_capacity: default_queue_capacity(),
                label_separator: default_label_separator(),
            },
        }
    }
}

// Default value functions
fn default_device_indices() -> Vec<i32> {
    vec![0, 1, 2, -1]
}
fn default_camera_resolution() -> (u32, u32) {
    (1280, 720)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_preview_every_n_frames() -> u32 {
    3
}

fn default_cooldown_seconds() -> f64 {
    2.0
}
fn default_certificate_prefixes() -> Vec<String> {
    vec!["CERT-COMP-".to_string(), "CERT-PROD-".to_string()]
}

fn default_decode_every_n_frames() -> u32 {
    1
}

fn default_base_url() -> String {
    "http://localhost:3000/api/v1".to_string()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_health_timeout() -> u64 {
    5
}
fn default_require_document_check() -> bool {
    true
}

fn default_result_seconds() -> u32 {
    20
}
fn default_error_seconds() -> u32 {
    5
}
fn default_tick_millis() -> u64 {
    1000
}
fn default_processing_timeout() -> u32 {
    100
}

fn default_touch_device() -> String {
    "/dev/input/event0".to_string()
}

fn default_failure_threshold() -> u32 {
    3
}
fn default_online_poll() -> u64 {
    30
}
fn default_maintenance_poll() -> u64 {
    5
}

fn default_data_dir() -> String {
    "./kiosk_data".to_string()
}
fn default_scan_log_capacity() -> usize {
    1000
}
fn default_event_bus_capacity() -> usize {
    100
}
fn default_queue_capacity() -> usize {
    64
}
fn default_label_separator() -> String {
    "\n".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = KioskConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.scan.cooldown(), Duration::from_secs(2));
        assert_eq!(config.connectivity.failure_threshold, 3);
        assert!(config.display.error_seconds < config.display.result_seconds);
    }

    #[test]
    fn test_config_validation() {
        let mut config = KioskConfig::default();
        config.camera.device_indices.clear();
        assert!(config.validate().is_err());

        config.camera.device_indices = vec![0];
        assert!(config.validate().is_ok());

        config.connectivity.failure_threshold = 0;
        assert!(config.validate().is_err());
        config.connectivity.failure_threshold = 3;

        config.scan.cooldown_seconds = -1.0;
        assert!(config.validate().is_err());
        config.scan.cooldown_seconds = 2.0;

        config.scan.decode_every_n_frames = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_decode_rate_is_independent_of_preview_rate() {
        let config = KioskConfig::default();
        assert_eq!(config.scan.decode_every_n_frames, 1);
        assert!(config.camera.preview_every_n_frames > 1);
    }

    #[test]
    fn test_ticks_for_seconds() {
        let mut display = KioskConfig::default().display;
        assert_eq!(display.ticks_for_seconds(20), 20);

        display.tick_millis = 250;
        assert_eq!(display.ticks_for_seconds(5), 20);

        display.tick_millis = 10_000;
        assert_eq!(display.ticks_for_seconds(1), 1);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[backend]\nbase_url = \"http://kiosk-api.local/api/v1\"\n\n[display]\nerror_seconds = 7"
        )
        .unwrap();

        let config = KioskConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.backend.base_url, "http://kiosk-api.local/api/v1");
        assert_eq!(config.display.error_seconds, 7);
        assert_eq!(config.display.result_seconds, 20);
        assert_eq!(config.camera.device_indices, vec![0, 1, 2, -1]);
    }

    #[test]
    fn test_default_config_serializes_to_toml() {
        let rendered = toml::to_string_pretty(&KioskConfig::default()).unwrap();
        assert!(rendered.contains("[connectivity]"));
        assert!(rendered.contains("failure_threshold = 3"));
    }
}

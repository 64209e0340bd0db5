use super::*;
use crate::config::{CameraConfig, KioskConfig, ScanConfig};
use crate::error::CameraError;
use crate::events::{ControllerMessage, EventBus, KioskEvent};
use crate::state::{KioskState, SharedKioskState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

fn create_test_camera_config() -> CameraConfig {
    CameraConfig {
        device_indices: vec![0, 1, 2, -1],
        resolution: (320, 240),
        fps: 100,
        preview_every_n_frames: 2,
    }
}

fn create_test_scan_config() -> ScanConfig {
    KioskConfig::default().scan
}

struct Harness {
    capture: ScanCapture,
    script: ScanScript,
    state: SharedKioskState,
    bus: EventBus,
    rx: mpsc::Receiver<ControllerMessage>,
}

fn harness(opener: SyntheticCameraOpener, initial: KioskState) -> Harness {
    let (tx, rx) = mpsc::channel(16);
    let script = ScanScript::new();
    let state = SharedKioskState::new(initial);
    let bus = EventBus::new(64);
    let capture = ScanCapture::new(
        &create_test_camera_config(),
        &create_test_scan_config(),
        Arc::new(opener),
        Box::new(ScriptedDecoder::new(script.clone())),
        state.clone(),
        tx,
        bus.clone(),
    );
    Harness {
        capture,
        script,
        state,
        bus,
        rx,
    }
}

async fn next_scan(rx: &mut mpsc::Receiver<ControllerMessage>) -> Option<String> {
    match timeout(Duration::from_millis(500), rx.recv()).await {
        Ok(Some(ControllerMessage::Scan(scan))) => Some(scan.payload),
        _ => None,
    }
}

#[test]
fn test_start_fails_without_any_device() {
    let mut h = harness(SyntheticCameraOpener::with_devices(vec![]), KioskState::Idle);

    assert_eq!(
        h.capture.start().unwrap_err(),
        CameraError::NoDevice {
            tried: vec![0, 1, 2, -1]
        }
    );
    assert!(!h.capture.is_running());
}

#[test]
fn test_start_falls_through_device_list() {
    let mut h = harness(SyntheticCameraOpener::with_devices(vec![-1]), KioskState::Idle);

    h.capture.start().unwrap();
    assert!(h.capture.is_running());
    // Re-entrant start is a no-op
    h.capture.start().unwrap();
    assert!(h.capture.is_running());

    h.capture.stop();
    assert!(!h.capture.is_running());
    assert!(h.capture.latest_frame().is_none());
}

#[tokio::test]
async fn test_held_code_is_emitted_once() {
    let mut h = harness(SyntheticCameraOpener::new(), KioskState::Idle);
    h.script.show("CERT-COMP-1", 20);
    h.capture.start().unwrap();

    assert_eq!(next_scan(&mut h.rx).await.as_deref(), Some("CERT-COMP-1"));
    assert_eq!(next_scan(&mut h.rx).await, None);

    h.capture.stop();
}

#[tokio::test]
async fn test_different_codes_both_emitted() {
    let mut h = harness(SyntheticCameraOpener::new(), KioskState::Idle);
    h.script.show("CERT-COMP-1", 1);
    h.script.show("CERT-PROD-2", 1);
    h.capture.start().unwrap();

    assert_eq!(next_scan(&mut h.rx).await.as_deref(), Some("CERT-COMP-1"));
    assert_eq!(next_scan(&mut h.rx).await.as_deref(), Some("CERT-PROD-2"));

    h.capture.stop();
}

#[tokio::test]
async fn test_scans_ignored_outside_idle() {
    let mut h = harness(SyntheticCameraOpener::new(), KioskState::Processing);
    h.script.show("CERT-COMP-1", 1);
    h.capture.start().unwrap();

    assert_eq!(next_scan(&mut h.rx).await, None);
    // The code was never decoded, so it is still waiting in the script
    assert_eq!(h.script.pending(), 1);

    h.state.set(KioskState::Idle);
    assert_eq!(next_scan(&mut h.rx).await.as_deref(), Some("CERT-COMP-1"));

    h.capture.stop();
}

#[tokio::test]
async fn test_preview_frames_published_every_nth_frame() {
    let mut h = harness(SyntheticCameraOpener::new(), KioskState::CameraOff);
    let mut events = h.bus.subscribe();
    h.capture.start().unwrap();

    let mut ids = Vec::new();
    while ids.len() < 3 {
        match timeout(Duration::from_millis(500), events.recv()).await {
            Ok(Ok(KioskEvent::PreviewFrame { frame })) => ids.push(frame.id),
            Ok(Ok(_)) => {}
            other => panic!("no preview frame: {:?}", other.is_err()),
        }
    }
    h.capture.stop();

    assert!(ids.iter().all(|id| id % 2 == 0), "ids: {:?}", ids);
    assert!(h.capture.frame_count() >= 6);
}

#[tokio::test]
async fn test_read_failures_are_transient() {
    let mut h = harness(
        SyntheticCameraOpener::new().failing_every(2),
        KioskState::Idle,
    );
    h.script.show("CERT-PROD-3", 1);
    h.capture.start().unwrap();

    assert_eq!(next_scan(&mut h.rx).await.as_deref(), Some("CERT-PROD-3"));
    assert!(h.capture.is_running());
    assert!(h.capture.latest_frame().is_some());

    h.capture.stop();
}

#[tokio::test]
async fn test_loop_exits_when_controller_gone() {
    let mut h = harness(SyntheticCameraOpener::new(), KioskState::Idle);
    h.script.show("CERT-PROD-4", 1);
    let Harness {
        mut capture, rx, ..
    } = h;
    drop(rx);
    capture.start().unwrap();

    let mut stopped = false;
    for _ in 0..50 {
        if !capture.is_running() {
            stopped = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(stopped);

    // A stopped loop can be restarted
    let _ = capture.start();
    capture.stop();
}

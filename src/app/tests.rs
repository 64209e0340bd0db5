use super::*;
use crate::capture::{ScanScript, ScriptedDecoder, SyntheticCameraOpener};
use crate::config::KioskConfig;
use crate::events::{EventFilter, EventReceiver, KioskEvent};
use crate::ocr::ScriptedTextExtractor;
use crate::scanlog::{load_entries, SCAN_LOG_FILE};
use crate::state::KioskState;
use crate::verify::mock::MockBackend;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

fn create_test_config(data_dir: &TempDir) -> KioskConfig {
    let mut config = KioskConfig::default();
    config.camera.fps = 50;
    config.display.tick_millis = 50;
    config.backend.request_timeout_seconds = 1;
    config.backend.health_timeout_seconds = 1;
    config.system.data_dir = data_dir.path().to_string_lossy().to_string();
    config
}

fn orchestrator(
    config: KioskConfig,
    backend: Arc<MockBackend>,
    script: &ScanScript,
) -> KioskOrchestrator {
    KioskOrchestrator::new(
        config,
        backend,
        Arc::new(ScriptedTextExtractor::default()),
        CameraSetup {
            opener: Arc::new(SyntheticCameraOpener::new()),
            decoder: Box::new(ScriptedDecoder::new(script.clone())),
        },
    )
    .unwrap()
}

async fn wait_for_state(orchestrator: &KioskOrchestrator, state: KioskState) {
    let shared = orchestrator.shared_state();
    timeout(Duration::from_secs(3), async {
        while shared.get() != state {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("kiosk never reached {}, stuck in {}", state, shared.get()));
}

#[tokio::test]
async fn test_orchestrator_creation() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator(
        create_test_config(&dir),
        Arc::new(MockBackend::new()),
        &ScanScript::new(),
    );

    assert!(orchestrator.get_all_component_states().await.is_empty());
    assert_eq!(orchestrator.shared_state().get(), KioskState::CameraOff);
}

#[tokio::test]
async fn test_initialize_registers_components() {
    let dir = TempDir::new().unwrap();
    let mut orchestrator = orchestrator(
        create_test_config(&dir),
        Arc::new(MockBackend::new()),
        &ScanScript::new(),
    );
    orchestrator.set_keyboard_enabled(true);
    orchestrator.initialize().await.unwrap();

    for component in ["presenter", "controller", "prober", "keyboard"] {
        assert_eq!(
            orchestrator.get_component_state(component).await,
            Some(ComponentState::Stopped),
            "{}",
            component
        );
    }
}

#[tokio::test]
async fn test_start_twice_fails() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.on_health(Ok(true));
    let mut orchestrator = orchestrator(create_test_config(&dir), backend, &ScanScript::new());

    orchestrator.start().await.unwrap();
    assert!(orchestrator.start().await.is_err());
    assert_eq!(orchestrator.shutdown().await.unwrap(), 0);
}

#[tokio::test]
async fn test_scan_end_to_end() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new());
    backend.on_health(Ok(true));
    backend.on_certificate(json!({
        "success": true,
        "certificate": {"certificateId": "CERT-COMP-5", "entityName": "Acme"}
    }));
    backend.on_pdf(json!({"success": true, "certificate": {"pdfUrl": "https://docs/5.pdf"}}));

    let script = ScanScript::new();
    let mut orchestrator = orchestrator(create_test_config(&dir), backend, &script);
    let mut results = EventReceiver::new(
        orchestrator.event_bus().subscribe(),
        EventFilter::EventTypes(vec!["certificate_ready"]),
        "test",
    );
    orchestrator.set_auto_start(true);
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    wait_for_state(&orchestrator, KioskState::Idle).await;
    script.show("CERT-COMP-5", 3);

    match timeout(Duration::from_secs(3), results.recv()).await {
        Ok(Ok(KioskEvent::CertificateReady { result })) => {
            assert_eq!(result.certificate_id, "CERT-COMP-5");
            assert_eq!(result.document_url.as_deref(), Some("https://docs/5.pdf"));
        }
        other => panic!("no certificate result: {:?}", other.map(|r| r.is_ok())),
    }
    assert_eq!(
        orchestrator.shared_state().get(),
        KioskState::DisplayCertificate
    );

    orchestrator
        .request_shutdown(ShutdownReason::UserRequest)
        .await;
    assert_eq!(orchestrator.run().await.unwrap(), 0);
    assert_eq!(
        orchestrator.get_component_state("controller").await,
        Some(ComponentState::Stopped)
    );

    // The scan log is written on the blocking pool
    let path = dir.path().join(SCAN_LOG_FILE);
    let mut logged = Vec::new();
    for _ in 0..50 {
        logged = load_entries(&path).unwrap_or_default();
        if !logged.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].kind, "certificate");
}

#[tokio::test]
async fn test_unreachable_backend_enters_maintenance() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    // Probe continuously so three failures arrive quickly
    config.connectivity.online_poll_seconds = 0;
    config.connectivity.maintenance_poll_seconds = 0;

    let mut orchestrator = orchestrator(config, Arc::new(MockBackend::new()), &ScanScript::new());
    orchestrator.set_auto_start(true);
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    wait_for_state(&orchestrator, KioskState::Maintenance).await;
    assert_eq!(orchestrator.shutdown().await.unwrap(), 0);
}

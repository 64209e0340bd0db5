use super::*;
use crate::config::KioskConfig;
use crate::events::{EventBus, KioskEvent};
use crate::ocr::OcrCaptureStep;
use crate::state::KioskState;
use crate::verify::{CertificateResult, CertificateStatus, ProductResult, SchemaVersion};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

fn create_test_timer() -> DisplayTimer {
    DisplayTimer::new(30, 5, Duration::from_secs(1))
}

#[test]
fn test_inactive_timer_ticks_nothing() {
    let mut timer = create_test_timer();
    assert_eq!(timer.tick(), TimerTick::Inactive);
    assert!(!timer.pause());
    assert!(!timer.resume());
    assert_eq!(timer.remaining_seconds(), 0);
}

#[test]
fn test_error_countdown_expires_once() {
    let mut timer = create_test_timer();
    timer.start(CountdownKind::Error);

    for expected in (1..5).rev() {
        assert_eq!(timer.tick(), TimerTick::Running { remaining: expected });
    }
    assert_eq!(timer.tick(), TimerTick::Expired(CountdownKind::Error));
    assert_eq!(timer.tick(), TimerTick::Inactive);
}

#[test]
fn test_pause_keeps_remaining_count() {
    let mut timer = create_test_timer();
    timer.start(CountdownKind::Result);

    for _ in 0..10 {
        timer.tick();
    }
    assert_eq!(timer.remaining_ticks(), Some(20));

    assert!(timer.pause());
    assert!(!timer.pause());
    for _ in 0..5 {
        assert_eq!(timer.tick(), TimerTick::Paused { remaining: 20 });
    }
    assert!(timer.resume());

    // No reset and no loss: exactly 20 more ticks, 35 in total
    for _ in 0..19 {
        assert!(matches!(timer.tick(), TimerTick::Running { .. }));
    }
    assert_eq!(timer.tick(), TimerTick::Expired(CountdownKind::Result));
}

#[test]
fn test_long_pause_is_safe() {
    let mut timer = create_test_timer();
    timer.start(CountdownKind::Error);
    timer.pause();
    for _ in 0..10_000 {
        timer.tick();
    }
    assert!(timer.is_active());
    assert!(timer.is_paused());
    assert_eq!(timer.remaining_ticks(), Some(5));
}

#[test]
fn test_start_replaces_previous_countdown() {
    let mut timer = create_test_timer();
    timer.start(CountdownKind::Result);
    timer.tick();
    timer.pause();

    timer.start(CountdownKind::Error);
    assert_eq!(timer.kind(), Some(CountdownKind::Error));
    assert_eq!(timer.remaining_ticks(), Some(5));
    assert!(!timer.is_paused());

    timer.cancel();
    assert!(!timer.is_active());
}

#[test]
fn test_timer_from_config_converts_seconds() {
    let mut config = KioskConfig::default().display;
    config.tick_millis = 250;
    config.result_seconds = 20;
    config.error_seconds = 5;

    let mut timer = DisplayTimer::from_config(&config);
    timer.start(CountdownKind::Result);
    assert_eq!(timer.remaining_ticks(), Some(80));
    assert_eq!(timer.remaining_seconds(), 20);

    timer.tick();
    // 79 ticks of 250ms round up to 20s
    assert_eq!(timer.remaining_seconds(), 20);
    assert_eq!(timer.ticks_to_seconds(3), 1);
}

fn certificate(status: CertificateStatus) -> CertificateResult {
    CertificateResult {
        certificate_id: "CERT-COMP-42".to_string(),
        entity_names: vec!["Acme Foods".to_string()],
        entity_type: Some("company".to_string()),
        certificate_type: Some("compliance".to_string()),
        status,
        document_url: Some("https://example.org/42.pdf".to_string()),
        issued_on: "January 05, 2024".to_string(),
        expires_on: "January 05, 2026".to_string(),
        chain: None,
        version: SchemaVersion::V1,
    }
}

#[test]
fn test_render_status_lines() {
    let idle = KioskEvent::StateChanged {
        from: KioskState::Processing,
        to: KioskState::Idle,
        timestamp: SystemTime::now(),
    };
    assert_eq!(render(&idle), Some(vec!["Ready to Scan".to_string()]));

    let processing = KioskEvent::StateChanged {
        from: KioskState::Idle,
        to: KioskState::Processing,
        timestamp: SystemTime::now(),
    };
    assert_eq!(
        render(&processing),
        Some(vec!["Processing scan...".to_string()])
    );

    let tick = KioskEvent::CountdownTick {
        remaining_seconds: 7,
    };
    assert_eq!(render(&tick), Some(vec!["Next scan in: 7s".to_string()]));

    let step = KioskEvent::OcrStepChanged {
        step: OcrCaptureStep::ReadyBack,
    };
    assert_eq!(
        render(&step),
        Some(vec![OcrCaptureStep::ReadyBack.prompt().to_string()])
    );
}

#[test]
fn test_render_results() {
    let pending = KioskEvent::CertificateReady {
        result: Arc::new(certificate(CertificateStatus::Pending)),
    };
    let lines = render(&pending).unwrap();
    assert_eq!(lines[0], "CERTIFICATE PENDING VERIFICATION");
    assert!(lines.contains(&"Issued to: Acme Foods".to_string()));
    assert!(lines.contains(&"Document: https://example.org/42.pdf".to_string()));

    let missing = KioskEvent::ProductReady {
        result: Arc::new(ProductResult::not_found(Some("Mystery Tea"), None)),
    };
    let lines = render(&missing).unwrap();
    assert_eq!(lines[0], "PRODUCT NOT VERIFIED");
    assert!(lines.contains(&"Confidence: 0%".to_string()));
    assert!(lines.iter().any(|l| l.contains("may be counterfeit")));
}

#[test]
fn test_render_skips_display_state_changes() {
    let event = KioskEvent::StateChanged {
        from: KioskState::Processing,
        to: KioskState::DisplayProduct,
        timestamp: SystemTime::now(),
    };
    assert_eq!(render(&event), None);
}

#[tokio::test]
async fn test_presenter_tracks_status() {
    let bus = EventBus::new(16);
    let mut presenter = DisplayPresenter::new(&bus);

    presenter.present(&KioskEvent::ErrorShown {
        message: "Camera unavailable".to_string(),
        persistent: true,
    });
    assert_eq!(presenter.last_status(), Some("Error: Camera unavailable"));

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(presenter.run(cancel.clone()));
    bus.publish(KioskEvent::MaintenanceExited {
        timestamp: SystemTime::now(),
    });
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap();
}

use super::*;
use crate::config::{ConnectivityConfig, KioskConfig};
use crate::error::BackendError;
use crate::events::ControllerMessage;
use crate::verify::mock::MockBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn create_test_config() -> ConnectivityConfig {
    KioskConfig::default().connectivity
}

#[test]
fn test_threshold_failures_enter_maintenance() {
    let config = create_test_config();
    let (mut monitor, cadence) = ConnectivityMonitor::new(&config);
    assert_eq!(*cadence.borrow(), config.online_poll());

    assert_eq!(monitor.record_probe(false, false), ConnectivitySignal::None);
    assert_eq!(monitor.record_probe(false, false), ConnectivitySignal::None);
    assert_eq!(
        monitor.record_probe(false, false),
        ConnectivitySignal::EnterMaintenance
    );

    let state = monitor.state();
    assert!(!state.online);
    assert_eq!(state.consecutive_failures, 3);
    assert!(state.last_check.is_some());
    assert_eq!(*cadence.borrow(), config.maintenance_poll());
}

#[test]
fn test_failures_in_maintenance_do_not_signal_again() {
    let (mut monitor, _cadence) = ConnectivityMonitor::new(&create_test_config());
    for _ in 0..3 {
        monitor.record_probe(false, false);
    }

    assert_eq!(monitor.record_probe(false, true), ConnectivitySignal::None);
    assert_eq!(monitor.record_probe(false, true), ConnectivitySignal::None);
    assert_eq!(monitor.state().consecutive_failures, 5);
}

#[test]
fn test_success_in_maintenance_recovers() {
    let config = create_test_config();
    let (mut monitor, cadence) = ConnectivityMonitor::new(&config);
    for _ in 0..3 {
        monitor.record_probe(false, false);
    }

    assert_eq!(monitor.record_probe(true, true), ConnectivitySignal::Recovered);
    let state = monitor.state();
    assert!(state.online);
    assert_eq!(state.consecutive_failures, 0);
    assert_eq!(*cadence.borrow(), config.online_poll());
    assert_eq!(monitor.current_poll_interval(), config.online_poll());
}

#[test]
fn test_success_resets_counter_before_threshold() {
    let (mut monitor, _cadence) = ConnectivityMonitor::new(&create_test_config());

    monitor.record_probe(false, false);
    monitor.record_probe(false, false);
    assert_eq!(monitor.record_probe(true, false), ConnectivitySignal::None);
    assert_eq!(monitor.state().consecutive_failures, 0);

    // Two more failures are not enough after the reset
    monitor.record_probe(false, false);
    assert_eq!(monitor.record_probe(false, false), ConnectivitySignal::None);
}

fn spawn_prober(
    backend: Arc<MockBackend>,
    interval: Duration,
) -> (
    mpsc::Receiver<ControllerMessage>,
    watch::Sender<Duration>,
    CancellationToken,
    tokio::task::JoinHandle<()>,
) {
    let (tx, rx) = mpsc::channel(8);
    let (cadence_tx, cadence_rx) = watch::channel(interval);
    let cancel = CancellationToken::new();
    let prober = HealthProber::new(
        backend,
        Duration::from_millis(200),
        cadence_rx,
        tx,
        cancel.clone(),
    );
    let handle = tokio::spawn(prober.run());
    (rx, cadence_tx, cancel, handle)
}

async fn next_probe(rx: &mut mpsc::Receiver<ControllerMessage>, wait: Duration) -> Option<bool> {
    match timeout(wait, rx.recv()).await {
        Ok(Some(ControllerMessage::ProbeCompleted { healthy })) => Some(healthy),
        _ => None,
    }
}

#[tokio::test]
async fn test_prober_probes_immediately_and_repeats() {
    let backend = Arc::new(MockBackend::new());
    backend.on_health(Ok(true));
    backend.on_health(Err(BackendError::Http {
        status: 503,
        details: "unavailable".to_string(),
    }));
    backend.on_health(Ok(false));

    let (mut rx, _cadence, cancel, handle) =
        spawn_prober(Arc::clone(&backend), Duration::from_millis(20));

    let wait = Duration::from_millis(500);
    assert_eq!(next_probe(&mut rx, wait).await, Some(true));
    assert_eq!(next_probe(&mut rx, wait).await, Some(false));
    assert_eq!(next_probe(&mut rx, wait).await, Some(false));
    // Empty script answers with a connection error
    assert_eq!(next_probe(&mut rx, wait).await, Some(false));

    cancel.cancel();
    handle.await.unwrap();
    assert!(backend.calls().iter().all(|call| call == "health"));
}

#[tokio::test]
async fn test_prober_timeout_counts_as_failure() {
    let backend = Arc::new(MockBackend::with_delay(Duration::from_secs(5)));
    backend.on_health(Ok(true));

    let (mut rx, _cadence, cancel, handle) =
        spawn_prober(backend, Duration::from_secs(60));

    assert_eq!(
        next_probe(&mut rx, Duration::from_secs(2)).await,
        Some(false)
    );

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_prober_rearms_on_cadence_change() {
    let backend = Arc::new(MockBackend::new());
    for _ in 0..4 {
        backend.on_health(Ok(true));
    }

    let (mut rx, cadence, cancel, handle) =
        spawn_prober(backend, Duration::from_secs(3600));

    assert_eq!(next_probe(&mut rx, Duration::from_millis(500)).await, Some(true));
    // Nothing for an hour under the online cadence
    assert_eq!(next_probe(&mut rx, Duration::from_millis(100)).await, None);

    cadence.send_replace(Duration::from_millis(20));
    assert_eq!(next_probe(&mut rx, Duration::from_millis(500)).await, Some(true));

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_prober_stops_when_controller_gone() {
    let backend = Arc::new(MockBackend::new());
    let (rx, _cadence, _cancel, handle) =
        spawn_prober(backend, Duration::from_millis(10));
    drop(rx);

    timeout(Duration::from_secs(1), handle)
        .await
        .expect("prober should exit")
        .unwrap();
}

//! Integration tests for the hot-plug monitor.
//!
//! Drives `DeviceMonitor` with a scripted `DummyEnumerator` and checks that
//! arrivals and removals are reported exactly once, by identity.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use macrodeck_transport::{
    BoxedDevice, DeviceCallback, DeviceEnumerator, DeviceId, DeviceMonitor, DiscoveryEvent,
    DummyDeck, DummyEnumerator, TransportError,
};
use parking_lot::Mutex;

const INTERVAL: Duration = Duration::from_millis(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn deck(path: &str) -> BoxedDevice {
    Arc::new(DummyDeck::new(0x0FD9, 0x006D).with_path(path))
}

fn wait_until(cond: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

type Log = Arc<Mutex<Vec<DeviceId>>>;

fn recorder(log: &Log) -> DeviceCallback<BoxedDevice> {
    let log = Arc::clone(log);
    Box::new(move |device: BoxedDevice| {
        log.lock().push(device.id());
        Ok(())
    })
}

fn ids(paths: &[&str]) -> Vec<DeviceId> {
    paths.iter().map(|p| DeviceId::from(*p)).collect()
}

// ── Transitions ──

#[test]
fn reports_each_transition_once() {
    init_tracing();
    let d1 = deck("d1");
    let d2 = deck("d2");
    let enumerator = Arc::new(DummyEnumerator::with_script(vec![
        vec![d1.clone()],
        vec![d1.clone(), d2.clone()],
        vec![d2.clone()],
        vec![d2.clone()],
    ]));

    let connected: Log = Default::default();
    let disconnected: Log = Default::default();
    let mut monitor = DeviceMonitor::new(Arc::clone(&enumerator), INTERVAL);
    monitor
        .start(Some(recorder(&connected)), Some(recorder(&disconnected)))
        .unwrap();

    // Let the repeated last snapshot be polled a few more times
    assert!(wait_until(|| enumerator.enumerate_count() >= 8));
    monitor.stop();

    assert_eq!(*connected.lock(), ids(&["d2"]));
    assert_eq!(*disconnected.lock(), ids(&["d1"]));
}

#[test]
fn devices_present_at_start_are_not_reported() {
    let enumerator = Arc::new(DummyEnumerator::new(vec![deck("a"), deck("b")]));
    let connected: Log = Default::default();

    let mut monitor = DeviceMonitor::new(Arc::clone(&enumerator), INTERVAL);
    monitor.start(Some(recorder(&connected)), None).unwrap();
    assert_eq!(monitor.known_devices().len(), 2);

    assert!(wait_until(|| enumerator.enumerate_count() >= 4));
    monitor.stop();
    assert!(connected.lock().is_empty());
}

#[test]
fn fresh_handle_with_same_identity_is_not_a_transition() {
    let enumerator = Arc::new(DummyEnumerator::with_script(vec![
        vec![deck("a")],
        vec![deck("a")],
        vec![deck("a")],
    ]));
    let connected: Log = Default::default();
    let disconnected: Log = Default::default();

    let mut monitor = DeviceMonitor::new(Arc::clone(&enumerator), INTERVAL);
    monitor
        .start(Some(recorder(&connected)), Some(recorder(&disconnected)))
        .unwrap();
    assert!(wait_until(|| enumerator.enumerate_count() >= 4));
    monitor.stop();

    assert!(connected.lock().is_empty());
    assert!(disconnected.lock().is_empty());
}

#[test]
fn disconnect_reports_previously_known_handle() {
    let original = deck("a");
    let enumerator = Arc::new(DummyEnumerator::with_script(vec![
        vec![original.clone()],
        vec![],
    ]));
    let seen: Arc<Mutex<Vec<BoxedDevice>>> = Default::default();
    let sink = Arc::clone(&seen);

    let mut monitor = DeviceMonitor::new(Arc::clone(&enumerator), INTERVAL);
    monitor
        .start(
            None,
            Some(Box::new(move |device| {
                sink.lock().push(device);
                Ok(())
            })),
        )
        .unwrap();
    assert!(wait_until(|| !seen.lock().is_empty()));
    monitor.stop();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert!(Arc::ptr_eq(&seen[0], &original));
}

// ── Failures ──

#[test]
fn enumeration_failure_keeps_known_set() {
    init_tracing();
    let enumerator = Arc::new(DummyEnumerator::with_script(vec![vec![deck("a")]]));
    enumerator.push_failure("bus reset");
    enumerator.push_snapshot(vec![deck("a")]);
    enumerator.push_failure("bus reset");
    enumerator.push_snapshot(vec![]);

    let connected: Log = Default::default();
    let disconnected: Log = Default::default();
    let mut monitor = DeviceMonitor::new(Arc::clone(&enumerator), INTERVAL);
    monitor
        .start(Some(recorder(&connected)), Some(recorder(&disconnected)))
        .unwrap();

    assert!(wait_until(|| enumerator.enumerate_count() >= 7));
    monitor.stop();

    assert!(connected.lock().is_empty());
    assert_eq!(*disconnected.lock(), ids(&["a"]));
}

#[test]
fn failing_callbacks_do_not_stop_polling() {
    init_tracing();
    let enumerator = Arc::new(DummyEnumerator::with_script(vec![
        vec![],
        vec![deck("boom")],
        vec![deck("boom"), deck("err")],
        vec![deck("boom"), deck("err"), deck("ok")],
    ]));
    let connected: Log = Default::default();
    let log = Arc::clone(&connected);

    let mut monitor = DeviceMonitor::new(Arc::clone(&enumerator), INTERVAL);
    monitor
        .start(
            Some(Box::new(move |device: BoxedDevice| {
                let id = device.id();
                log.lock().push(id.clone());
                match id.as_str() {
                    "boom" => panic!("callback panic"),
                    "err" => anyhow::bail!("callback error"),
                    _ => Ok(()),
                }
            })),
            None,
        )
        .unwrap();

    assert!(wait_until(|| connected.lock().len() == 3));
    monitor.stop();
    assert_eq!(*connected.lock(), ids(&["boom", "err", "ok"]));
}

#[test]
fn initial_enumeration_failure_is_returned() {
    let enumerator = DummyEnumerator::<BoxedDevice>::new(vec![]);
    enumerator.push_failure("no hidapi");

    let mut monitor = DeviceMonitor::new(enumerator, INTERVAL);
    assert!(matches!(
        monitor.start(None, None),
        Err(TransportError::Internal(_))
    ));
    assert!(!monitor.is_running());
}

// ── Lifecycle ──

#[test]
fn start_while_running_fails() {
    let mut monitor = DeviceMonitor::new(DummyEnumerator::<BoxedDevice>::new(vec![]), INTERVAL);
    monitor.start(None, None).unwrap();
    assert!(matches!(
        monitor.start(None, None),
        Err(TransportError::MonitorRunning)
    ));
    monitor.stop();
    assert!(!monitor.is_running());

    // Restart after stop is allowed
    monitor.start(None, None).unwrap();
    monitor.stop();
}

#[test]
fn no_callbacks_after_stop() {
    let enumerator = Arc::new(DummyEnumerator::new(vec![]));
    let connected: Log = Default::default();

    let mut monitor = DeviceMonitor::new(Arc::clone(&enumerator), INTERVAL);
    monitor.start(Some(recorder(&connected)), None).unwrap();
    assert!(wait_until(|| enumerator.enumerate_count() >= 2));
    monitor.stop();
    assert!(monitor.known_devices().is_empty());

    let polls = enumerator.enumerate_count();
    enumerator.set_devices(vec![deck("late")]);
    std::thread::sleep(INTERVAL * 10);

    assert_eq!(enumerator.enumerate_count(), polls);
    assert!(connected.lock().is_empty());
}

#[test]
fn drop_stops_monitor() {
    let enumerator = Arc::new(DummyEnumerator::<BoxedDevice>::new(vec![]));
    {
        let mut monitor = DeviceMonitor::new(Arc::clone(&enumerator), INTERVAL);
        monitor.start(None, None).unwrap();
        assert!(wait_until(|| enumerator.enumerate_count() >= 2));
    }
    let polls = enumerator.enumerate_count();
    std::thread::sleep(INTERVAL * 10);
    assert_eq!(enumerator.enumerate_count(), polls);
}

/// Enumerator whose polls after the initial snapshot panic
#[derive(Default)]
struct PanickingEnumerator {
    calls: AtomicUsize,
}

impl DeviceEnumerator for PanickingEnumerator {
    type Device = BoxedDevice;

    fn enumerate(&self) -> Result<Vec<BoxedDevice>, TransportError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            panic!("enumeration blew up");
        }
        Ok(vec![deck("only")])
    }
}

#[test]
fn drop_after_monitor_thread_panicked() {
    init_tracing();
    let enumerator = Arc::new(PanickingEnumerator::default());
    let mut monitor = DeviceMonitor::new(Arc::clone(&enumerator), INTERVAL);
    monitor.start(None, None).unwrap();
    assert!(wait_until(|| enumerator.calls.load(Ordering::SeqCst) >= 2));
    assert!(monitor.is_running());

    // joining the dead thread is logged, not propagated
    drop(monitor);
    assert_eq!(enumerator.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn stop_after_monitor_thread_panicked() {
    init_tracing();
    let enumerator = Arc::new(PanickingEnumerator::default());
    let mut monitor = DeviceMonitor::new(Arc::clone(&enumerator), INTERVAL);
    monitor.start(None, None).unwrap();
    assert!(wait_until(|| enumerator.calls.load(Ordering::SeqCst) >= 2));

    monitor.stop();
    assert!(!monitor.is_running());
    assert!(monitor.known_devices().is_empty());
}

#[test]
fn subscribers_receive_discovery_events() {
    let enumerator = Arc::new(DummyEnumerator::with_script(vec![
        vec![deck("a")],
        vec![deck("b")],
    ]));
    let mut monitor = DeviceMonitor::new(Arc::clone(&enumerator), INTERVAL);
    let mut rx = monitor.subscribe();
    monitor.start(None, None).unwrap();
    assert!(wait_until(|| enumerator.enumerate_count() >= 3));
    monitor.stop();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(match event {
            DiscoveryEvent::DeviceAdded(d) => format!("+{}", d.id()),
            DiscoveryEvent::DeviceRemoved(d) => format!("-{}", d.id()),
        });
    }
    assert_eq!(events, vec!["+b".to_string(), "-a".to_string()]);
}

//! Hot-plug detection by polling an enumerator
//!
//! The monitor keeps the last observed device set and diffs each new
//! enumeration against it by identity, so every arrival and removal is
//! reported exactly once even when the enumerator hands out fresh handle
//! objects on every poll.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::types::{DeviceId, DiscoveryEvent};
use crate::{DeviceEnumerator, Identified};

/// Poll interval used when the caller has no preference
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Broadcast channel capacity for discovery events
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Connect/disconnect callback
///
/// Runs on the monitor thread. Errors and panics are logged and do not
/// stop the monitor.
pub type DeviceCallback<D> = Box<dyn FnMut(D) -> anyhow::Result<()> + Send>;

struct Worker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Background hot-plug monitor
pub struct DeviceMonitor<E: DeviceEnumerator> {
    enumerator: Arc<E>,
    interval: Duration,
    known: Arc<Mutex<Vec<E::Device>>>,
    event_tx: broadcast::Sender<DiscoveryEvent<E::Device>>,
    worker: Option<Worker>,
}

impl<E: DeviceEnumerator + 'static> DeviceMonitor<E> {
    pub fn new(enumerator: E, interval: Duration) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            enumerator: Arc::new(enumerator),
            interval,
            known: Arc::new(Mutex::new(Vec::new())),
            event_tx,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Devices seen by the most recent successful poll
    pub fn known_devices(&self) -> Vec<E::Device> {
        self.known.lock().clone()
    }

    /// Subscribe to discovery events
    ///
    /// Events are published after the matching callback has run.
    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent<E::Device>> {
        self.event_tx.subscribe()
    }

    /// Snapshot the current devices and start polling
    ///
    /// Devices present at start are not reported as connected.
    pub fn start(
        &mut self,
        on_connect: Option<DeviceCallback<E::Device>>,
        on_disconnect: Option<DeviceCallback<E::Device>>,
    ) -> Result<(), TransportError> {
        if self.worker.is_some() {
            return Err(TransportError::MonitorRunning);
        }

        let initial = self.enumerator.enumerate()?;
        info!(
            "Device monitor started with {} devices (interval {:?})",
            initial.len(),
            self.interval
        );
        *self.known.lock() = initial;

        let (stop_tx, stop_rx) = mpsc::channel();
        let poller = Poller {
            enumerator: Arc::clone(&self.enumerator),
            known: Arc::clone(&self.known),
            event_tx: self.event_tx.clone(),
            on_connect,
            on_disconnect,
        };
        let interval = self.interval;

        let handle = std::thread::Builder::new()
            .name("device-monitor".into())
            .spawn(move || poller.run(stop_rx, interval))
            .map_err(|e| {
                TransportError::Internal(format!("Failed to spawn monitor thread: {e}"))
            })?;

        self.worker = Some(Worker { stop_tx, handle });
        Ok(())
    }
}

impl<E: DeviceEnumerator> DeviceMonitor<E> {
    /// Stop polling and wait for the monitor thread to exit
    ///
    /// No callback runs after this returns. The known set is discarded.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        // The thread may already be gone if it panicked; ignore send failure.
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            error!("Device monitor thread panicked");
        }
        self.known.lock().clear();
        info!("Device monitor stopped");
    }
}

impl<E: DeviceEnumerator> Drop for DeviceMonitor<E> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Poller<E: DeviceEnumerator> {
    enumerator: Arc<E>,
    known: Arc<Mutex<Vec<E::Device>>>,
    event_tx: broadcast::Sender<DiscoveryEvent<E::Device>>,
    on_connect: Option<DeviceCallback<E::Device>>,
    on_disconnect: Option<DeviceCallback<E::Device>>,
}

impl<E: DeviceEnumerator> Poller<E> {
    fn run(mut self, stop_rx: mpsc::Receiver<()>, interval: Duration) {
        loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => self.poll(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("Device monitor thread exiting");
    }

    fn poll(&mut self) {
        let current = match self.enumerator.enumerate() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Device enumeration failed, keeping previous set: {}", e);
                return;
            }
        };

        let (added, removed) = {
            let known = self.known.lock();
            diff_devices(&known, &current)
        };
        if !added.is_empty() || !removed.is_empty() {
            debug!(
                "Poll: {} devices, {} added, {} removed",
                current.len(),
                added.len(),
                removed.len()
            );
        }

        for device in added {
            info!("Device connected: {}", device.device_id());
            if let Some(callback) = self.on_connect.as_mut() {
                run_callback("connect", callback, device.clone());
            }
            let _ = self.event_tx.send(DiscoveryEvent::DeviceAdded(device));
        }
        for device in removed {
            info!("Device disconnected: {}", device.device_id());
            if let Some(callback) = self.on_disconnect.as_mut() {
                run_callback("disconnect", callback, device.clone());
            }
            let _ = self.event_tx.send(DiscoveryEvent::DeviceRemoved(device));
        }

        *self.known.lock() = current;
    }
}

fn run_callback<D>(what: &str, callback: &mut DeviceCallback<D>, device: D) {
    match panic::catch_unwind(AssertUnwindSafe(|| callback(device))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Device {} callback failed: {:#}", what, e),
        Err(_) => error!("Device {} callback panicked", what),
    }
}

/// Split two snapshots into `(added, removed)` by identity
///
/// Added devices come from `current`, removed ones from `known`, each in
/// snapshot order.
pub(crate) fn diff_devices<D: Identified + Clone>(known: &[D], current: &[D]) -> (Vec<D>, Vec<D>) {
    let known_ids: HashSet<DeviceId> = known.iter().map(Identified::device_id).collect();
    let current_ids: HashSet<DeviceId> = current.iter().map(Identified::device_id).collect();

    let added = current
        .iter()
        .filter(|d| !known_ids.contains(&d.device_id()))
        .cloned()
        .collect();
    let removed = known
        .iter()
        .filter(|d| !current_ids.contains(&d.device_id()))
        .cloned()
        .collect();
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Fake {
        id: &'static str,
        generation: u32,
    }

    impl Identified for Fake {
        fn device_id(&self) -> DeviceId {
            DeviceId::from(self.id)
        }
    }

    fn fake(id: &'static str, generation: u32) -> Fake {
        Fake { id, generation }
    }

    #[test]
    fn test_diff_added_and_removed() {
        let known = vec![fake("a", 0), fake("b", 0)];
        let current = vec![fake("b", 0), fake("c", 0)];
        let (added, removed) = diff_devices(&known, &current);
        assert_eq!(added, vec![fake("c", 0)]);
        assert_eq!(removed, vec![fake("a", 0)]);
    }

    #[test]
    fn test_diff_matches_by_identity_not_handle() {
        let known = vec![fake("a", 0)];
        let current = vec![fake("a", 1)];
        let (added, removed) = diff_devices(&known, &current);
        assert!(added.is_empty());
        assert!(removed.is_empty());
    }

    #[test]
    fn test_diff_removed_reports_known_handle() {
        let known = vec![fake("a", 7)];
        let (_, removed) = diff_devices(&known, &[]);
        assert_eq!(removed[0].generation, 7);
    }

    #[test]
    fn test_diff_empty() {
        let (added, removed) = diff_devices::<Fake>(&[], &[]);
        assert!(added.is_empty() && removed.is_empty());
    }
}

//! In-memory backend for testing without hardware
//!
//! `DummyDeck` behaves like an attached panel: I/O is rejected until the
//! device is opened, every push is recorded for inspection, and input can
//! be simulated through the same callback slots a real event thread uses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tracing::{debug, info};

use crate::device_registry::{self, DeckModel};
use crate::error::TransportError;
use crate::types::{
    DeviceInfo, DialEventType, ImageFormat, KeyLayout, TouchPayload, TouchscreenEventType,
};
use crate::{
    DeckDevice, DeviceEnumerator, DialCallback, ExclusiveAccess, Identified, KeyCallback,
    TouchCallback,
};

type SharedKeyCallback = Arc<dyn Fn(&dyn DeckDevice, usize, bool) + Send + Sync>;
type SharedDialCallback = Arc<dyn Fn(&dyn DeckDevice, usize, DialEventType, i32) + Send + Sync>;
type SharedTouchCallback =
    Arc<dyn Fn(&dyn DeckDevice, TouchscreenEventType, TouchPayload) + Send + Sync>;

/// Original V2 geometry, used when a PID is not in the registry
const FALLBACK_PID: u16 = 0x006D;

#[derive(Debug, Default)]
struct DummyState {
    key_images: Vec<Option<Vec<u8>>>,
    touchscreen_image: Option<Vec<u8>>,
    brightness: u8,
    key_states: Vec<bool>,
    dial_states: Vec<bool>,
    key_writes: usize,
    reset_count: usize,
}

/// Dummy panel for tests
pub struct DummyDeck {
    info: DeviceInfo,
    model: DeckModel,
    open: AtomicBool,
    connected: AtomicBool,
    io: ReentrantMutex<()>,
    state: Mutex<DummyState>,
    key_callback: RwLock<Option<SharedKeyCallback>>,
    dial_callback: RwLock<Option<SharedDialCallback>>,
    touch_callback: RwLock<Option<SharedTouchCallback>>,
}

impl DummyDeck {
    /// Create a dummy for a VID/PID pair, with registry geometry if known
    pub fn new(vid: u16, pid: u16) -> Self {
        let model = device_registry::find_model(vid, pid)
            .or_else(|| device_registry::find_model(device_registry::VENDOR_ID, FALLBACK_PID))
            .copied()
            .unwrap_or(device_registry::KNOWN_MODELS[0]);
        let info = DeviceInfo {
            vid,
            pid,
            device_path: format!("{vid}:{pid}"),
            serial: None,
            product_name: Some(model.name.to_string()),
        };
        Self::with_model(info, model)
    }

    /// Create a dummy from explicit identity and geometry
    pub fn with_model(info: DeviceInfo, model: DeckModel) -> Self {
        let state = DummyState {
            key_images: vec![None; model.layout.key_count()],
            brightness: 100,
            key_states: vec![false; model.layout.key_count()],
            dial_states: vec![false; model.dial_count],
            ..Default::default()
        };
        Self {
            info,
            model,
            open: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            io: ReentrantMutex::new(()),
            state: Mutex::new(state),
            key_callback: RwLock::new(None),
            dial_callback: RwLock::new(None),
            touch_callback: RwLock::new(None),
        }
    }

    /// Override the device path (and therefore the identity)
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.info.device_path = path.into();
        self
    }

    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.info.serial = Some(serial.into());
        self
    }

    /// Override the key grid, keeping the key image format
    pub fn with_layout(mut self, rows: usize, cols: usize) -> Self {
        self.model.layout = KeyLayout::new(rows, cols);
        let mut state = self.state.lock();
        state.key_images = vec![None; rows * cols];
        state.key_states = vec![false; rows * cols];
        drop(state);
        self
    }

    fn require_open(&self, what: &str) -> Result<(), TransportError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TransportError::NotOpen(format!(
                "Deck {what} while deck not open"
            )))
        }
    }

    fn check_key(&self, key: usize) -> Result<(), TransportError> {
        let key_count = self.key_count();
        if key < key_count {
            Ok(())
        } else {
            Err(TransportError::InvalidKey { key, key_count })
        }
    }

    // === Inspection ===

    /// Image last pushed to `key`
    pub fn key_image(&self, key: usize) -> Option<Vec<u8>> {
        self.state.lock().key_images.get(key).cloned().flatten()
    }

    /// Number of key image pushes (including blanking pushes)
    pub fn key_write_count(&self) -> usize {
        self.state.lock().key_writes
    }

    pub fn touchscreen_image(&self) -> Option<Vec<u8>> {
        self.state.lock().touchscreen_image.clone()
    }

    pub fn brightness(&self) -> u8 {
        self.state.lock().brightness
    }

    pub fn reset_count(&self) -> usize {
        self.state.lock().reset_count
    }

    /// Mark the device as unplugged
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    // === Input simulation ===

    /// Simulate a key state change, delivered to the key callback
    pub fn press_key(&self, key: usize, pressed: bool) {
        if let Some(state) = self.state.lock().key_states.get_mut(key) {
            *state = pressed;
        }
        let callback = self.key_callback.read().clone();
        if let Some(callback) = callback {
            callback(self, key, pressed);
        }
    }

    /// Simulate pushing (or releasing) a dial
    pub fn push_dial(&self, dial: usize, pressed: bool) {
        if let Some(state) = self.state.lock().dial_states.get_mut(dial) {
            *state = pressed;
        }
        self.emit_dial(dial, DialEventType::Push, i32::from(pressed));
    }

    /// Simulate turning a dial by `delta` detents
    pub fn turn_dial(&self, dial: usize, delta: i32) {
        self.emit_dial(dial, DialEventType::Turn, delta);
    }

    fn emit_dial(&self, dial: usize, kind: DialEventType, value: i32) {
        let callback = self.dial_callback.read().clone();
        if let Some(callback) = callback {
            callback(self, dial, kind, value);
        }
    }

    /// Simulate a touch strip event
    pub fn touch(&self, kind: TouchscreenEventType, payload: TouchPayload) {
        let callback = self.touch_callback.read().clone();
        if let Some(callback) = callback {
            callback(self, kind, payload);
        }
    }
}

impl DeckDevice for DummyDeck {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn deck_type(&self) -> &str {
        self.model.name
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn open(&self) -> Result<(), TransportError> {
        let _io = self.io.lock();
        if !self.open.swap(true, Ordering::SeqCst) {
            info!("Deck opened");
        }
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        let _io = self.io.lock();
        if self.open.swap(false, Ordering::SeqCst) {
            info!("Deck closed");
        }
        Ok(())
    }

    fn is_visual(&self) -> bool {
        self.model.is_visual()
    }

    fn is_touch(&self) -> bool {
        self.model.is_touch()
    }

    fn key_layout(&self) -> KeyLayout {
        self.model.layout
    }

    fn dial_count(&self) -> usize {
        self.model.dial_count
    }

    fn key_image_format(&self) -> ImageFormat {
        self.model.key_format.unwrap_or(ImageFormat::none())
    }

    fn touchscreen_image_format(&self) -> Option<ImageFormat> {
        self.model.touchscreen_format
    }

    fn screen_image_format(&self) -> Option<ImageFormat> {
        self.model.screen_format
    }

    fn set_key_image(&self, key: usize, image: Option<&[u8]>) -> Result<(), TransportError> {
        let _io = self.io.lock();
        self.require_open("key image write")?;
        self.check_key(key)?;
        debug!(
            "Deck key image write (key {}, {} bytes)",
            key,
            image.map_or(0, <[u8]>::len)
        );
        let mut state = self.state.lock();
        state.key_images[key] = image.map(<[u8]>::to_vec);
        state.key_writes += 1;
        Ok(())
    }

    fn set_touchscreen_image(
        &self,
        image: Option<&[u8]>,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), TransportError> {
        let _io = self.io.lock();
        self.require_open("touchscreen write")?;
        debug!(
            "Deck touchscreen write ({}x{} at {},{}, {} bytes)",
            width,
            height,
            x,
            y,
            image.map_or(0, <[u8]>::len)
        );
        self.state.lock().touchscreen_image = image.map(<[u8]>::to_vec);
        Ok(())
    }

    fn set_brightness(&self, percent: u8) -> Result<(), TransportError> {
        let _io = self.io.lock();
        self.require_open("feature write")?;
        let percent = percent.min(100);
        info!("Deck feature write (brightness {}%)", percent);
        self.state.lock().brightness = percent;
        Ok(())
    }

    fn reset(&self) -> Result<(), TransportError> {
        let _io = self.io.lock();
        self.require_open("feature write")?;
        info!("Deck feature write (reset)");
        let mut state = self.state.lock();
        state.key_images.iter_mut().for_each(|img| *img = None);
        state.touchscreen_image = None;
        state.reset_count += 1;
        Ok(())
    }

    fn set_key_callback(&self, callback: Option<KeyCallback>) {
        *self.key_callback.write() = callback.map(Arc::from);
    }

    fn set_dial_callback(&self, callback: Option<DialCallback>) {
        *self.dial_callback.write() = callback.map(Arc::from);
    }

    fn set_touchscreen_callback(&self, callback: Option<TouchCallback>) {
        *self.touch_callback.write() = callback.map(Arc::from);
    }

    fn key_states(&self) -> Vec<bool> {
        self.state.lock().key_states.clone()
    }

    fn dial_states(&self) -> Vec<bool> {
        self.state.lock().dial_states.clone()
    }

    fn exclusive(&self) -> ExclusiveAccess<'_> {
        self.io.lock()
    }
}

struct Script<D> {
    pending: VecDeque<Result<Vec<D>, String>>,
    current: Vec<D>,
    calls: usize,
}

/// Scriptable enumerator
///
/// Each `enumerate` call consumes the next queued snapshot (or failure);
/// once the queue is empty the last successful snapshot repeats.
pub struct DummyEnumerator<D> {
    script: Mutex<Script<D>>,
}

impl<D> DummyEnumerator<D> {
    /// Enumerator that always reports `devices`
    pub fn new(devices: Vec<D>) -> Self {
        Self {
            script: Mutex::new(Script {
                pending: VecDeque::new(),
                current: devices,
                calls: 0,
            }),
        }
    }

    /// Enumerator that replays `snapshots` in order
    pub fn with_script(snapshots: Vec<Vec<D>>) -> Self {
        let enumerator = Self::new(Vec::new());
        for snapshot in snapshots {
            enumerator.push_snapshot(snapshot);
        }
        enumerator
    }

    /// Queue a snapshot
    pub fn push_snapshot(&self, devices: Vec<D>) {
        self.script.lock().pending.push_back(Ok(devices));
    }

    /// Queue an enumeration failure
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script.lock().pending.push_back(Err(message.into()));
    }

    /// Drop any queued entries and report `devices` from now on
    pub fn set_devices(&self, devices: Vec<D>) {
        let mut script = self.script.lock();
        script.pending.clear();
        script.current = devices;
    }

    /// Number of `enumerate` calls so far
    pub fn enumerate_count(&self) -> usize {
        self.script.lock().calls
    }
}

impl<D: Identified + Clone + Send + Sync + 'static> DeviceEnumerator for DummyEnumerator<D> {
    type Device = D;

    fn enumerate(&self) -> Result<Vec<D>, TransportError> {
        let mut script = self.script.lock();
        script.calls += 1;
        match script.pending.pop_front() {
            Some(Ok(devices)) => {
                script.current = devices.clone();
                Ok(devices)
            }
            Some(Err(message)) => Err(TransportError::Internal(message)),
            None => Ok(script.current.clone()),
        }
    }
}

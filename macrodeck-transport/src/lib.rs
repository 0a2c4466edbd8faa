//! Device layer for USB HID macro keypads
//!
//! This crate provides the interfaces the macro controller is written
//! against, plus the pieces that deal with devices as devices:
//!
//! - [`DeckDevice`]: one connected panel (identity, geometry, image pushes,
//!   input callback slots)
//! - [`DeviceEnumerator`]: produces the currently connected devices
//! - [`DeviceMonitor`]: background hot-plug detection on top of an enumerator
//! - [`HidDiscovery`]: hidapi-backed enumerator for known panels
//! - [`DummyDeck`] / [`DummyEnumerator`]: in-memory backend for tests

pub mod device_registry;
pub mod error;
pub mod types;

mod discovery;
mod dummy;
mod monitor;

pub use device_registry::{find_model, is_known, DeckModel, KNOWN_MODELS, VENDOR_ID};
pub use discovery::{list_devices, HidDiscovery};
pub use dummy::{DummyDeck, DummyEnumerator};
pub use error::TransportError;
pub use monitor::{DeviceCallback, DeviceMonitor, DEFAULT_POLL_INTERVAL};
pub use types::{
    DeviceId, DeviceInfo, DialEventType, DiscoveredDevice, DiscoveryEvent, ImageEncoding,
    ImageFormat, KeyLayout, TouchPayload, TouchscreenEventType,
};

use std::sync::Arc;

/// Guard held while a caller needs exclusive access to a device
///
/// Re-entrant: the holder may keep calling into the device, other threads
/// block until the guard is dropped.
pub type ExclusiveAccess<'a> = parking_lot::ReentrantMutexGuard<'a, ()>;

/// Key state change: `(device, key, pressed)`
pub type KeyCallback = Box<dyn Fn(&dyn DeckDevice, usize, bool) + Send + Sync>;
/// Dial event: `(device, dial, kind, value)`
pub type DialCallback = Box<dyn Fn(&dyn DeckDevice, usize, DialEventType, i32) + Send + Sync>;
/// Touch event: `(device, kind, payload)`
pub type TouchCallback =
    Box<dyn Fn(&dyn DeckDevice, TouchscreenEventType, TouchPayload) + Send + Sync>;

/// One connected panel
///
/// Implementations deliver input through the registered callback slots on
/// their own event thread. All I/O methods may be called from any thread;
/// multi-step sequences that must not interleave with the event thread's
/// pushes should hold [`DeckDevice::exclusive`] for their duration.
pub trait DeckDevice: Send + Sync {
    /// Device identification
    fn info(&self) -> &DeviceInfo;

    /// Stable identity (the device path)
    fn id(&self) -> DeviceId {
        self.info().id()
    }

    fn vendor_id(&self) -> u16 {
        self.info().vid
    }

    fn product_id(&self) -> u16 {
        self.info().pid
    }

    /// Human readable model name
    fn deck_type(&self) -> &str;

    /// Check if the device is still attached
    fn connected(&self) -> bool;

    fn is_open(&self) -> bool;

    /// Open the device for I/O (no-op when already open)
    fn open(&self) -> Result<(), TransportError>;

    /// Close the device (no-op when already closed)
    fn close(&self) -> Result<(), TransportError>;

    /// Whether the keys have displays
    fn is_visual(&self) -> bool;

    /// Whether the device has a touch strip
    fn is_touch(&self) -> bool;

    fn key_layout(&self) -> KeyLayout;

    fn key_count(&self) -> usize {
        self.key_layout().key_count()
    }

    fn dial_count(&self) -> usize;

    /// Native key image format ([`ImageFormat::none`] for non-visual devices)
    fn key_image_format(&self) -> ImageFormat;

    fn touchscreen_image_format(&self) -> Option<ImageFormat>;

    fn screen_image_format(&self) -> Option<ImageFormat>;

    /// Push a native image to a key; `None` blanks the key
    fn set_key_image(&self, key: usize, image: Option<&[u8]>) -> Result<(), TransportError>;

    /// Push a native image to a region of the touch strip; `None` blanks it
    fn set_touchscreen_image(
        &self,
        image: Option<&[u8]>,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<(), TransportError>;

    /// Set display brightness (0-100)
    fn set_brightness(&self, percent: u8) -> Result<(), TransportError>;

    /// Blank all displays and return the device to its power-on state
    fn reset(&self) -> Result<(), TransportError>;

    fn set_key_callback(&self, callback: Option<KeyCallback>);

    fn set_dial_callback(&self, callback: Option<DialCallback>);

    fn set_touchscreen_callback(&self, callback: Option<TouchCallback>);

    /// Snapshot of the pressed state of every key
    fn key_states(&self) -> Vec<bool>;

    /// Snapshot of the pushed state of every dial
    fn dial_states(&self) -> Vec<bool>;

    /// Acquire exclusive access for a multi-call sequence
    fn exclusive(&self) -> ExclusiveAccess<'_>;
}

/// Shared device handle
pub type BoxedDevice = Arc<dyn DeckDevice>;

/// Anything with a stable device identity
pub trait Identified {
    fn device_id(&self) -> DeviceId;
}

impl<T: DeckDevice + ?Sized> Identified for Arc<T> {
    fn device_id(&self) -> DeviceId {
        self.id()
    }
}

impl Identified for DiscoveredDevice {
    fn device_id(&self) -> DeviceId {
        self.info.id()
    }
}

/// Source of the currently connected devices
///
/// Called repeatedly by [`DeviceMonitor`], so it should be cheap.
/// Identities must be unique within one snapshot.
pub trait DeviceEnumerator: Send + Sync {
    type Device: Identified + Clone + Send + Sync + 'static;

    fn enumerate(&self) -> Result<Vec<Self::Device>, TransportError>;
}

impl<E: DeviceEnumerator + ?Sized> DeviceEnumerator for Arc<E> {
    type Device = E::Device;

    fn enumerate(&self) -> Result<Vec<Self::Device>, TransportError> {
        (**self).enumerate()
    }
}

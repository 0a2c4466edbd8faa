//! Common types for the device layer

use std::fmt;

/// Stable identity of a physical device across enumerations
///
/// Two handles with the same id refer to the same device, even when the
/// handle objects differ between polls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Device identification information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Device path or identifier (backend-specific)
    pub device_path: String,
    /// Serial number if available
    pub serial: Option<String>,
    /// Product name if available
    pub product_name: Option<String>,
}

impl DeviceInfo {
    /// Identity used to match the device across enumerations (the path)
    pub fn id(&self) -> DeviceId {
        DeviceId::new(self.device_path.clone())
    }
}

/// Encoding of a native image buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageEncoding {
    Jpeg,
    Bmp,
    Png,
}

/// Native pixel format of one device surface (key, touchscreen, screen)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFormat {
    /// Width and height in pixels
    pub size: (u32, u32),
    pub encoding: ImageEncoding,
    /// Horizontal and vertical mirroring applied before encoding
    pub flip: (bool, bool),
    /// Counter-clockwise rotation in degrees (0, 90, 180 or 270)
    pub rotation: u16,
}

impl ImageFormat {
    pub const fn new(
        width: u32,
        height: u32,
        encoding: ImageEncoding,
        flip: (bool, bool),
        rotation: u16,
    ) -> Self {
        Self {
            size: (width, height),
            encoding,
            flip,
            rotation,
        }
    }

    /// Format of a device without visual output
    pub const fn none() -> Self {
        Self::new(0, 0, ImageEncoding::Jpeg, (false, false), 0)
    }

    pub fn width(&self) -> u32 {
        self.size.0
    }

    pub fn height(&self) -> u32 {
        self.size.1
    }

    pub fn is_empty(&self) -> bool {
        self.size.0 == 0 || self.size.1 == 0
    }
}

/// Key grid geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLayout {
    pub rows: usize,
    pub cols: usize,
}

impl KeyLayout {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn key_count(&self) -> usize {
        self.rows * self.cols
    }
}

/// Rotary dial event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DialEventType {
    /// Dial pressed (value 1) or released (value 0)
    Push,
    /// Dial rotated by a signed number of detents
    Turn,
}

/// Touch surface event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TouchscreenEventType {
    Short,
    Long,
    Drag,
}

/// Position data delivered with a touch event
///
/// `x_out`/`y_out` are only set for drags and hold the release point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TouchPayload {
    pub x: u16,
    pub y: u16,
    pub x_out: Option<u16>,
    pub y_out: Option<u16>,
}

impl TouchPayload {
    pub fn point(x: u16, y: u16) -> Self {
        Self {
            x,
            y,
            x_out: None,
            y_out: None,
        }
    }

    pub fn drag(x: u16, y: u16, x_out: u16, y_out: u16) -> Self {
        Self {
            x,
            y,
            x_out: Some(x_out),
            y_out: Some(y_out),
        }
    }
}

/// Discovered device that can be opened by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Device information
    pub info: DeviceInfo,
    /// Model name from the registry
    pub model: &'static str,
}

/// Hot-plug events published by the device monitor
#[derive(Debug, Clone)]
pub enum DiscoveryEvent<D> {
    /// A device was added
    DeviceAdded(D),
    /// A device was removed
    DeviceRemoved(D),
}

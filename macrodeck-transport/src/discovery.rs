//! Device discovery for known panels over hidapi

use std::collections::HashSet;

use hidapi::HidApi;
use tracing::{debug, info};

use crate::device_registry::{self, VENDOR_ID};
use crate::error::TransportError;
use crate::types::{DeviceInfo, DiscoveredDevice};
use crate::DeviceEnumerator;

/// HID device discovery for USB-attached panels
pub struct HidDiscovery {
    /// Known VID/PID pairs to look for
    known_devices: Vec<(u16, u16)>,
}

impl Default for HidDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl HidDiscovery {
    /// Create a discovery instance matching every registry model
    pub fn new() -> Self {
        Self {
            known_devices: device_registry::KNOWN_MODELS
                .iter()
                .map(|m| (VENDOR_ID, m.pid))
                .collect(),
        }
    }

    /// Add a VID/PID pair to discover
    pub fn add_device(&mut self, vid: u16, pid: u16) {
        if !self.known_devices.contains(&(vid, pid)) {
            self.known_devices.push((vid, pid));
        }
    }

    /// Check if a device matches our known devices
    fn is_known_device(&self, vid: u16, pid: u16) -> bool {
        self.known_devices.contains(&(vid, pid))
    }

    /// List currently attached devices
    ///
    /// A panel exposing several HID interfaces is reported once, keyed by
    /// its first interface path.
    pub fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        let api = HidApi::new()?;
        let mut seen = HashSet::new();
        let mut devices = Vec::new();

        for device_info in api.device_list() {
            let vid = device_info.vendor_id();
            let pid = device_info.product_id();

            if !self.is_known_device(vid, pid) {
                continue;
            }

            let path = device_info.path().to_string_lossy().to_string();
            if !seen.insert(path.clone()) {
                continue;
            }

            let serial = device_info.serial_number().map(|s| s.to_string());
            let product_name = device_info.product_string().map(|s| s.to_string());
            let model = device_registry::find_model(vid, pid)
                .map(|m| m.name)
                .unwrap_or("Unknown panel");

            debug!(
                "Found device: VID={:04X} PID={:04X} model={} path={}",
                vid, pid, model, path
            );

            devices.push(DiscoveredDevice {
                info: DeviceInfo {
                    vid,
                    pid,
                    device_path: path,
                    serial,
                    product_name,
                },
                model,
            });
        }

        info!("Found {} devices", devices.len());
        Ok(devices)
    }
}

impl DeviceEnumerator for HidDiscovery {
    type Device = DiscoveredDevice;

    fn enumerate(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        self.list_devices()
    }
}

/// List all connected panels synchronously
pub fn list_devices() -> Result<Vec<DiscoveredDevice>, TransportError> {
    HidDiscovery::new().list_devices()
}

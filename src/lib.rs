// MacroDeck - macro controller for USB HID macro keypads
// Key/dial/touch bindings, key images, character and image boards

pub mod action;
pub mod board;
pub mod error;
pub mod image_helpers;
pub mod macro_deck;
pub mod profile;

pub use action::{Action, ActionFn, DialAction, KeyAction, TouchAction};
pub use board::Grid;
pub use error::{DeckError, Result};
pub use image_helpers::Margins;
pub use macro_deck::{CharBoard, ImageBoard, KeyConfig, KeyConfiguration, MacroDeck};
pub use profile::{DeckProfile, DialProfile, KeyProfile, TouchProfile};

pub use macrodeck_transport as transport;
pub use macrodeck_transport::{
    BoxedDevice, DeckDevice, DeviceEnumerator, DeviceMonitor, DialEventType, DiscoveryEvent,
    HidDiscovery, KeyLayout, TouchPayload, TouchscreenEventType,
};

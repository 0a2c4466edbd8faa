//! Deck profiles
//!
//! A profile describes key labels, key images and shell commands for keys,
//! dials and touch events, stored as TOML:
//!
//! ```toml
//! brightness = 60
//!
//! [[keys]]
//! key = 0
//! up_text = "Build"
//! command = "make -C ~/project"
//!
//! [[dials]]
//! dial = 0
//! event = "turn"
//! command = "pactl set-sink-volume @DEFAULT_SINK@ +5%"
//!
//! [[touch]]
//! event = "long"
//! command = "loginctl lock-session"
//! ```

use std::path::{Path, PathBuf};

use macrodeck_transport::{DialEventType, TouchscreenEventType};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use crate::error::{DeckError, Result};
use crate::macro_deck::{KeyConfiguration, MacroDeck};

// ---------------------------------------------------------------------------
// Event kinds serialize as lowercase names
// ---------------------------------------------------------------------------

fn serialize_dial_event<S: Serializer>(
    event: &DialEventType,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(match event {
        DialEventType::Push => "push",
        DialEventType::Turn => "turn",
    })
}

fn deserialize_dial_event<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<DialEventType, D::Error> {
    let name = String::deserialize(d)?;
    match name.to_ascii_lowercase().as_str() {
        "push" => Ok(DialEventType::Push),
        "turn" => Ok(DialEventType::Turn),
        _ => Err(serde::de::Error::custom(format!(
            "unknown dial event: \"{name}\" (expected \"push\" or \"turn\")"
        ))),
    }
}

fn serialize_touch_event<S: Serializer>(
    event: &TouchscreenEventType,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(match event {
        TouchscreenEventType::Short => "short",
        TouchscreenEventType::Long => "long",
        TouchscreenEventType::Drag => "drag",
    })
}

fn deserialize_touch_event<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<TouchscreenEventType, D::Error> {
    let name = String::deserialize(d)?;
    match name.to_ascii_lowercase().as_str() {
        "short" => Ok(TouchscreenEventType::Short),
        "long" => Ok(TouchscreenEventType::Long),
        "drag" => Ok(TouchscreenEventType::Drag),
        _ => Err(serde::de::Error::custom(format!(
            "unknown touch event: \"{name}\" (expected \"short\", \"long\" or \"drag\")"
        ))),
    }
}

/// One key entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyProfile {
    pub key: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_image: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_image: Option<PathBuf>,
    /// Shell command run on press
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl KeyProfile {
    fn to_configuration(&self) -> KeyConfiguration {
        KeyConfiguration {
            up_image: self.up_image.clone(),
            down_image: self.down_image.clone(),
            up_text: self.up_text.clone(),
            down_text: self.down_text.clone(),
            pressed: self.command.as_deref().map(|command| Some(command.into())),
        }
    }
}

/// One dial entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialProfile {
    pub dial: usize,
    #[serde(
        serialize_with = "serialize_dial_event",
        deserialize_with = "deserialize_dial_event"
    )]
    pub event: DialEventType,
    pub command: String,
}

/// One touch entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchProfile {
    #[serde(
        serialize_with = "serialize_touch_event",
        deserialize_with = "deserialize_touch_event"
    )]
    pub event: TouchscreenEventType,
    pub command: String,
}

/// Complete deck profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckProfile {
    /// Display brightness in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<KeyProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dials: Vec<DialProfile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub touch: Vec<TouchProfile>,
}

impl DeckProfile {
    /// Default profile location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("macrodeck")
            .join("profile.toml")
    }

    /// Load a profile from a file, or return the empty profile if not found
    ///
    /// Relative image paths are resolved against the profile's directory.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut profile: DeckProfile = toml::from_str(&content)?;
        if let Some(base) = path.parent() {
            profile.resolve_images(base);
        }
        profile.validate()?;
        Ok(profile)
    }

    /// Save the profile, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn resolve_images(&mut self, base: &Path) {
        for key in &mut self.keys {
            for image in [&mut key.up_image, &mut key.down_image].into_iter().flatten() {
                if image.is_relative() {
                    *image = base.join(&*image);
                }
            }
        }
    }

    /// Check values that TOML types alone do not constrain
    pub fn validate(&self) -> Result<()> {
        if let Some(brightness) = self.brightness {
            if brightness > 100 {
                return Err(DeckError::InvalidParameter(format!(
                    "brightness {brightness} out of range (0-100)"
                )));
            }
        }
        Ok(())
    }

    /// Get the entry for a key
    pub fn get_key(&self, key: usize) -> Option<&KeyProfile> {
        self.keys.iter().find(|k| k.key == key)
    }
}

impl std::str::FromStr for DeckProfile {
    type Err = DeckError;

    fn from_str(s: &str) -> Result<Self> {
        let profile: DeckProfile = toml::from_str(s)?;
        profile.validate()?;
        Ok(profile)
    }
}

impl MacroDeck {
    /// Apply a profile on top of the current state
    ///
    /// Entries are applied in file order and the first failure stops the
    /// rest. Setting brightness needs an open device.
    pub fn apply_profile(&self, profile: &DeckProfile) -> Result<()> {
        profile.validate()?;
        if let Some(brightness) = profile.brightness {
            self.set_brightness(brightness)?;
        }
        for key in &profile.keys {
            self.configure_key(key.key, key.to_configuration())?;
        }
        for dial in &profile.dials {
            self.register_dial_macro(dial.dial, dial.event, dial.command.as_str());
        }
        for touch in &profile.touch {
            self.register_touch_macro(touch.event, touch.command.as_str());
        }
        info!(
            "Applied profile: {} keys, {} dials, {} touch events",
            profile.keys.len(),
            profile.dials.len(),
            profile.touch.len()
        );
        Ok(())
    }
}

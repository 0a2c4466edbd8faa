//! Device registry - known panels and their geometry by VID/PID
//!
//! The geometry here is what a backend reports through
//! [`crate::DeckDevice`]; the controller never hard-codes a model.

use crate::types::{ImageEncoding, ImageFormat, KeyLayout};

/// Elgato vendor ID
pub const VENDOR_ID: u16 = 0x0FD9;

/// Static description of one panel model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeckModel {
    pub name: &'static str,
    pub pid: u16,
    pub layout: KeyLayout,
    /// Key image format, or `None` for models without key displays
    pub key_format: Option<ImageFormat>,
    pub dial_count: usize,
    pub touchscreen_format: Option<ImageFormat>,
    pub screen_format: Option<ImageFormat>,
}

impl DeckModel {
    pub fn is_visual(&self) -> bool {
        self.key_format.is_some()
    }

    pub fn is_touch(&self) -> bool {
        self.touchscreen_format.is_some()
    }
}

const ORIGINAL_KEY: ImageFormat = ImageFormat::new(72, 72, ImageEncoding::Bmp, (true, true), 0);
const ORIGINAL_V2_KEY: ImageFormat =
    ImageFormat::new(72, 72, ImageEncoding::Jpeg, (true, true), 0);
const MINI_KEY: ImageFormat = ImageFormat::new(80, 80, ImageEncoding::Bmp, (false, true), 90);
const XL_KEY: ImageFormat = ImageFormat::new(96, 96, ImageEncoding::Jpeg, (true, true), 0);
const PLUS_KEY: ImageFormat = ImageFormat::new(120, 120, ImageEncoding::Jpeg, (false, false), 0);
const PLUS_TOUCH: ImageFormat =
    ImageFormat::new(800, 100, ImageEncoding::Jpeg, (false, false), 0);
const NEO_KEY: ImageFormat = ImageFormat::new(96, 96, ImageEncoding::Jpeg, (true, true), 0);
const NEO_SCREEN: ImageFormat = ImageFormat::new(248, 58, ImageEncoding::Jpeg, (true, true), 0);

/// All models the discovery backend recognises
pub const KNOWN_MODELS: &[DeckModel] = &[
    DeckModel {
        name: "Stream Deck Original",
        pid: 0x0060,
        layout: KeyLayout::new(3, 5),
        key_format: Some(ORIGINAL_KEY),
        dial_count: 0,
        touchscreen_format: None,
        screen_format: None,
    },
    DeckModel {
        name: "Stream Deck Original V2",
        pid: 0x006D,
        layout: KeyLayout::new(3, 5),
        key_format: Some(ORIGINAL_V2_KEY),
        dial_count: 0,
        touchscreen_format: None,
        screen_format: None,
    },
    DeckModel {
        name: "Stream Deck MK.2",
        pid: 0x0080,
        layout: KeyLayout::new(3, 5),
        key_format: Some(ORIGINAL_V2_KEY),
        dial_count: 0,
        touchscreen_format: None,
        screen_format: None,
    },
    DeckModel {
        name: "Stream Deck Mini",
        pid: 0x0063,
        layout: KeyLayout::new(2, 3),
        key_format: Some(MINI_KEY),
        dial_count: 0,
        touchscreen_format: None,
        screen_format: None,
    },
    DeckModel {
        name: "Stream Deck Mini MK.2",
        pid: 0x0090,
        layout: KeyLayout::new(2, 3),
        key_format: Some(MINI_KEY),
        dial_count: 0,
        touchscreen_format: None,
        screen_format: None,
    },
    DeckModel {
        name: "Stream Deck XL",
        pid: 0x006C,
        layout: KeyLayout::new(4, 8),
        key_format: Some(XL_KEY),
        dial_count: 0,
        touchscreen_format: None,
        screen_format: None,
    },
    DeckModel {
        name: "Stream Deck XL V2",
        pid: 0x008F,
        layout: KeyLayout::new(4, 8),
        key_format: Some(XL_KEY),
        dial_count: 0,
        touchscreen_format: None,
        screen_format: None,
    },
    DeckModel {
        name: "Stream Deck Pedal",
        pid: 0x0086,
        layout: KeyLayout::new(1, 3),
        key_format: None,
        dial_count: 0,
        touchscreen_format: None,
        screen_format: None,
    },
    DeckModel {
        name: "Stream Deck +",
        pid: 0x0084,
        layout: KeyLayout::new(2, 4),
        key_format: Some(PLUS_KEY),
        dial_count: 4,
        touchscreen_format: Some(PLUS_TOUCH),
        screen_format: None,
    },
    DeckModel {
        name: "Stream Deck Neo",
        pid: 0x009A,
        layout: KeyLayout::new(2, 4),
        key_format: Some(NEO_KEY),
        dial_count: 0,
        touchscreen_format: None,
        screen_format: Some(NEO_SCREEN),
    },
];

/// Look up a model by VID/PID
pub fn find_model(vid: u16, pid: u16) -> Option<&'static DeckModel> {
    if vid != VENDOR_ID {
        return None;
    }
    KNOWN_MODELS.iter().find(|m| m.pid == pid)
}

/// Check if a VID/PID pair is a supported panel
#[inline]
pub fn is_known(vid: u16, pid: u16) -> bool {
    find_model(vid, pid).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_models() {
        assert_eq!(find_model(VENDOR_ID, 0x006D).unwrap().layout, KeyLayout::new(3, 5));
        assert_eq!(find_model(VENDOR_ID, 0x006C).unwrap().layout.key_count(), 32);
        assert!(is_known(VENDOR_ID, 0x0084));
    }

    #[test]
    fn test_foreign_vendor_not_known() {
        assert!(!is_known(0x3151, 0x006D));
        assert!(!is_known(VENDOR_ID, 0x0000));
    }

    #[test]
    fn test_pedal_has_no_display() {
        let pedal = find_model(VENDOR_ID, 0x0086).unwrap();
        assert!(!pedal.is_visual());
        assert!(!pedal.is_touch());
    }

    #[test]
    fn test_plus_has_dials_and_touchscreen() {
        let plus = find_model(VENDOR_ID, 0x0084).unwrap();
        assert_eq!(plus.dial_count, 4);
        assert!(plus.is_touch());
    }

    #[test]
    fn test_pids_unique() {
        for (i, a) in KNOWN_MODELS.iter().enumerate() {
            for b in &KNOWN_MODELS[i + 1..] {
                assert_ne!(a.pid, b.pid, "{} and {} share a PID", a.name, b.name);
            }
        }
    }
}

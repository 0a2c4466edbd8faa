//! Integration tests for deck profiles: files on disk and applying them
//! to a controller.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use macrodeck::transport::{DummyDeck, VENDOR_ID};
use macrodeck::{
    DeckDevice, DeckError, DeckProfile, DialEventType, DialProfile, KeyProfile, MacroDeck,
    TouchProfile, TouchscreenEventType,
};

fn attach(pid: u16) -> (Arc<DummyDeck>, MacroDeck) {
    let dummy = Arc::new(DummyDeck::new(VENDOR_ID, pid));
    dummy.open().unwrap();
    let deck = MacroDeck::new(dummy.clone());
    (dummy, deck)
}

fn sample() -> DeckProfile {
    DeckProfile {
        brightness: Some(40),
        keys: vec![KeyProfile {
            key: 2,
            up_text: Some("Mute".into()),
            command: Some("pactl set-sink-mute @DEFAULT_SINK@ toggle".into()),
            ..Default::default()
        }],
        dials: vec![DialProfile {
            dial: 0,
            event: DialEventType::Turn,
            command: "volume".into(),
        }],
        touch: vec![TouchProfile {
            event: TouchscreenEventType::Short,
            command: "notify-send tap".into(),
        }],
    }
}

// ── Files ──

#[test]
fn missing_file_loads_empty_profile() {
    let dir = tempfile::tempdir().unwrap();
    let profile = DeckProfile::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(profile, DeckProfile::default());
}

#[test]
fn save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("profile.toml");
    sample().save(&path).unwrap();
    assert_eq!(DeckProfile::load(&path).unwrap(), sample());
}

#[test]
fn relative_images_resolve_against_profile_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.toml");
    std::fs::write(
        &path,
        "[[keys]]\nkey = 0\nup_image = \"icons/play.png\"\ndown_image = \"/abs/stop.png\"\n",
    )
    .unwrap();

    let profile = DeckProfile::load(&path).unwrap();
    let key = profile.get_key(0).unwrap();
    assert_eq!(key.up_image.as_deref(), Some(dir.path().join("icons/play.png").as_path()));
    assert_eq!(key.down_image.as_deref(), Some(std::path::Path::new("/abs/stop.png")));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.toml");
    std::fs::write(&path, "brightness = \"bright\"\n").unwrap();
    assert!(matches!(
        DeckProfile::load(&path),
        Err(DeckError::ProfileParse(_))
    ));
}

// ── Applying ──

#[test]
fn apply_profile_configures_deck() {
    let (dummy, deck) = attach(0x0084);
    deck.apply_profile(&sample()).unwrap();

    assert_eq!(dummy.brightness(), 40);
    assert!(deck.has_key_image(2, false));
    assert!(dummy.key_image(2).is_some());
    assert_eq!(
        deck.get_key_macro(2),
        Some("pactl set-sink-mute @DEFAULT_SINK@ toggle".into())
    );
    assert_eq!(
        deck.get_dial_macro(0, DialEventType::Turn),
        Some("volume".into())
    );
    assert_eq!(
        deck.get_touch_macro(TouchscreenEventType::Short),
        Some("notify-send tap".into())
    );
}

#[test]
fn apply_profile_loads_image_files() {
    let dir = tempfile::tempdir().unwrap();
    RgbaImage::from_pixel(32, 32, Rgba([255, 0, 0, 255]))
        .save(dir.path().join("red.png"))
        .unwrap();
    let path = dir.path().join("profile.toml");
    std::fs::write(&path, "[[keys]]\nkey = 1\nup_image = \"red.png\"\n").unwrap();

    let (dummy, deck) = attach(0x006D);
    deck.apply_profile(&DeckProfile::load(&path).unwrap()).unwrap();
    assert_eq!(dummy.key_image(1), deck.get_key_image(1, false));
    assert!(!deck.has_key_macro(1));
}

#[test]
fn apply_profile_stops_at_bad_key() {
    let (_dummy, deck) = attach(0x006D);
    let profile = DeckProfile {
        keys: vec![
            KeyProfile {
                key: 0,
                command: Some("true".into()),
                ..Default::default()
            },
            KeyProfile {
                key: 40,
                up_text: Some("x".into()),
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    assert!(matches!(
        deck.apply_profile(&profile),
        Err(DeckError::InvalidKey(40))
    ));
    assert!(deck.has_key_macro(0));
}

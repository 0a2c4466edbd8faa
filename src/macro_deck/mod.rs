//! Macro controller for one device
//!
//! `MacroDeck` binds actions to key, dial and touch events, keeps per-key
//! images and the character/image boards, and pushes every visible change
//! to the device as it happens.
//!
//! The handle is cheap to clone. State lives behind a single mutex that is
//! never held while talking to the device or running an action, so actions
//! may call back into the controller.

mod board;
mod image_board;
mod keys;

pub use keys::{KeyConfig, KeyConfiguration};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use image::DynamicImage;
use macrodeck_transport::{
    BoxedDevice, DeckDevice, DialEventType, KeyLayout, TouchPayload, TouchscreenEventType,
};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::action::{DialAction, KeyAction, TouchAction};
use crate::board::Grid;
use crate::error::{DeckError, Result};
use crate::image_helpers::{self, Margins, BLACK};

/// Polling granularity of the `wait_for_*` helpers
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Frame rate used when the caller passes 0
const MIN_FPS: u32 = 1;

/// Character board cell type
pub type CharBoard = Grid<char>;
/// Image board cell type: native image bytes, or blank
pub type ImageBoard = Grid<Option<Vec<u8>>>;

#[derive(Default)]
struct DeckState {
    key_macros: HashMap<usize, KeyAction>,
    dial_macros: HashMap<(usize, DialEventType), DialAction>,
    touch_macros: HashMap<TouchscreenEventType, TouchAction>,
    key_configs: HashMap<usize, KeyConfig>,
    board: Option<CharBoard>,
    image_board: Option<ImageBoard>,
}

struct Shared {
    device: BoxedDevice,
    state: Mutex<DeckState>,
    enabled: AtomicBool,
    loop_running: AtomicBool,
}

/// Macro controller handle
#[derive(Clone)]
pub struct MacroDeck {
    shared: Arc<Shared>,
}

impl MacroDeck {
    /// Take over the device's key, dial and touch callbacks
    pub fn new(device: BoxedDevice) -> Self {
        let shared = Arc::new(Shared {
            device,
            state: Mutex::new(DeckState::default()),
            enabled: AtomicBool::new(true),
            loop_running: AtomicBool::new(false),
        });
        let deck = Self { shared };
        deck.install_callbacks();
        info!(
            "Macro deck attached to {} ({}, {} keys)",
            deck.device().deck_type(),
            deck.device().id(),
            deck.device().key_count()
        );
        deck
    }

    fn install_callbacks(&self) {
        let device = &self.shared.device;

        let weak = Arc::downgrade(&self.shared);
        device.set_key_callback(Some(Box::new(
            move |dev: &dyn DeckDevice, key: usize, pressed: bool| {
                if let Some(deck) = upgrade(&weak) {
                    deck.handle_key(dev, key, pressed);
                }
            },
        )));

        let weak = Arc::downgrade(&self.shared);
        device.set_dial_callback(Some(Box::new(
            move |_: &dyn DeckDevice, dial: usize, kind: DialEventType, value: i32| {
                if let Some(deck) = upgrade(&weak) {
                    deck.handle_dial(dial, kind, value);
                }
            },
        )));

        let weak = Arc::downgrade(&self.shared);
        device.set_touchscreen_callback(Some(Box::new(
            move |_: &dyn DeckDevice, kind: TouchscreenEventType, payload: TouchPayload| {
                if let Some(deck) = upgrade(&weak) {
                    deck.handle_touch(kind, payload);
                }
            },
        )));
    }

    /// The underlying device
    pub fn device(&self) -> &dyn DeckDevice {
        self.shared.device.as_ref()
    }

    pub fn key_layout(&self) -> KeyLayout {
        self.device().key_layout()
    }

    fn state(&self) -> MutexGuard<'_, DeckState> {
        self.shared.state.lock()
    }

    fn check_key(&self, key: usize) -> Result<()> {
        if key < self.device().key_count() {
            Ok(())
        } else {
            Err(DeckError::InvalidKey(key))
        }
    }

    /// Push an image to a key if the device has key displays
    fn push_key_image(&self, key: usize, image: Option<&[u8]>) -> Result<()> {
        if self.device().is_visual() {
            self.device().set_key_image(key, image)?;
        }
        Ok(())
    }

    // === Enable / disable ===

    pub fn enable(&self) {
        self.shared.enabled.store(true, Ordering::SeqCst);
    }

    /// Stop running actions; key images still follow presses
    pub fn disable(&self) {
        self.shared.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    /// Drop every binding, key image and board, re-enable, and reset the
    /// device
    pub fn reset(&self) -> Result<()> {
        let _exclusive = self.device().exclusive();
        *self.state() = DeckState::default();
        self.enable();
        debug!("Macro deck state cleared");
        self.device().reset()?;
        Ok(())
    }

    pub fn set_brightness(&self, percent: u8) -> Result<()> {
        self.device().set_brightness(percent)?;
        Ok(())
    }

    // === Geometry ===

    /// Key index for a board position
    pub fn position_to_key(&self, row: usize, col: usize) -> Result<usize> {
        let layout = self.key_layout();
        if row < layout.rows && col < layout.cols {
            Ok(row * layout.cols + col)
        } else {
            Err(DeckError::InvalidPosition { row, col })
        }
    }

    /// Board position of a key index
    pub fn key_to_position(&self, key: usize) -> Result<(usize, usize)> {
        self.check_key(key)?;
        let cols = self.key_layout().cols;
        Ok((key / cols, key % cols))
    }

    // === Input dispatch ===

    fn handle_key(&self, device: &dyn DeckDevice, key: usize, pressed: bool) {
        let (image, action) = {
            let state = self.state();
            let image = state.key_configs.get(&key).and_then(|config| {
                if pressed {
                    config.down_image.clone()
                } else {
                    config.up_image.clone()
                }
            });
            let action = pressed
                .then(|| state.key_macros.get(&key).cloned())
                .flatten();
            (image, action)
        };

        if let Some(image) = image {
            if device.is_visual() {
                if let Err(e) = device.set_key_image(key, Some(&image)) {
                    warn!("Failed to update image for key {}: {}", key, e);
                }
            }
        }
        if let Some(action) = action {
            if self.is_enabled() {
                debug!("Running macro for key {}", key);
                action.run(());
            }
        }
    }

    fn handle_dial(&self, dial: usize, kind: DialEventType, value: i32) {
        let action = self.state().dial_macros.get(&(dial, kind)).cloned();
        if let Some(action) = action {
            if self.is_enabled() {
                debug!("Running macro for dial {} {:?} ({})", dial, kind, value);
                action.run(value);
            }
        }
    }

    fn handle_touch(&self, kind: TouchscreenEventType, payload: TouchPayload) {
        let action = self.state().touch_macros.get(&kind).cloned();
        if let Some(action) = action {
            if self.is_enabled() {
                debug!("Running macro for touch {:?}", kind);
                action.run(payload);
            }
        }
    }

    // === Input helpers ===

    /// Keys currently held down, ascending
    pub fn get_pressed_keys(&self) -> Vec<usize> {
        self.device()
            .key_states()
            .into_iter()
            .enumerate()
            .filter_map(|(key, pressed)| pressed.then_some(key))
            .collect()
    }

    /// Board characters under the keys currently held down
    pub fn get_pressed_chars(&self) -> Result<Vec<char>> {
        let pressed = self.get_pressed_keys();
        let state = self.state();
        let board = state.board.as_ref().ok_or(DeckError::BoardNotInitialised)?;
        let cols = board.cols().max(1);
        pressed
            .into_iter()
            .map(|key| board.get(key / cols, key % cols).copied())
            .collect()
    }

    /// Block until a key is held down and return the lowest such key
    ///
    /// Returns `None` once `timeout` elapses; waits forever without one.
    pub fn wait_for_key_press(&self, timeout: Option<Duration>) -> Option<usize> {
        let start = Instant::now();
        loop {
            if let Some(&key) = self.get_pressed_keys().first() {
                return Some(key);
            }
            if timeout.is_some_and(|t| start.elapsed() >= t) {
                return None;
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }

    /// Wait for a key press and map it through `char_map`
    pub fn wait_for_char_press(
        &self,
        char_map: &HashMap<usize, char>,
        timeout: Option<Duration>,
    ) -> Option<char> {
        self.wait_for_key_press(timeout)
            .and_then(|key| char_map.get(&key).copied())
    }

    /// Wait for a key press and return the board character on that key
    pub fn wait_for_board_press(&self, timeout: Option<Duration>) -> Result<Option<char>> {
        let char_map: HashMap<usize, char> = {
            let state = self.state();
            let board = state.board.as_ref().ok_or(DeckError::BoardNotInitialised)?;
            board
                .iter()
                .map(|(row, col, &ch)| (row * board.cols() + col, ch))
                .collect()
        };
        Ok(self.wait_for_char_press(&char_map, timeout))
    }

    // === Touchscreen ===

    /// Scale a bitmap onto the whole touchscreen
    pub fn display_touchscreen_image(&self, image: &DynamicImage) -> Result<()> {
        let device = self.device();
        let scaled =
            image_helpers::create_scaled_touchscreen_image(device, image, Margins::default(), BLACK)?;
        let native = image_helpers::to_native_touchscreen_format(device, &scaled)?;
        device.set_touchscreen_image(Some(&native), 0, 0, scaled.width(), scaled.height())?;
        Ok(())
    }

    // === Frame loop ===

    /// Open the device and call `callback` once per frame until it returns
    /// `false` or [`stop_loop`](Self::stop_loop) is called
    ///
    /// The callback receives the seconds elapsed since the previous frame.
    /// Blocks the calling thread; the device is closed on every exit path.
    pub fn run_loop<F>(&self, mut callback: F, fps: u32) -> Result<()>
    where
        F: FnMut(&MacroDeck, f64) -> bool,
    {
        let frame_time = Duration::from_secs_f64(1.0 / f64::from(fps.max(MIN_FPS)));
        self.device().open()?;
        self.shared.loop_running.store(true, Ordering::SeqCst);
        let _guard = LoopGuard { deck: self };
        debug!("Frame loop started at {} fps", fps.max(MIN_FPS));

        let mut last = Instant::now();
        while self.is_loop_running() {
            let now = Instant::now();
            let delta = now.duration_since(last);
            last = now;
            if !callback(self, delta.as_secs_f64()) || !self.is_loop_running() {
                break;
            }
            if let Some(remaining) = frame_time.checked_sub(now.elapsed()) {
                std::thread::sleep(remaining);
            }
        }
        Ok(())
    }

    /// Ask a running frame loop to exit after the current frame
    pub fn stop_loop(&self) {
        self.shared.loop_running.store(false, Ordering::SeqCst);
    }

    pub fn is_loop_running(&self) -> bool {
        self.shared.loop_running.load(Ordering::SeqCst)
    }
}

fn upgrade(weak: &Weak<Shared>) -> Option<MacroDeck> {
    weak.upgrade().map(|shared| MacroDeck { shared })
}

/// Ends the frame loop: clears the running flag and closes the device
struct LoopGuard<'a> {
    deck: &'a MacroDeck,
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.deck.stop_loop();
        if let Err(e) = self.deck.device().close() {
            warn!("Failed to close device after frame loop: {}", e);
        }
        debug!("Frame loop stopped");
    }
}

impl std::fmt::Debug for MacroDeck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacroDeck")
            .field("device", &self.device().id())
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

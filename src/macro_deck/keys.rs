//! Macro bindings and per-key image configuration

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use macrodeck_transport::{DialEventType, TouchscreenEventType};
use tracing::debug;

use super::MacroDeck;
use crate::action::{DialAction, KeyAction, TouchAction};
use crate::error::Result;
use crate::image_helpers::{self, Margins, BLACK, WHITE};

/// Native images stored for one key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyConfig {
    /// Shown while the key is released
    pub up_image: Option<Vec<u8>>,
    /// Shown while the key is held
    pub down_image: Option<Vec<u8>>,
}

impl KeyConfig {
    fn image(&self, pressed: bool) -> Option<&Vec<u8>> {
        if pressed {
            self.down_image.as_ref()
        } else {
            self.up_image.as_ref()
        }
    }

    fn slot(&mut self, pressed: bool) -> &mut Option<Vec<u8>> {
        if pressed {
            &mut self.down_image
        } else {
            &mut self.up_image
        }
    }

    fn is_empty(&self) -> bool {
        self.up_image.is_none() && self.down_image.is_none()
    }
}

/// Store one state's image, dropping the entry once both slots are empty
///
/// Returns the key's up image after the change.
fn store_key_image(
    configs: &mut HashMap<usize, KeyConfig>,
    key: usize,
    image: Option<Vec<u8>>,
    pressed: bool,
) -> Option<Vec<u8>> {
    let config = configs.entry(key).or_default();
    *config.slot(pressed) = image;
    let up = config.up_image.clone();
    if config.is_empty() {
        configs.remove(&key);
    }
    up
}

/// Parameters for [`MacroDeck::configure_key`]
///
/// Unset fields leave the stored value alone. When both an image path and
/// text are given for one state, the text is drawn over the image.
///
/// `pressed` is `Some(None)` after [`clear_pressed`](Self::clear_pressed),
/// which only [`MacroDeck::update_key_configuration`] acts on.
#[derive(Debug, Clone, Default)]
pub struct KeyConfiguration {
    pub up_image: Option<PathBuf>,
    pub down_image: Option<PathBuf>,
    pub up_text: Option<String>,
    pub down_text: Option<String>,
    pub pressed: Option<Option<KeyAction>>,
}

impl KeyConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn up_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.up_image = Some(path.into());
        self
    }

    pub fn down_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.down_image = Some(path.into());
        self
    }

    pub fn up_text(mut self, text: impl Into<String>) -> Self {
        self.up_text = Some(text.into());
        self
    }

    pub fn down_text(mut self, text: impl Into<String>) -> Self {
        self.down_text = Some(text.into());
        self
    }

    pub fn pressed(mut self, action: impl Into<KeyAction>) -> Self {
        self.pressed = Some(Some(action.into()));
        self
    }

    /// Ask for the key's macro to be unbound
    pub fn clear_pressed(mut self) -> Self {
        self.pressed = Some(None);
        self
    }
}

fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort();
    items
}

impl MacroDeck {
    // === Key macros ===

    pub fn register_key_macro(&self, key: usize, action: impl Into<KeyAction>) -> Result<()> {
        self.check_key(key)?;
        self.state().key_macros.insert(key, action.into());
        Ok(())
    }

    pub fn unregister_key_macro(&self, key: usize) -> Result<()> {
        self.check_key(key)?;
        self.state().key_macros.remove(&key);
        Ok(())
    }

    pub fn get_key_macro(&self, key: usize) -> Option<KeyAction> {
        self.state().key_macros.get(&key).cloned()
    }

    /// Register `action`, or unregister when `None`
    pub fn update_key_macro(&self, key: usize, action: Option<KeyAction>) -> Result<()> {
        match action {
            Some(action) => self.register_key_macro(key, action),
            None => self.unregister_key_macro(key),
        }
    }

    pub fn has_key_macro(&self, key: usize) -> bool {
        self.state().key_macros.contains_key(&key)
    }

    /// Keys with a bound macro, ascending
    pub fn macro_keys(&self) -> Vec<usize> {
        sorted(self.state().key_macros.keys().copied().collect())
    }

    pub fn register_key_macros<I>(&self, macros: I) -> Result<()>
    where
        I: IntoIterator<Item = (usize, KeyAction)>,
    {
        macros
            .into_iter()
            .try_for_each(|(key, action)| self.register_key_macro(key, action))
    }

    pub fn unregister_key_macros<I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = usize>,
    {
        keys.into_iter()
            .try_for_each(|key| self.unregister_key_macro(key))
    }

    /// Copy the macro of `source` to `destination`
    ///
    /// If `source` has no macro, `destination` loses its own.
    pub fn copy_key_macro(&self, source: usize, destination: usize) -> Result<()> {
        self.check_key(source)?;
        self.check_key(destination)?;
        if source == destination {
            return Ok(());
        }
        let mut state = self.state();
        match state.key_macros.get(&source).cloned() {
            Some(action) => state.key_macros.insert(destination, action),
            None => state.key_macros.remove(&destination),
        };
        Ok(())
    }

    pub fn move_key_macro(&self, source: usize, destination: usize) -> Result<()> {
        if source == destination {
            return self.check_key(source);
        }
        self.copy_key_macro(source, destination)?;
        self.unregister_key_macro(source)
    }

    pub fn swap_key_macros(&self, key_a: usize, key_b: usize) -> Result<()> {
        self.check_key(key_a)?;
        self.check_key(key_b)?;
        if key_a == key_b {
            return Ok(());
        }
        let mut state = self.state();
        let a = state.key_macros.remove(&key_a);
        let b = state.key_macros.remove(&key_b);
        if let Some(a) = a {
            state.key_macros.insert(key_b, a);
        }
        if let Some(b) = b {
            state.key_macros.insert(key_a, b);
        }
        Ok(())
    }

    // === Dial macros ===

    pub fn register_dial_macro(
        &self,
        dial: usize,
        event: DialEventType,
        action: impl Into<DialAction>,
    ) {
        self.state().dial_macros.insert((dial, event), action.into());
    }

    pub fn unregister_dial_macro(&self, dial: usize, event: DialEventType) {
        self.state().dial_macros.remove(&(dial, event));
    }

    pub fn get_dial_macro(&self, dial: usize, event: DialEventType) -> Option<DialAction> {
        self.state().dial_macros.get(&(dial, event)).cloned()
    }

    pub fn update_dial_macro(&self, dial: usize, event: DialEventType, action: Option<DialAction>) {
        match action {
            Some(action) => self.register_dial_macro(dial, event, action),
            None => self.unregister_dial_macro(dial, event),
        }
    }

    pub fn has_dial_macro(&self, dial: usize, event: DialEventType) -> bool {
        self.state().dial_macros.contains_key(&(dial, event))
    }

    /// Bound `(dial, event)` pairs, ascending
    pub fn macro_dials(&self) -> Vec<(usize, DialEventType)> {
        sorted(self.state().dial_macros.keys().copied().collect())
    }

    pub fn register_dial_macros<I>(&self, macros: I)
    where
        I: IntoIterator<Item = ((usize, DialEventType), DialAction)>,
    {
        for ((dial, event), action) in macros {
            self.register_dial_macro(dial, event, action);
        }
    }

    pub fn unregister_dial_macros<I>(&self, dials: I)
    where
        I: IntoIterator<Item = (usize, DialEventType)>,
    {
        for (dial, event) in dials {
            self.unregister_dial_macro(dial, event);
        }
    }

    // === Touch macros ===

    pub fn register_touch_macro(&self, event: TouchscreenEventType, action: impl Into<TouchAction>) {
        self.state().touch_macros.insert(event, action.into());
    }

    pub fn unregister_touch_macro(&self, event: TouchscreenEventType) {
        self.state().touch_macros.remove(&event);
    }

    pub fn get_touch_macro(&self, event: TouchscreenEventType) -> Option<TouchAction> {
        self.state().touch_macros.get(&event).cloned()
    }

    pub fn update_touch_macro(&self, event: TouchscreenEventType, action: Option<TouchAction>) {
        match action {
            Some(action) => self.register_touch_macro(event, action),
            None => self.unregister_touch_macro(event),
        }
    }

    pub fn has_touch_macro(&self, event: TouchscreenEventType) -> bool {
        self.state().touch_macros.contains_key(&event)
    }

    pub fn macro_touches(&self) -> Vec<TouchscreenEventType> {
        sorted(self.state().touch_macros.keys().copied().collect())
    }

    pub fn register_touch_macros<I>(&self, macros: I)
    where
        I: IntoIterator<Item = (TouchscreenEventType, TouchAction)>,
    {
        for (event, action) in macros {
            self.register_touch_macro(event, action);
        }
    }

    pub fn unregister_touch_macros<I>(&self, events: I)
    where
        I: IntoIterator<Item = TouchscreenEventType>,
    {
        for event in events {
            self.unregister_touch_macro(event);
        }
    }

    /// Remove every key, dial and touch binding; key images stay
    pub fn clear_all_macros(&self) {
        let mut state = self.state();
        state.key_macros.clear();
        state.dial_macros.clear();
        state.touch_macros.clear();
    }

    // === Key configuration ===

    /// Render a key image from an optional file and optional text
    fn build_key_image(&self, path: Option<&Path>, text: Option<&str>) -> Result<Vec<u8>> {
        let device = self.device();
        let mut image = match path {
            Some(path) => {
                let source = image_helpers::load_image(path)?;
                image_helpers::create_scaled_key_image(device, &source, Margins::default(), BLACK)?
            }
            None => image_helpers::create_key_image(device, BLACK)?,
        };
        if let Some(text) = text {
            image_helpers::draw_centered_text(&mut image, text, WHITE);
        }
        image_helpers::to_native_key_format(device, &image)
    }

    fn apply_key_configuration(
        &self,
        key: usize,
        params: KeyConfiguration,
        unregister_when_cleared: bool,
    ) -> Result<()> {
        self.check_key(key)?;

        let up = match (&params.up_image, &params.up_text) {
            (None, None) => None,
            (path, text) => Some(self.build_key_image(path.as_deref(), text.as_deref())?),
        };
        let down = match (&params.down_image, &params.down_text) {
            (None, None) => None,
            (path, text) => Some(self.build_key_image(path.as_deref(), text.as_deref())?),
        };

        let shown = {
            let mut state = self.state();
            if up.is_some() || down.is_some() {
                let config = state.key_configs.entry(key).or_default();
                if up.is_some() {
                    config.up_image = up;
                }
                if down.is_some() {
                    config.down_image = down;
                }
            }
            let shown = state.key_configs.get(&key).and_then(|c| c.up_image.clone());
            match params.pressed {
                Some(Some(action)) => {
                    state.key_macros.insert(key, action);
                }
                Some(None) if unregister_when_cleared => {
                    state.key_macros.remove(&key);
                }
                _ => {}
            }
            shown
        };

        if let Some(image) = shown {
            self.push_key_image(key, Some(&image))?;
        }
        Ok(())
    }

    /// Set images, text and press action of a key
    ///
    /// Omitted images and text keep their stored value and an omitted
    /// action keeps the current binding. A cleared action is ignored here.
    /// The up image is pushed right away if one is stored.
    pub fn configure_key(&self, key: usize, params: KeyConfiguration) -> Result<()> {
        self.apply_key_configuration(key, params, false)
    }

    /// Like [`configure_key`](Self::configure_key), but a cleared action
    /// ([`KeyConfiguration::clear_pressed`]) unbinds the key's macro
    pub fn update_key_configuration(&self, key: usize, params: KeyConfiguration) -> Result<()> {
        self.apply_key_configuration(key, params, true)
    }

    pub fn configure_keys<I>(&self, configs: I) -> Result<()>
    where
        I: IntoIterator<Item = (usize, KeyConfiguration)>,
    {
        configs
            .into_iter()
            .try_for_each(|(key, params)| self.configure_key(key, params))
    }

    pub fn update_key_configurations_bulk<I>(&self, configs: I) -> Result<()>
    where
        I: IntoIterator<Item = (usize, KeyConfiguration)>,
    {
        configs
            .into_iter()
            .try_for_each(|(key, params)| self.update_key_configuration(key, params))
    }

    pub fn get_key_configuration(&self, key: usize) -> Option<KeyConfig> {
        self.state().key_configs.get(&key).cloned()
    }

    pub fn is_key_configured(&self, key: usize) -> bool {
        self.state().key_configs.contains_key(&key)
    }

    /// Keys with stored images, ascending
    pub fn configured_keys(&self) -> Vec<usize> {
        sorted(self.state().key_configs.keys().copied().collect())
    }

    /// Forget a key's images and macro and blank it
    pub fn clear_key_configuration(&self, key: usize) -> Result<()> {
        self.check_key(key)?;
        {
            let mut state = self.state();
            state.key_configs.remove(&key);
            state.key_macros.remove(&key);
        }
        self.push_key_image(key, None)
    }

    pub fn clear_key_configurations<I>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = usize>,
    {
        keys.into_iter()
            .try_for_each(|key| self.clear_key_configuration(key))
    }

    /// Clear every key that has images or a macro
    pub fn clear_all_key_configurations(&self) -> Result<()> {
        let keys = {
            let state = self.state();
            let mut keys: Vec<usize> = state
                .key_configs
                .keys()
                .chain(state.key_macros.keys())
                .copied()
                .collect();
            keys.sort_unstable();
            keys.dedup();
            keys
        };
        self.clear_key_configurations(keys)
    }

    /// Copy images and macro of `source` to `destination`
    ///
    /// Whatever `source` lacks is removed from `destination`, and the
    /// destination key shows the copied up image or goes blank.
    pub fn copy_key_configuration(&self, source: usize, destination: usize) -> Result<()> {
        self.check_key(source)?;
        self.check_key(destination)?;
        if source == destination {
            return Ok(());
        }
        let shown = {
            let mut state = self.state();
            let config = state.key_configs.get(&source).cloned();
            let action = state.key_macros.get(&source).cloned();
            let shown = config.as_ref().and_then(|c| c.up_image.clone());
            match config {
                Some(config) => state.key_configs.insert(destination, config),
                None => state.key_configs.remove(&destination),
            };
            match action {
                Some(action) => state.key_macros.insert(destination, action),
                None => state.key_macros.remove(&destination),
            };
            shown
        };
        self.push_key_image(destination, shown.as_deref())
    }

    pub fn move_key_configuration(&self, source: usize, destination: usize) -> Result<()> {
        if source == destination {
            return self.check_key(source);
        }
        self.copy_key_configuration(source, destination)?;
        self.clear_key_configuration(source)
    }

    /// Exchange images and macros of two keys and redraw both
    pub fn swap_key_configurations(&self, key_a: usize, key_b: usize) -> Result<()> {
        self.check_key(key_a)?;
        self.check_key(key_b)?;
        if key_a == key_b {
            return Ok(());
        }
        let _exclusive = self.device().exclusive();
        let (shown_a, shown_b) = {
            let mut state = self.state();
            let config_a = state.key_configs.remove(&key_a);
            let config_b = state.key_configs.remove(&key_b);
            let macro_a = state.key_macros.remove(&key_a);
            let macro_b = state.key_macros.remove(&key_b);

            let shown_a = config_b.as_ref().and_then(|c| c.up_image.clone());
            let shown_b = config_a.as_ref().and_then(|c| c.up_image.clone());
            if let Some(config) = config_a {
                state.key_configs.insert(key_b, config);
            }
            if let Some(config) = config_b {
                state.key_configs.insert(key_a, config);
            }
            if let Some(action) = macro_a {
                state.key_macros.insert(key_b, action);
            }
            if let Some(action) = macro_b {
                state.key_macros.insert(key_a, action);
            }
            (shown_a, shown_b)
        };
        self.push_key_image(key_b, shown_b.as_deref())?;
        self.push_key_image(key_a, shown_a.as_deref())
    }

    /// Push the stored up image of each key, blanking keys without one
    ///
    /// `None` refreshes every configured key.
    pub fn refresh_key_images(&self, keys: Option<&[usize]>) -> Result<()> {
        if !self.device().is_visual() {
            return Ok(());
        }
        let targets = match keys {
            Some(keys) => keys.to_vec(),
            None => self.configured_keys(),
        };
        for key in targets {
            self.check_key(key)?;
            let shown = self
                .state()
                .key_configs
                .get(&key)
                .and_then(|c| c.up_image.clone());
            self.push_key_image(key, shown.as_deref())?;
        }
        Ok(())
    }

    // === Key images ===

    /// Render `text` on a key's up (or down) image
    pub fn set_key_text(&self, key: usize, text: &str, pressed: bool) -> Result<()> {
        let params = if pressed {
            KeyConfiguration::new().down_text(text)
        } else {
            KeyConfiguration::new().up_text(text)
        };
        self.configure_key(key, params)
    }

    /// Show an image file on a key's up (or down) image
    pub fn set_key_image_file(&self, key: usize, path: impl AsRef<Path>, pressed: bool) -> Result<()> {
        let params = if pressed {
            KeyConfiguration::new().down_image(path.as_ref())
        } else {
            KeyConfiguration::new().up_image(path.as_ref())
        };
        self.configure_key(key, params)
    }

    /// Scale a bitmap onto a key
    pub fn set_key_image(&self, key: usize, image: &DynamicImage, pressed: bool) -> Result<()> {
        self.check_key(key)?;
        let device = self.device();
        let scaled = image_helpers::create_scaled_key_image(device, image, Margins::default(), BLACK)?;
        let native = image_helpers::to_native_key_format(device, &scaled)?;
        self.set_key_image_bytes(key, Some(native), pressed)
    }

    /// Store an already native image for a key
    ///
    /// Up images are pushed right away; down images appear on the next
    /// press.
    pub fn set_key_image_bytes(&self, key: usize, image: Option<Vec<u8>>, pressed: bool) -> Result<()> {
        self.check_key(key)?;
        let shown = store_key_image(&mut self.state().key_configs, key, image, pressed);
        if pressed {
            return Ok(());
        }
        self.push_key_image(key, shown.as_deref())
    }

    pub fn get_key_image(&self, key: usize, pressed: bool) -> Option<Vec<u8>> {
        self.state()
            .key_configs
            .get(&key)
            .and_then(|c| c.image(pressed).cloned())
    }

    pub fn has_key_image(&self, key: usize, pressed: bool) -> bool {
        self.state()
            .key_configs
            .get(&key)
            .is_some_and(|c| c.image(pressed).is_some())
    }

    /// Drop stored images without touching the macro
    ///
    /// `Some(pressed)` clears one state, `None` clears both. The key is
    /// blanked when its up image goes away.
    pub fn clear_key_image(&self, key: usize, pressed: Option<bool>) -> Result<()> {
        self.check_key(key)?;
        let blank = {
            let mut state = self.state();
            let Some(config) = state.key_configs.get_mut(&key) else {
                return Ok(());
            };
            let clear_up = pressed != Some(true);
            if clear_up {
                config.up_image = None;
            }
            if pressed != Some(false) {
                config.down_image = None;
            }
            if config.is_empty() {
                state.key_configs.remove(&key);
            }
            clear_up
        };
        if blank {
            self.push_key_image(key, None)?;
        }
        Ok(())
    }

    /// Copy one state's image; a missing source image clears the destination
    pub fn copy_key_image(&self, source: usize, destination: usize, pressed: bool) -> Result<()> {
        self.check_key(source)?;
        self.check_key(destination)?;
        if source == destination {
            return Ok(());
        }
        let image = self.get_key_image(source, pressed);
        self.set_key_image_bytes(destination, image, pressed)
    }

    pub fn move_key_image(&self, source: usize, destination: usize, pressed: bool) -> Result<()> {
        if source == destination {
            return self.check_key(source);
        }
        self.copy_key_image(source, destination, pressed)?;
        self.clear_key_image(source, Some(pressed))
    }

    pub fn swap_key_images(&self, key_a: usize, key_b: usize, pressed: bool) -> Result<()> {
        self.check_key(key_a)?;
        self.check_key(key_b)?;
        if key_a == key_b {
            return Ok(());
        }
        let _exclusive = self.device().exclusive();
        debug!("Swapping key images {} <-> {}", key_a, key_b);
        let (shown_a, shown_b) = {
            let mut state = self.state();
            let configs = &mut state.key_configs;
            let image_a = configs.get(&key_a).and_then(|c| c.image(pressed).cloned());
            let image_b = configs.get(&key_b).and_then(|c| c.image(pressed).cloned());
            let shown_a = store_key_image(configs, key_a, image_b, pressed);
            let shown_b = store_key_image(configs, key_b, image_a, pressed);
            (shown_a, shown_b)
        };
        if pressed {
            return Ok(());
        }
        self.push_key_image(key_a, shown_a.as_deref())?;
        self.push_key_image(key_b, shown_b.as_deref())
    }

    /// Snapshot of every key's stored images
    pub fn key_configurations(&self) -> HashMap<usize, KeyConfig> {
        self.state().key_configs.clone()
    }
}

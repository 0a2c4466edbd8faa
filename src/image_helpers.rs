//! Image building and conversion to device-native formats
//!
//! Images are built as RGBA bitmaps sized for one device surface (a key,
//! the touchscreen or the screen), then converted with
//! [`to_native_format`]: shrink to fit, rotate, mirror, encode.

use std::convert::Infallible;
use std::io::Cursor;
use std::path::Path;

use embedded_graphics::mono_font::ascii::FONT_10X20;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use macrodeck_transport::{DeckDevice, ImageEncoding, ImageFormat};

use crate::error::{DeckError, Result};

pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Margins in pixels around a scaled image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Margins {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Margins {
    pub const fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub const fn uniform(px: u32) -> Self {
        Self::new(px, px, px, px)
    }
}

/// Load an image file in any supported format
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    Ok(image::open(path)?)
}

/// Blank bitmap of the format's size
pub fn create_image(format: &ImageFormat, background: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(format.width(), format.height(), background)
}

fn key_format(device: &dyn DeckDevice) -> Result<ImageFormat> {
    let format = device.key_image_format();
    if !device.is_visual() || format.is_empty() {
        return Err(DeckError::NotVisual);
    }
    Ok(format)
}

fn touchscreen_format(device: &dyn DeckDevice) -> Result<ImageFormat> {
    match device.touchscreen_image_format() {
        Some(format) if device.is_touch() && !format.is_empty() => Ok(format),
        _ => Err(DeckError::NotTouch),
    }
}

fn screen_format(device: &dyn DeckDevice) -> Result<ImageFormat> {
    device
        .screen_image_format()
        .filter(|f| !f.is_empty())
        .ok_or_else(|| DeckError::InvalidParameter("device has no screen".into()))
}

pub fn create_key_image(device: &dyn DeckDevice, background: Rgba<u8>) -> Result<RgbaImage> {
    Ok(create_image(&key_format(device)?, background))
}

pub fn create_touchscreen_image(
    device: &dyn DeckDevice,
    background: Rgba<u8>,
) -> Result<RgbaImage> {
    Ok(create_image(&touchscreen_format(device)?, background))
}

pub fn create_screen_image(device: &dyn DeckDevice, background: Rgba<u8>) -> Result<RgbaImage> {
    Ok(create_image(&screen_format(device)?, background))
}

/// Size that fits `(width, height)` inside the bounds, keeping the aspect
/// ratio. Never enlarges.
fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let ratio = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let w = ((width as f64 * ratio).round() as u32).clamp(1, max_width.max(1));
    let h = ((height as f64 * ratio).round() as u32).clamp(1, max_height.max(1));
    (w, h)
}

fn shrink_to_fit(image: &RgbaImage, max_width: u32, max_height: u32) -> RgbaImage {
    let (w, h) = fit_within(image.width(), image.height(), max_width, max_height);
    if (w, h) == image.dimensions() {
        image.clone()
    } else {
        imageops::resize(image, w, h, FilterType::Lanczos3)
    }
}

/// Scale `image` down to fit the format inside `margins` and center it
///
/// Transparent regions of the source show the background.
pub fn scale_image(
    image: &DynamicImage,
    format: &ImageFormat,
    margins: Margins,
    background: Rgba<u8>,
) -> Result<RgbaImage> {
    let mut canvas = create_image(format, background);
    let max_width = canvas.width() as i64 - (margins.left + margins.right) as i64;
    let max_height = canvas.height() as i64 - (margins.top + margins.bottom) as i64;
    if max_width <= 0 || max_height <= 0 {
        return Err(DeckError::InvalidParameter(format!(
            "margins {:?} leave no room in a {}x{} image",
            margins,
            canvas.width(),
            canvas.height()
        )));
    }
    let (max_width, max_height) = (max_width as u32, max_height as u32);

    let thumbnail = shrink_to_fit(&image.to_rgba8(), max_width, max_height);
    let x = margins.left + (max_width - thumbnail.width()) / 2;
    let y = margins.top + (max_height - thumbnail.height()) / 2;
    imageops::overlay(&mut canvas, &thumbnail, x as i64, y as i64);
    Ok(canvas)
}

pub fn create_scaled_key_image(
    device: &dyn DeckDevice,
    image: &DynamicImage,
    margins: Margins,
    background: Rgba<u8>,
) -> Result<RgbaImage> {
    scale_image(image, &key_format(device)?, margins, background)
}

pub fn create_scaled_touchscreen_image(
    device: &dyn DeckDevice,
    image: &DynamicImage,
    margins: Margins,
    background: Rgba<u8>,
) -> Result<RgbaImage> {
    scale_image(image, &touchscreen_format(device)?, margins, background)
}

pub fn create_scaled_screen_image(
    device: &dyn DeckDevice,
    image: &DynamicImage,
    margins: Margins,
    background: Rgba<u8>,
) -> Result<RgbaImage> {
    scale_image(image, &screen_format(device)?, margins, background)
}

/// `DrawTarget` over an RGBA bitmap; out-of-bounds pixels are dropped
struct Canvas<'a>(&'a mut RgbaImage);

impl OriginDimensions for Canvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.0.width(), self.0.height())
    }
}

impl DrawTarget for Canvas<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> std::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (width, height) = self.0.dimensions();
        for Pixel(coord, color) in pixels {
            if coord.x >= 0 && coord.y >= 0 && (coord.x as u32) < width && (coord.y as u32) < height
            {
                self.0.put_pixel(
                    coord.x as u32,
                    coord.y as u32,
                    Rgba([color.r(), color.g(), color.b(), 255]),
                );
            }
        }
        Ok(())
    }
}

/// Draw `text` centered on the image
///
/// Multi-line text is split on `\n`. Characters outside ASCII render as
/// the font's replacement glyph.
pub fn draw_centered_text(image: &mut RgbaImage, text: &str, color: Rgba<u8>) {
    if text.is_empty() {
        return;
    }
    let character_style =
        MonoTextStyle::new(&FONT_10X20, Rgb888::new(color[0], color[1], color[2]));
    let text_style = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();
    let center = Point::new(image.width() as i32 / 2, image.height() as i32 / 2);
    let mut canvas = Canvas(image);
    let _ = Text::with_text_style(text, center, character_style, text_style).draw(&mut canvas);
}

/// Convert a bitmap to the device-native byte layout of `format`
///
/// Shrinks the image if its size differs, rotates counter-clockwise by
/// `format.rotation`, mirrors per `format.flip`, then encodes (JPEG at
/// full quality).
pub fn to_native_format(image: &RgbaImage, format: &ImageFormat) -> Result<Vec<u8>> {
    if format.is_empty() {
        return Err(DeckError::NotVisual);
    }
    let mut image = if image.dimensions() != format.size {
        DynamicImage::ImageRgba8(shrink_to_fit(image, format.width(), format.height()))
    } else {
        DynamicImage::ImageRgba8(image.clone())
    };

    image = match format.rotation % 360 {
        0 => image,
        90 => image.rotate270(),
        180 => image.rotate180(),
        270 => image.rotate90(),
        other => {
            return Err(DeckError::InvalidParameter(format!(
                "unsupported rotation {other}"
            )))
        }
    };
    if format.flip.0 {
        image = image.fliph();
    }
    if format.flip.1 {
        image = image.flipv();
    }

    let mut buf = Vec::new();
    match format.encoding {
        ImageEncoding::Jpeg => {
            JpegEncoder::new_with_quality(&mut buf, 100).encode_image(&image.to_rgb8())?;
        }
        ImageEncoding::Bmp => {
            DynamicImage::ImageRgb8(image.to_rgb8())
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Bmp)?;
        }
        ImageEncoding::Png => {
            image.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        }
    }
    Ok(buf)
}

pub fn to_native_key_format(device: &dyn DeckDevice, image: &RgbaImage) -> Result<Vec<u8>> {
    to_native_format(image, &key_format(device)?)
}

pub fn to_native_touchscreen_format(
    device: &dyn DeckDevice,
    image: &RgbaImage,
) -> Result<Vec<u8>> {
    to_native_format(image, &touchscreen_format(device)?)
}

pub fn to_native_screen_format(device: &dyn DeckDevice, image: &RgbaImage) -> Result<Vec<u8>> {
    to_native_format(image, &screen_format(device)?)
}

/// Pixel size of the whole key surface, including gaps between keys
pub fn deck_surface_size(device: &dyn DeckDevice, key_spacing: (u32, u32)) -> Result<(u32, u32)> {
    let format = key_format(device)?;
    let layout = device.key_layout();
    let (rows, cols) = (layout.rows as u32, layout.cols as u32);
    let width = format.width() * cols + key_spacing.0 * cols.saturating_sub(1);
    let height = format.height() * rows + key_spacing.1 * rows.saturating_sub(1);
    Ok((width, height))
}

/// Resize and crop `image` to cover the whole key surface
pub fn create_deck_sized_image(
    device: &dyn DeckDevice,
    image: &DynamicImage,
    key_spacing: (u32, u32),
) -> Result<RgbaImage> {
    let (width, height) = deck_surface_size(device, key_spacing)?;
    if width == 0 || height == 0 {
        return Err(DeckError::InvalidParameter("device has no keys".into()));
    }
    Ok(image
        .resize_to_fill(width, height, FilterType::Lanczos3)
        .to_rgba8())
}

/// Cut a deck-sized image into native key images, indexed by key
///
/// Pixels under the gaps between keys are skipped. Tiles that extend past
/// the source image are padded with black.
pub fn split_deck_image(
    device: &dyn DeckDevice,
    deck_image: &RgbaImage,
    key_spacing: (u32, u32),
) -> Result<Vec<Vec<u8>>> {
    let format = key_format(device)?;
    let cols = device.key_layout().cols.max(1);
    let (key_width, key_height) = format.size;

    (0..device.key_count())
        .map(|key| {
            let (row, col) = ((key / cols) as u32, (key % cols) as u32);
            let x = col * (key_width + key_spacing.0);
            let y = row * (key_height + key_spacing.1);
            let tile = imageops::crop_imm(deck_image, x, y, key_width, key_height).to_image();
            let mut key_image = create_image(&format, BLACK);
            imageops::replace(&mut key_image, &tile, 0, 0);
            to_native_format(&key_image, &format)
        })
        .collect()
}

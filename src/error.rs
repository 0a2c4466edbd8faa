//! Controller error types

use macrodeck_transport::TransportError;
use thiserror::Error;

/// Errors from controller operations
#[derive(Error, Debug)]
pub enum DeckError {
    /// Device layer error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Board coordinate outside the grid
    #[error("Invalid board position ({row}, {col})")]
    InvalidPosition { row: usize, col: usize },

    /// Key index outside the device's key range
    #[error("Invalid key index: {0}")]
    InvalidKey(usize),

    #[error("Board not initialised")]
    BoardNotInitialised,

    #[error("Image board not initialised")]
    ImageBoardNotInitialised,

    /// Image operation on a device without key displays
    #[error("Device has no key displays")]
    NotVisual,

    /// Touchscreen operation on a device without a touch strip
    #[error("Device has no touchscreen")]
    NotTouch,

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Profile parse error: {0}")]
    ProfileParse(#[from] toml::de::Error),

    #[error("Profile serialize error: {0}")]
    ProfileSerialize(#[from] toml::ser::Error),
}

/// Result alias for controller operations
pub type Result<T> = std::result::Result<T, DeckError>;

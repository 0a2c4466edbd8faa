//! Image board: one native image per key

use image::DynamicImage;
use tracing::debug;

use super::{ImageBoard, MacroDeck};
use crate::board::Grid;
use crate::error::{DeckError, Result};
use crate::image_helpers;

type Cell = Option<Vec<u8>>;

impl MacroDeck {
    fn new_image_board(&self, fill: Cell) -> ImageBoard {
        let layout = self.key_layout();
        Grid::new(layout.rows, layout.cols, fill)
    }

    /// Push rows of native images across the keys without storing them
    ///
    /// Short or missing rows blank their keys. No-op on devices without
    /// key displays.
    pub fn display_image_board(&self, board: &[Vec<Cell>]) -> Result<()> {
        if !self.device().is_visual() {
            return Ok(());
        }
        let layout = self.key_layout();
        for row in 0..layout.rows {
            for col in 0..layout.cols {
                let image = board.get(row).and_then(|r| r.get(col)).cloned().flatten();
                self.push_key_image(row * layout.cols + col, image.as_deref())?;
            }
        }
        Ok(())
    }

    fn install_image_board(&self, board: ImageBoard) -> Result<()> {
        let rows = board.to_rows();
        self.state().image_board = Some(board);
        self.display_image_board(&rows)
    }

    /// Create an image board filled with `fill` and draw it
    pub fn create_image_board(&self, fill: Cell) -> Result<()> {
        debug!("Creating image board");
        self.install_image_board(self.new_image_board(fill))
    }

    /// Fill the image board with `fill` and redraw it, creating it if needed
    pub fn clear_image_board(&self, fill: Cell) -> Result<()> {
        self.install_image_board(self.new_image_board(fill))
    }

    fn ensure_image_board(&self) -> Result<()> {
        if self.state().image_board.is_none() {
            self.create_image_board(None)?;
        }
        Ok(())
    }

    /// Set one cell, creating a blank image board first if there is none
    pub fn set_board_image(&self, row: usize, col: usize, image: Cell) -> Result<()> {
        self.ensure_image_board()?;
        let key = {
            let mut state = self.state();
            let board = state
                .image_board
                .as_mut()
                .ok_or(DeckError::ImageBoardNotInitialised)?;
            board.set(row, col, image.clone())?;
            row * board.cols() + col
        };
        self.push_key_image(key, image.as_deref())
    }

    pub fn get_board_image(&self, row: usize, col: usize) -> Result<Cell> {
        let state = self.state();
        let board = state
            .image_board
            .as_ref()
            .ok_or(DeckError::ImageBoardNotInitialised)?;
        board.get(row, col).cloned()
    }

    /// Copy of the image board
    pub fn get_image_board(&self) -> Result<ImageBoard> {
        self.state()
            .image_board
            .clone()
            .ok_or(DeckError::ImageBoardNotInitialised)
    }

    /// Push every cell again; no-op without an image board
    pub fn refresh_image_board(&self) -> Result<()> {
        let rows = match &self.state().image_board {
            Some(board) => board.to_rows(),
            None => return Ok(()),
        };
        self.display_image_board(&rows)
    }

    /// Paste rows of images with their top-left corner at `(top, left)`
    ///
    /// Cells off the board are dropped.
    pub fn overlay_image_board(&self, board: &[Vec<Cell>], top: i32, left: i32) -> Result<()> {
        self.ensure_image_board()?;
        let written: Vec<(usize, Cell)> = {
            let mut state = self.state();
            let grid = state
                .image_board
                .as_mut()
                .ok_or(DeckError::ImageBoardNotInitialised)?;
            let mut written = Vec::new();
            for (r, row) in board.iter().enumerate() {
                for (c, image) in row.iter().enumerate() {
                    let Some((rr, cc)) =
                        grid.clip(top as i64 + r as i64, left as i64 + c as i64)
                    else {
                        continue;
                    };
                    grid.set(rr, cc, image.clone())?;
                    written.push((rr * grid.cols() + cc, image.clone()));
                }
            }
            written
        };
        for (key, image) in written {
            self.push_key_image(key, image.as_deref())?;
        }
        Ok(())
    }

    /// Shift the image board by `(dx, dy)` and redraw it
    ///
    /// Without an image board this only creates one filled with `fill`.
    pub fn scroll_image_board(&self, dx: i32, dy: i32, fill: Cell) -> Result<()> {
        if self.state().image_board.is_none() {
            return self.create_image_board(fill);
        }
        {
            let mut state = self.state();
            let board = state
                .image_board
                .as_mut()
                .ok_or(DeckError::ImageBoardNotInitialised)?;
            *board = board.scrolled(dx, dy, fill);
        }
        self.refresh_image_board()
    }

    /// Stretch one bitmap across all keys
    ///
    /// The image is scaled and cropped to the key surface (keys plus
    /// `key_spacing` gaps), cut into tiles, pushed, and becomes the new
    /// image board.
    pub fn display_deck_image(&self, image: &DynamicImage, key_spacing: (u32, u32)) -> Result<()> {
        let device = self.device();
        let deck_image = image_helpers::create_deck_sized_image(device, image, key_spacing)?;
        let tiles = image_helpers::split_deck_image(device, &deck_image, key_spacing)?;

        let layout = self.key_layout();
        let mut board = self.new_image_board(None);
        {
            let _exclusive = device.exclusive();
            for (key, tile) in tiles.into_iter().enumerate() {
                self.push_key_image(key, Some(&tile))?;
                board.set(key / layout.cols, key % layout.cols, Some(tile))?;
            }
        }
        self.state().image_board = Some(board);
        Ok(())
    }
}

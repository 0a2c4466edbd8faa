//! Character board: one character per key, drawn as key text

use tracing::debug;

use super::{CharBoard, MacroDeck};
use crate::board::{line_points, rect_area, rect_outline, Grid};
use crate::error::{DeckError, Result};

const DEFAULT_FILL: char = ' ';

impl MacroDeck {
    fn new_board(&self, fill: char) -> CharBoard {
        let layout = self.key_layout();
        Grid::new(layout.rows, layout.cols, fill)
    }

    /// Show one board cell as the key's up text
    ///
    /// Only the logical board changes on devices without key displays.
    fn show_char(&self, key: usize, ch: Option<char>) -> Result<()> {
        if !self.device().is_visual() {
            return Ok(());
        }
        let text = ch.map(String::from).unwrap_or_default();
        self.set_key_text(key, &text, false)
    }

    /// Render rows of characters across the keys without storing them
    ///
    /// Short or missing rows show blank keys.
    pub fn display_board(&self, board: &[Vec<char>]) -> Result<()> {
        let layout = self.key_layout();
        for row in 0..layout.rows {
            for col in 0..layout.cols {
                let ch = board.get(row).and_then(|r| r.get(col)).copied();
                self.show_char(row * layout.cols + col, ch)?;
            }
        }
        Ok(())
    }

    /// Render lines of text, one line per key row
    pub fn display_text<S: AsRef<str>>(&self, lines: &[S]) -> Result<()> {
        let rows: Vec<Vec<char>> = lines.iter().map(|l| l.as_ref().chars().collect()).collect();
        self.display_board(&rows)
    }

    fn install_board(&self, board: CharBoard) -> Result<()> {
        let rows = board.to_rows();
        self.state().board = Some(board);
        self.display_board(&rows)
    }

    /// Create a board filled with `fill` and draw it
    pub fn create_board(&self, fill: char) -> Result<()> {
        debug!("Creating character board");
        self.install_board(self.new_board(fill))
    }

    /// Create a board from text lines, padded with `fill`
    pub fn create_board_from_strings<S: AsRef<str>>(&self, lines: &[S], fill: char) -> Result<()> {
        let layout = self.key_layout();
        self.install_board(Grid::from_strings(layout.rows, layout.cols, lines, fill))
    }

    /// Fill the board with `fill` and redraw it, creating it if needed
    pub fn clear_board(&self, fill: char) -> Result<()> {
        self.install_board(self.new_board(fill))
    }

    fn ensure_board(&self) -> Result<()> {
        if self.state().board.is_none() {
            self.create_board(DEFAULT_FILL)?;
        }
        Ok(())
    }

    /// Write cells given in signed coordinates, dropping those off the
    /// board, then show each written cell once with its final value
    fn write_cells<I>(&self, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = ((i64, i64), char)>,
    {
        self.ensure_board()?;
        let written: Vec<(usize, char)> = {
            let mut state = self.state();
            let board = state.board.as_mut().ok_or(DeckError::BoardNotInitialised)?;
            let mut written: Vec<(usize, char)> = Vec::new();
            for ((row, col), ch) in cells {
                let Some((r, c)) = board.clip(row, col) else {
                    continue;
                };
                board.set(r, c, ch)?;
                let key = r * board.cols() + c;
                match written.iter_mut().find(|(k, _)| *k == key) {
                    Some(slot) => slot.1 = ch,
                    None => written.push((key, ch)),
                }
            }
            written
        };
        for (key, ch) in written {
            self.show_char(key, Some(ch))?;
        }
        Ok(())
    }

    /// Set one cell, creating a blank board first if there is none
    pub fn set_board_char(&self, row: usize, col: usize, ch: char) -> Result<()> {
        self.ensure_board()?;
        let key = {
            let mut state = self.state();
            let board = state.board.as_mut().ok_or(DeckError::BoardNotInitialised)?;
            board.set(row, col, ch)?;
            row * board.cols() + col
        };
        self.show_char(key, Some(ch))
    }

    pub fn get_board_char(&self, row: usize, col: usize) -> Result<char> {
        let state = self.state();
        let board = state.board.as_ref().ok_or(DeckError::BoardNotInitialised)?;
        board.get(row, col).copied()
    }

    /// Copy of the board
    pub fn get_board(&self) -> Result<CharBoard> {
        self.state()
            .board
            .clone()
            .ok_or(DeckError::BoardNotInitialised)
    }

    pub fn get_board_as_strings(&self) -> Result<Vec<String>> {
        let state = self.state();
        let board = state.board.as_ref().ok_or(DeckError::BoardNotInitialised)?;
        Ok(board.to_strings())
    }

    /// Redraw every cell; no-op without a board
    pub fn refresh_board(&self) -> Result<()> {
        let rows = match &self.state().board {
            Some(board) => board.to_rows(),
            None => return Ok(()),
        };
        self.display_board(&rows)
    }

    /// Draw `text` rightwards from `(row, col)`, clipped to the board
    pub fn draw_text(&self, row: i32, col: i32, text: &str) -> Result<()> {
        let row = row as i64;
        self.write_cells(
            text.chars()
                .enumerate()
                .map(|(i, ch)| ((row, col as i64 + i as i64), ch)),
        )
    }

    /// Draw lines of text with the top-left corner at `(top, left)`
    pub fn draw_multiline_text<S: AsRef<str>>(&self, top: i32, left: i32, lines: &[S]) -> Result<()> {
        let cells: Vec<_> = lines
            .iter()
            .enumerate()
            .flat_map(|(r, line)| {
                line.as_ref()
                    .chars()
                    .enumerate()
                    .map(move |(c, ch)| ((top as i64 + r as i64, left as i64 + c as i64), ch))
                    .collect::<Vec<_>>()
            })
            .collect();
        self.write_cells(cells)
    }

    /// Paste rows of characters with their top-left corner at `(top, left)`
    pub fn overlay_board(&self, board: &[Vec<char>], top: i32, left: i32) -> Result<()> {
        let cells = board.iter().enumerate().flat_map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(move |(c, &ch)| ((top as i64 + r as i64, left as i64 + c as i64), ch))
        });
        self.write_cells(cells)
    }

    /// Shift the board contents by `(dx, dy)` and redraw it
    ///
    /// Vacated cells take `fill`; contents shifted off the board are lost.
    pub fn scroll_board(&self, dx: i32, dy: i32, fill: char) -> Result<()> {
        if self.state().board.is_none() {
            self.create_board(fill)?;
        }
        {
            let mut state = self.state();
            let board = state.board.as_mut().ok_or(DeckError::BoardNotInitialised)?;
            *board = board.scrolled(dx, dy, fill);
        }
        self.refresh_board()
    }

    /// Draw the border of a rectangle
    ///
    /// Each border cell is written on its own; a rectangle one cell tall
    /// or wide draws as a single row or column.
    pub fn draw_rect(&self, top: i32, left: i32, height: i32, width: i32, ch: char) -> Result<()> {
        self.write_cells(rect_outline(top, left, height, width).into_iter().map(|p| (p, ch)))
    }

    pub fn fill_rect(&self, top: i32, left: i32, height: i32, width: i32, ch: char) -> Result<()> {
        self.write_cells(rect_area(top, left, height, width).into_iter().map(|p| (p, ch)))
    }

    /// Draw a straight line between two cells, both ends included
    pub fn draw_line(
        &self,
        start_row: i32,
        start_col: i32,
        end_row: i32,
        end_col: i32,
        ch: char,
    ) -> Result<()> {
        self.write_cells(
            line_points(start_row, start_col, end_row, end_col)
                .into_iter()
                .map(|p| (p, ch)),
        )
    }
}

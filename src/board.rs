//! Fixed-size grids mirroring the key layout
//!
//! `Grid` holds one cell per key in row-major order. Drawing helpers
//! produce the cells a shape touches; callers clip them against the grid
//! and write each one independently.

use crate::error::{DeckError, Result};

/// Row-major grid of `rows * cols` cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Grid with every cell set to `fill`
    pub fn new(rows: usize, cols: usize, fill: T) -> Self {
        Self {
            rows,
            cols,
            cells: vec![fill; rows * cols],
        }
    }

    /// Build a grid from nested rows
    ///
    /// Missing cells take `fill`; cells beyond the grid are ignored.
    pub fn from_rows<R>(rows: usize, cols: usize, data: &[R], fill: T) -> Self
    where
        R: AsRef<[T]>,
    {
        let mut grid = Self::new(rows, cols, fill);
        for (r, row) in data.iter().take(rows).enumerate() {
            for (c, cell) in row.as_ref().iter().take(cols).enumerate() {
                grid.cells[r * cols + c] = cell.clone();
            }
        }
        grid
    }

    /// Reset every cell to `fill`
    pub fn fill(&mut self, fill: T) {
        self.cells.iter_mut().for_each(|cell| *cell = fill.clone());
    }

    /// Grid whose contents are shifted by `(dx, dy)`
    ///
    /// The cell at `(r, c)` moves to `(r + dy, c + dx)`; cells shifted
    /// off the grid are dropped and vacated cells take `fill`.
    pub fn scrolled(&self, dx: i32, dy: i32, fill: T) -> Self {
        let mut next = Self::new(self.rows, self.cols, fill);
        for (row, col, cell) in self.iter() {
            if let Some((r, c)) = self.clip(row as i64 + dy as i64, col as i64 + dx as i64) {
                next.cells[r * self.cols + c] = cell.clone();
            }
        }
        next
    }

    /// Nested copy of the rows
    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.cells.chunks(self.cols.max(1)).map(<[T]>::to_vec).collect()
    }
}

impl<T> Grid<T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn check(&self, row: usize, col: usize) -> Result<usize> {
        if row < self.rows && col < self.cols {
            Ok(row * self.cols + col)
        } else {
            Err(DeckError::InvalidPosition { row, col })
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<&T> {
        let idx = self.check(row, col)?;
        Ok(&self.cells[idx])
    }

    /// Replace a cell, returning the previous value
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<T> {
        let idx = self.check(row, col)?;
        Ok(std::mem::replace(&mut self.cells[idx], value))
    }

    /// Map signed coordinates to a cell position, or `None` if outside
    pub fn clip(&self, row: i64, col: i64) -> Option<(usize, usize)> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        (row < self.rows && col < self.cols).then_some((row, col))
    }

    /// Cells in row-major order with their positions
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let cols = self.cols.max(1);
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (i / cols, i % cols, cell))
    }
}

impl Grid<char> {
    /// Character grid from text lines, padded with `fill`
    pub fn from_strings<S: AsRef<str>>(rows: usize, cols: usize, lines: &[S], fill: char) -> Self {
        let chars: Vec<Vec<char>> = lines.iter().map(|l| l.as_ref().chars().collect()).collect();
        Self::from_rows(rows, cols, &chars, fill)
    }

    /// One string per row
    pub fn to_strings(&self) -> Vec<String> {
        self.cells
            .chunks(self.cols.max(1))
            .map(|row| row.iter().collect())
            .collect()
    }
}

/// Cells on the border of a rectangle, in drawing order
///
/// Left and right edges are emitted row by row, then top and bottom
/// edges column by column. Corners appear more than once, and a
/// rectangle one cell wide or tall emits its cells twice. Empty when
/// `height` or `width` is not positive.
pub fn rect_outline(top: i32, left: i32, height: i32, width: i32) -> Vec<(i64, i64)> {
    let (top, left, height, width) = (top as i64, left as i64, height as i64, width as i64);
    let mut cells = Vec::new();
    if height <= 0 || width <= 0 {
        return cells;
    }
    let right = left + width - 1;
    let bottom = top + height - 1;
    for r in top..top + height {
        cells.push((r, left));
        cells.push((r, right));
    }
    for c in left..left + width {
        cells.push((top, c));
        cells.push((bottom, c));
    }
    cells
}

/// Every cell of a rectangle, row-major
pub fn rect_area(top: i32, left: i32, height: i32, width: i32) -> Vec<(i64, i64)> {
    let (top, left, height, width) = (top as i64, left as i64, height as i64, width as i64);
    (top..top + height.max(0))
        .flat_map(|r| (left..left + width.max(0)).map(move |c| (r, c)))
        .collect()
}

/// Cells sampled along a straight line, endpoints included
///
/// Takes `max(|dr|, |dc|) + 1` samples by linear interpolation, each
/// rounded to the nearest cell (ties to even). A zero-length line is the
/// start cell.
pub fn line_points(start_row: i32, start_col: i32, end_row: i32, end_col: i32) -> Vec<(i64, i64)> {
    let (r0, c0) = (start_row as i64, start_col as i64);
    let dr = end_row as i64 - r0;
    let dc = end_col as i64 - c0;
    let steps = dr.abs().max(dc.abs());
    if steps == 0 {
        return vec![(r0, c0)];
    }
    (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            let r = (r0 as f64 + dr as f64 * t).round_ties_even() as i64;
            let c = (c0 as f64 + dc as f64 * t).round_ties_even() as i64;
            (r, c)
        })
        .collect()
}

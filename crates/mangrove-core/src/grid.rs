/// Grid partitioning of an image and click-to-cell mapping.
/// Cell sizes use floor division, so a remainder strip on the right and
/// bottom edges belongs to no slice.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Number of columns (`i`) and rows (`j`) in a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    pub cols: u32,
    pub rows: u32,
}

impl GridShape {
    /// The 2×2 grid used by the labeling workflow.
    pub const QUAD: GridShape = GridShape { cols: 2, rows: 2 };

    pub fn new(cols: u32, rows: u32) -> Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(PipelineError::InvalidGrid { cols, rows });
        }
        Ok(Self { cols, rows })
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

impl Default for GridShape {
    fn default() -> Self {
        Self::QUAD
    }
}

/// A grid cell address: column `c`, row `r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellCoord {
    pub col: u32,
    pub row: u32,
}

impl CellCoord {
    pub fn new(col: u32, row: u32) -> Self {
        Self { col, row }
    }
}

/// Pixel rectangle of one cell, half-open on the right and bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    /// Integer centre pixel of the rectangle.
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// A grid shape bound to concrete image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    width: u32,
    height: u32,
    shape: GridShape,
    cell_width: u32,
    cell_height: u32,
}

impl GridLayout {
    /// Bind `shape` to a `width × height` image.
    ///
    /// Images narrower than `cols` or shorter than `rows` would produce
    /// zero-size cells and are rejected.
    pub fn new(width: u32, height: u32, shape: GridShape) -> Result<Self> {
        let shape = GridShape::new(shape.cols, shape.rows)?;
        if width < shape.cols || height < shape.rows {
            return Err(PipelineError::ImageTooSmall {
                width,
                height,
                cols: shape.cols,
                rows: shape.rows,
            });
        }
        Ok(Self {
            width,
            height,
            shape,
            cell_width: width / shape.cols,
            cell_height: height / shape.rows,
        })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Pixel rectangle of `cell`: columns `[cw·c, cw·(c+1))`, rows `[rh·r, rh·(r+1))`.
    pub fn cell_rect(&self, cell: CellCoord) -> CellRect {
        CellRect {
            x: self.cell_width * cell.col,
            y: self.cell_height * cell.row,
            width: self.cell_width,
            height: self.cell_height,
        }
    }

    /// Every cell of the grid exactly once, column-major.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let rows = self.shape.rows;
        (0..self.shape.cols).flat_map(move |c| (0..rows).map(move |r| CellCoord::new(c, r)))
    }

    /// Extent covered by the union of all cells: `(⌊W/i⌋·i, ⌊H/j⌋·j)`.
    pub fn covered(&self) -> (u32, u32) {
        (self.cell_width * self.shape.cols, self.cell_height * self.shape.rows)
    }

    /// Interior boundary positions `(xs, ys)` where guide lines are drawn.
    pub fn boundaries(&self) -> (Vec<u32>, Vec<u32>) {
        let xs = (1..self.shape.cols).map(|c| c * self.cell_width).collect();
        let ys = (1..self.shape.rows).map(|r| r * self.cell_height).collect();
        (xs, ys)
    }

    /// Map a pointer position to the cell under it.
    ///
    /// Positions outside `[0, W) × [0, H)` map to `None`. Inside the image the
    /// result always lies in `[0, i) × [0, j)`; the remainder strip maps to
    /// the last column/row.
    pub fn map_click(&self, x: i64, y: i64) -> Option<CellCoord> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        let col = (x as u32 / self.cell_width).min(self.shape.cols - 1);
        let row = (y as u32 / self.cell_height).min(self.shape.rows - 1);
        Some(CellCoord::new(col, row))
    }
}

/// Map a click on an image of `(width, height)` to a cell of `shape`.
///
/// Returns `None` when the click is outside the image or the image is too
/// small for the grid.
pub fn map_click(click: (i64, i64), dims: (u32, u32), shape: GridShape) -> Option<CellCoord> {
    GridLayout::new(dims.0, dims.1, shape).ok()?.map_click(click.0, click.1)
}

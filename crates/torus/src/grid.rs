use crate::{ALIVE, Band, Cell, DEAD, Error, Result};


/// Computes one generation for the rows `[start_row, end_row)` of a toroidal
/// grid.
///
/// `cells` is the *entire* current grid in row-major order (`height` rows of
/// `width` bytes); neighbours are looked up with wraparound on both axes. The
/// returned buffer holds `(end_row - start_row) * width` bytes and belongs to
/// the caller.
///
/// Rules: a dead cell with exactly three live neighbours becomes [`ALIVE`]; a
/// live cell with fewer than two or more than three becomes [`DEAD`]; every
/// other cell keeps its byte.
///
/// The function only reads `cells` and writes its own output, so disjoint
/// bands may be evaluated in parallel and concatenated in band order.
///
/// # Panics
///
/// Panics if `cells` is shorter than `width * height` or the band does not lie
/// within `[0, height]`. Use [`Grid::next_band`] for a checked variant.
pub fn next_band(
    cells: &[u8],
    start_row: usize,
    end_row: usize,
    height: usize,
    width: usize,
) -> Vec<u8> {
    assert!(cells.len() >= width * height, "grid buffer too short");
    assert!(start_row <= end_row && end_row <= height, "band out of range");

    let mut out = Vec::with_capacity((end_row - start_row) * width);

    for row in start_row..end_row {
        // Row offsets of the rows above, at and below `row`, wrapped.
        let above = ((row + height - 1) % height) * width;
        let here = row * width;
        let below = ((row + 1) % height) * width;

        for col in 0..width {
            let left = (col + width - 1) % width;
            let right = (col + 1) % width;

            let neighbours = [
                above + left,
                above + col,
                above + right,
                here + left,
                here + right,
                below + left,
                below + col,
                below + right,
            ]
            .into_iter()
            .filter(|&idx| cells[idx] == ALIVE)
            .count();

            let state = cells[here + col];
            let next = match (state == ALIVE, neighbours) {
                (false, 3) => ALIVE,
                (true, n) if !(2..=3).contains(&n) => DEAD,
                _ => state,
            };
            out.push(next);
        }
    }

    out
}

/// A rectangular, toroidal grid of cell bytes stored row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<u8>,
}

impl Grid {
    /// Wraps a row-major cell buffer.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyGrid`] if either dimension is zero.
    /// - [`Error::DimensionMismatch`] if `cells.len() != width * height`.
    pub fn new(width: usize, height: usize, cells: Vec<u8>) -> Result<Self> {
        let expected = cell_count(width, height, cells.len())?;
        if cells.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// An all-dead grid.
    pub fn dead(width: usize, height: usize) -> Result<Self> {
        let len = cell_count(width, height, 0)?;
        Self::new(width, height, vec![DEAD; len])
    }

    /// A dead grid with the given cells set alive. Coordinates wrap.
    pub fn with_alive(
        width: usize,
        height: usize,
        alive: impl IntoIterator<Item = Cell>,
    ) -> Result<Self> {
        let mut grid = Self::dead(width, height)?;
        for cell in alive {
            let idx = (cell.y % height) * width + (cell.x % width);
            grid.cells[idx] = ALIVE;
        }
        Ok(grid)
    }

    /// Reassembles a grid from band outputs given in band-index order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the bands do not add up to
    /// exactly `width * height` cells.
    pub fn from_bands<B>(width: usize, height: usize, bands: impl IntoIterator<Item = B>) -> Result<Self>
    where
        B: AsRef<[u8]>,
    {
        let mut cells = Vec::with_capacity(width * height);
        for band in bands {
            cells.extend_from_slice(band.as_ref());
        }
        Self::new(width, height, cells)
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<u8> {
        self.cells
    }

    /// Byte at column `x`, row `y`, with wraparound.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.cells[(y % self.height) * self.width + (x % self.width)]
    }

    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        self.get(x, y) == ALIVE
    }

    /// Next generation for the rows of `band`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBand`] if the band is empty or extends past the
    /// last row.
    pub fn next_band(&self, band: &Band) -> Result<Vec<u8>> {
        if !band.fits(self.height) {
            return Err(Error::InvalidBand {
                start: band.start,
                end: band.end,
                height: self.height,
            });
        }
        Ok(next_band(
            &self.cells,
            band.start,
            band.end,
            self.height,
            self.width,
        ))
    }

    /// Next generation of the whole grid, computed as a single band.
    pub fn step(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            cells: next_band(&self.cells, 0, self.height, self.height, self.width),
        }
    }

    pub fn alive_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == ALIVE).count()
    }

    /// Coordinates of every live cell, row by row.
    pub fn alive_cells(&self) -> Vec<Cell> {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == ALIVE)
            .map(|(idx, _)| Cell::new(idx % self.width, idx / self.width))
            .collect()
    }
}

/// `width * height`, rejecting zero dimensions and overflow. `actual` is only
/// used to fill in the error.
fn cell_count(width: usize, height: usize, actual: usize) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(Error::EmptyGrid { width, height });
    }
    width.checked_mul(height).ok_or(Error::DimensionMismatch {
        expected: usize::MAX,
        actual,
    })
}

impl AsRef<[u8]> for Grid {
    fn as_ref(&self) -> &[u8] {
        &self.cells
    }
}

use core::fmt;

/// Byte stored for a live cell.
pub const ALIVE: u8 = 255;

/// Byte stored for a dead cell.
pub const DEAD: u8 = 0;

/// Coordinates of a single cell: `x` is the column, `y` the row.
///
/// Only used for reporting. Grids store cells as flat row-major bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub x: usize,
    pub y: usize,
}

impl Cell {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

//! # Wire Grid Conversions and Protocol Constants
//!
//! Grids cross the wire as a flat row-major byte string plus `u32` width and
//! height. This module converts between that representation and
//! [`torus::Grid`], validating dimensions on the way in.

use crate::Error;
use bytes::Bytes;
use torus::Grid;

/// Default broker listen port.
pub const DEFAULT_BROKER_PORT: u16 = 8030;

/// Default listen port of the first worker; further workers count up from it.
pub const DEFAULT_WORKER_PORT: u16 = 8031;

/// Number of workers a default broker configuration expects.
pub const DEFAULT_WORKER_COUNT: u16 = 8;

/// Builds a grid from wire fields.
///
/// # Errors
///
/// Returns [`Error::Grid`] if the dimensions are zero or do not match the
/// byte length.
pub fn grid_from_wire(width: u32, height: u32, cells: &Bytes) -> Result<Grid, Error> {
    Ok(Grid::new(width as usize, height as usize, cells.to_vec())?)
}

/// Splits a grid into the `(bytes, width, height)` triple used on the wire.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if a dimension does not fit in `u32`.
pub fn grid_to_wire(grid: &Grid) -> Result<(Bytes, u32, u32), Error> {
    let (Ok(width), Ok(height)) = (u32::try_from(grid.width()), u32::try_from(grid.height()))
    else {
        return Err(Error::InvalidRequest {
            reason: format!(
                "grid {}x{} exceeds wire dimensions",
                grid.width(),
                grid.height()
            ),
        });
    };
    Ok((Bytes::copy_from_slice(grid.cells()), width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use torus::{Cell, DEAD};

    #[test]
    fn wire_conversion_preserves_grid() {
        let grid = Grid::with_alive(6, 4, [Cell::new(5, 3), Cell::new(0, 1)]).unwrap();
        let (bytes, width, height) = grid_to_wire(&grid).unwrap();
        assert_eq!((width, height), (6, 4));
        assert_eq!(grid_from_wire(width, height, &bytes).unwrap(), grid);
    }

    #[test]
    fn wire_conversion_rejects_mismatched_length() {
        let bytes = Bytes::from(vec![DEAD; 5]);
        let err = grid_from_wire(2, 2, &bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Grid(torus::Error::DimensionMismatch {
                expected: 4,
                actual: 5
            })
        ));
    }
}

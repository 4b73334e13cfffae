/// Result alias used throughout `torus`.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `torus` can emit.
///
/// The generation step itself is total over a well-formed grid; errors only
/// arise when a grid is assembled from untrusted bytes or dimensions.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The byte buffer does not hold exactly `width * height` cells.
    #[error("expected {expected} cells for the grid, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Width or height is zero.
    #[error("grid dimensions must be non-zero (width {width}, height {height})")]
    EmptyGrid { width: usize, height: usize },

    /// A band does not fit inside the grid or is empty.
    #[error("band [{start}, {end}) is not a valid row range for height {height}")]
    InvalidBand {
        start: usize,
        end: usize,
        height: usize,
    },

    /// A PGM image could not be parsed or does not match its header.
    #[error("malformed PGM image: {reason}")]
    Pgm { reason: String },

    /// The band thread pool could not be started.
    #[cfg(feature = "parallel")]
    #[error("failed to start band threads: {reason}")]
    ThreadPool { reason: String },
}

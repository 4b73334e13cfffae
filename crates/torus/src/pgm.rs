//! Binary greymap (`P5`) codec for grids.
//!
//! Each cell is one byte of pixel data, so a grid written with [`encode`] and
//! read back with [`decode`] is byte-for-byte identical. Only `maxval` 255 is
//! accepted; anything wider would need two bytes per sample.

use crate::{Error, Grid, Result};

const MAGIC: &[u8; 2] = b"P5";
const MAX_VALUE: usize = 255;

/// Serializes a grid as a binary PGM image.
pub fn encode(grid: &Grid) -> Vec<u8> {
    let header = format!("P5\n{} {}\n{}\n", grid.width(), grid.height(), MAX_VALUE);
    let mut out = Vec::with_capacity(header.len() + grid.cells().len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(grid.cells());
    out
}

/// Parses a binary PGM image into a grid.
///
/// # Errors
///
/// Returns [`Error::Pgm`] for a wrong magic number, malformed or missing header
/// fields, an unsupported `maxval`, or a pixel payload whose length does not
/// match `width * height`.
pub fn decode(bytes: &[u8]) -> Result<Grid> {
    let mut header = Header { bytes, pos: 0 };

    if header.token()? != MAGIC {
        return Err(pgm_error("missing P5 magic number"));
    }
    let width = header.number("width")?;
    let height = header.number("height")?;
    let max_value = header.number("maxval")?;
    if max_value != MAX_VALUE {
        return Err(pgm_error(format!("unsupported maxval {max_value}")));
    }

    // Exactly one whitespace byte separates the header from the raster.
    let raster = bytes
        .get(header.pos + 1..)
        .ok_or_else(|| pgm_error("missing pixel data"))?;

    let expected = width
        .checked_mul(height)
        .ok_or_else(|| pgm_error("dimensions overflow"))?;
    if raster.len() != expected {
        return Err(pgm_error(format!(
            "expected {expected} pixels, found {}",
            raster.len()
        )));
    }

    Grid::new(width, height, raster.to_vec())
}

fn pgm_error(reason: impl Into<String>) -> Error {
    Error::Pgm {
        reason: reason.into(),
    }
}

struct Header<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Header<'a> {
    /// Next whitespace-delimited token, skipping `#` comments.
    fn token(&mut self) -> Result<&'a [u8]> {
        loop {
            match self.bytes.get(self.pos) {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'#') => {
                    while let Some(&b) = self.bytes.get(self.pos) {
                        self.pos += 1;
                        if b == b'\n' {
                            break;
                        }
                    }
                }
                Some(_) => break,
                None => return Err(pgm_error("truncated header")),
            }
        }

        let start = self.pos;
        while let Some(b) = self.bytes.get(self.pos) {
            if b.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
        Ok(&self.bytes[start..self.pos])
    }

    fn number(&mut self, field: &str) -> Result<usize> {
        let token = self.token()?;
        core::str::from_utf8(token)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| pgm_error(format!("invalid {field}")))
    }
}

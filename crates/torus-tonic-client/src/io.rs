//! Image storage at the edge of the client.
//!
//! The driver only needs to load the input grid and save snapshots by name,
//! so storage sits behind [`ImageStore`]. [`PgmStore`] keeps binary PGM
//! files in two directories.

use crate::error::{Error, Result};
use std::{
    io::Write,
    path::{Path, PathBuf},
};
use torus_tonic_core::torus::{Grid, pgm};

/// Loads and saves grids by name.
///
/// Implementations are blocking; the driver calls them from the blocking
/// pool.
pub trait ImageStore: Send + Sync + 'static {
    fn load(&self, name: &str) -> Result<Grid>;

    fn save(&self, name: &str, grid: &Grid) -> Result<()>;
}

/// `<name>.pgm` files read from `input_dir` and written to `output_dir`.
#[derive(Debug, Clone)]
pub struct PgmStore {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl PgmStore {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn input_path(&self, name: &str) -> PathBuf {
        file_path(&self.input_dir, name)
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        file_path(&self.output_dir, name)
    }
}

fn file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.pgm"))
}

impl ImageStore for PgmStore {
    fn load(&self, name: &str) -> Result<Grid> {
        let path = self.input_path(name);
        let bytes = std::fs::read(&path).map_err(|e| Error::io(&path, e))?;
        Ok(pgm::decode(&bytes)?)
    }

    /// Writes to a temporary file in the output directory and renames it
    /// into place, so an interrupted save never leaves a partial image
    /// behind.
    fn save(&self, name: &str, grid: &Grid) -> Result<()> {
        let path = self.output_path(name);
        std::fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.output_dir).map_err(|e| Error::io(&path, e))?;
        tmp.write_all(&pgm::encode(grid))
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::io(&path, e))?;
        tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;

        tracing::debug!(path = %path.display(), "Image written");
        Ok(())
    }
}

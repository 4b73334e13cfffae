//! In-process parallel generations.
//!
//! [`LocalEngine`] runs the same banded step the broker does, but hands the
//! bands to a rayon pool instead of remote workers: one band per thread,
//! merged in band order.

use crate::{Error, Grid, Result, effective_workers, next_band, partition};
use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

#[derive(Debug)]
pub struct LocalEngine {
    pool: ThreadPool,
    threads: usize,
}

impl LocalEngine {
    /// Builds an engine with `threads` band threads (at least one).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThreadPool`] if the threads cannot be spawned.
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("torus-band-{i}"))
            .build()
            .map_err(|e| Error::ThreadPool {
                reason: e.to_string(),
            })?;
        Ok(Self { pool, threads })
    }

    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Next generation of `grid`. Grids shorter than the thread count use
    /// one band per row.
    ///
    /// # Errors
    ///
    /// Only fails if the merged bands do not cover the grid, which a
    /// partition never produces.
    pub fn step(&self, grid: &Grid) -> Result<Grid> {
        let (width, height) = (grid.width(), grid.height());
        let bands = partition(height, effective_workers(self.threads, self.threads, height));
        let cells = grid.cells();

        let outputs: Vec<Vec<u8>> = self.pool.install(|| {
            bands
                .par_iter()
                .map(|band| next_band(cells, band.start, band.end, height, width))
                .collect()
        });
        Grid::from_bands(width, height, outputs)
    }

    /// Advances `grid` by `turns` generations.
    ///
    /// # Errors
    ///
    /// See [`LocalEngine::step`].
    pub fn run(&self, grid: Grid, turns: u64) -> Result<Grid> {
        (0..turns).try_fold(grid, |grid, _| self.step(&grid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ALIVE, Cell, DEAD};

    fn soup(size: usize) -> Grid {
        let cells = (0..size * size)
            .map(|i| if (i * 7 + i / 3) % 5 < 2 { ALIVE } else { DEAD })
            .collect();
        Grid::new(size, size, cells).unwrap()
    }

    #[test]
    fn step_matches_sequential_for_any_thread_count() {
        let grid = soup(37);
        let expected = grid.step();
        for threads in [1, 2, 3, 4, 8, 16] {
            let engine = LocalEngine::new(threads).unwrap();
            assert_eq!(engine.step(&grid).unwrap(), expected, "threads {threads}");
        }
    }

    #[test]
    fn more_threads_than_rows() {
        let grid = Grid::with_alive(6, 2, [Cell::new(0, 0), Cell::new(1, 0), Cell::new(2, 0)])
            .unwrap();
        let engine = LocalEngine::new(8).unwrap();
        assert_eq!(engine.step(&grid).unwrap(), grid.step());
    }

    #[test]
    fn zero_threads_means_one() {
        assert_eq!(LocalEngine::new(0).unwrap().threads(), 1);
    }

    #[test]
    fn glider_returns_home_after_crossing_the_torus() {
        let glider = Grid::with_alive(
            16,
            16,
            [
                Cell::new(1, 0),
                Cell::new(2, 1),
                Cell::new(0, 2),
                Cell::new(1, 2),
                Cell::new(2, 2),
            ],
        )
        .unwrap();
        let engine = LocalEngine::new(4).unwrap();
        assert_eq!(engine.run(glider.clone(), 64).unwrap(), glider);
        assert_eq!(engine.run(glider.clone(), 0).unwrap(), glider);
    }
}

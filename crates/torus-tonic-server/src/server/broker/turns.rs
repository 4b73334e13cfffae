//! The broker's turn loop.
//!
//! One generation: split the rows into bands, send band `i` to worker `i`,
//! wait for every answer, stitch the answers together in band order and
//! commit the result. Generations are strictly sequential; the next one is
//! dispatched only after the previous one is committed.

use super::{
    pool::WorkerPool,
    state::{ClusterState, Phase},
};
use crate::server::telemetry::{
    decrement_runs_inflight, increment_bands_dispatched, increment_generations,
    increment_runs_inflight, record_generation_duration,
};
use bytes::Bytes;
use futures::future::try_join_all;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use torus_tonic_core::{
    Error,
    proto::{BandRequest, TurnsResponse},
    torus::{Band, Grid, effective_workers, partition},
};

/// Puts the phase back to `Idle` if a run ends without completing, including
/// when the request future is dropped because the caller went away.
struct RunGuard<'a> {
    state: &'a ClusterState,
    completed: bool,
}

impl<'a> RunGuard<'a> {
    fn new(state: &'a ClusterState) -> Self {
        increment_runs_inflight();
        Self {
            state,
            completed: false,
        }
    }

    fn complete(mut self) {
        self.completed = true;
        self.state.finish(Phase::Finished);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        decrement_runs_inflight();
        if !self.completed {
            self.state.finish(Phase::Idle);
        }
    }
}

/// Runs `turns` generations of `grid` over at most `threads` workers and
/// returns the final grid.
///
/// The number of workers used is clamped to the pool size and to the grid
/// height. Canonical state is updated after every generation, so control
/// plane readers follow along.
///
/// # Errors
///
/// - [`Error::Busy`] if another run is active.
/// - [`Error::WorkerTimeout`] / [`Error::WorkerUnavailable`] if any band of
///   a generation fails. State stays at the last committed turn.
/// - [`Error::ServiceShutdown`] if `shutdown` is cancelled mid-run.
#[tracing::instrument(
    skip_all,
    fields(width = grid.width(), height = grid.height(), turns = turns, threads = threads)
)]
pub async fn run_turns(
    state: &ClusterState,
    pool: &WorkerPool,
    shutdown: &CancellationToken,
    grid: Grid,
    turns: u64,
    threads: usize,
) -> Result<TurnsResponse, Error> {
    let width = grid.width();
    let height = grid.height();
    let mut alive_count = grid.alive_count() as u64;
    let mut cells = Bytes::from(grid.into_cells());

    state.begin(cells.clone(), width as u32, height as u32, alive_count)?;
    let guard = RunGuard::new(state);

    let workers = effective_workers(threads, pool.len(), height);
    let bands = partition(height, workers);
    let mut paused = state.pause_receiver();

    tracing::info!(workers, "Run started");

    let mut turn = 0;
    while turn < turns {
        wait_while_paused(&mut paused, shutdown).await?;

        let started = Instant::now();
        let next = tokio::select! {
            biased;
            () = shutdown.cancelled() => return Err(Error::ServiceShutdown),
            next = generation(pool, &cells, width, height, &bands) => next?,
        };

        alive_count = next.alive_count() as u64;
        cells = Bytes::from(next.into_cells());
        let event = state.commit(cells.clone(), alive_count);
        turn = event.turn;

        increment_generations();
        record_generation_duration(started.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(turn, alive_count, "Generation committed");
    }

    guard.complete();
    tracing::info!(turn, alive_count, "Run finished");

    Ok(TurnsResponse {
        grid: cells,
        turn,
        alive_count,
    })
}

/// Parks while the pause flag is set.
async fn wait_while_paused(
    paused: &mut watch::Receiver<bool>,
    shutdown: &CancellationToken,
) -> Result<(), Error> {
    if !*paused.borrow_and_update() {
        return Ok(());
    }

    tracing::info!("Turn loop paused");
    tokio::select! {
        () = shutdown.cancelled() => Err(Error::ServiceShutdown),
        res = paused.wait_for(|p| !*p) => {
            res.map(|_| tracing::info!("Turn loop resumed"))
                .map_err(|_| Error::ChannelError {
                    context: "pause flag closed".to_owned(),
                })
        }
    }
}

/// Computes one generation across the pool.
async fn generation(
    pool: &WorkerPool,
    cells: &Bytes,
    width: usize,
    height: usize,
    bands: &[Band],
) -> Result<Grid, Error> {
    increment_bands_dispatched(bands.len() as u64);

    let calls = bands.iter().enumerate().map(|(index, band)| {
        let req = BandRequest {
            grid: cells.clone(),
            width: width as u32,
            height: height as u32,
            start_row: band.start as u32,
            end_row: band.end as u32,
            kill: false,
        };
        async move {
            let out = pool.compute_band(index, req).await?;
            let expected = band.len() * width;
            if out.len() != expected {
                return Err(Error::WorkerUnavailable {
                    worker: pool.addr(index).unwrap_or_default().to_owned(),
                    reason: format!(
                        "returned {} bytes for rows [{}, {}), expected {expected}",
                        out.len(),
                        band.start,
                        band.end
                    ),
                });
            }
            Ok(out)
        }
    });

    // Results come back in band order whatever order the workers finish in.
    let outputs = try_join_all(calls).await?;
    Ok(Grid::from_bands(width, height, outputs)?)
}

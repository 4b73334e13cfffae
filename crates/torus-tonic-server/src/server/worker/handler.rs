//! gRPC handler for the `Worker` service.
//!
//! A worker owns no canonical state. Every `ComputeBand` call carries the
//! whole grid and the band to produce, and the answer depends on nothing
//! else. The only thing kept between calls is the last grid seen and a band
//! counter, served back by `Snapshot` for diagnostics.

use crate::server::telemetry::increment_bands_computed;
use bytes::Bytes;
use core::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use torus_tonic_core::{
    Error,
    proto::{BandRequest, BandResponse, SnapshotRequest, SnapshotResponse, worker_server::Worker},
    torus::{Band, next_band},
};
use tonic::{Request, Response, Status};

#[derive(Debug, Clone)]
struct LastGrid {
    grid: Bytes,
    width: u32,
    height: u32,
}

#[derive(Debug, Default)]
struct WorkerState {
    last: Mutex<Option<LastGrid>>,
    bands_computed: AtomicU64,
}

/// Implementation of the `Worker` service.
///
/// Cloning is cheap; clones share the diagnostic state and the shutdown
/// token.
#[derive(Debug, Clone)]
pub struct WorkerService {
    state: Arc<WorkerState>,
    shutdown: CancellationToken,
}

impl WorkerService {
    /// Creates a worker that cancels `shutdown` when told to die.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            state: Arc::default(),
            shutdown,
        }
    }

    /// Number of bands computed since start.
    pub fn bands_computed(&self) -> u64 {
        self.state.bands_computed.load(Ordering::Relaxed)
    }
}

/// Checks a band request and returns the band it names.
fn validate(req: &BandRequest) -> Result<Band, Error> {
    let width = req.width as usize;
    let height = req.height as usize;

    if width == 0 || height == 0 {
        return Err(Error::InvalidRequest {
            reason: format!("grid must not be empty, got {width}x{height}"),
        });
    }

    let expected = width
        .checked_mul(height)
        .ok_or_else(|| Error::InvalidRequest {
            reason: format!("grid {width}x{height} is too large"),
        })?;

    if req.grid.len() != expected {
        return Err(Error::InvalidRequest {
            reason: format!(
                "grid holds {} bytes, {width}x{height} needs {expected}",
                req.grid.len()
            ),
        });
    }

    let band = Band::new(req.start_row as usize, req.end_row as usize);
    if !band.fits(height) {
        return Err(Error::InvalidRequest {
            reason: format!(
                "band [{}, {}) is not a non-empty range of {height} rows",
                band.start, band.end
            ),
        });
    }

    Ok(band)
}

#[tonic::async_trait]
impl Worker for WorkerService {
    #[tracing::instrument(
        skip_all,
        fields(start_row = req.get_ref().start_row, end_row = req.get_ref().end_row, kill = req.get_ref().kill)
    )]
    async fn compute_band(
        &self,
        req: Request<BandRequest>,
    ) -> Result<Response<BandResponse>, Status> {
        let req = req.into_inner();

        if req.kill {
            tracing::warn!("Kill requested, shutting down worker");
            // The response is flushed before the server stops accepting work.
            self.shutdown.cancel();
            return Ok(Response::new(BandResponse { band: Bytes::new() }));
        }

        let band = validate(&req)?;
        let width = req.width as usize;
        let height = req.height as usize;

        let cells = req.grid.clone();
        let out = tokio::task::spawn_blocking(move || {
            next_band(&cells, band.start, band.end, height, width)
        })
        .await
        .map_err(|e| Error::ChannelError {
            context: format!("band computation failed: {e}"),
        })?;

        *self.state.last.lock() = Some(LastGrid {
            grid: req.grid,
            width: req.width,
            height: req.height,
        });
        self.state.bands_computed.fetch_add(1, Ordering::Relaxed);
        increment_bands_computed();

        tracing::debug!(rows = band.len(), "Computed band");

        Ok(Response::new(BandResponse {
            band: Bytes::from(out),
        }))
    }

    async fn snapshot(
        &self,
        _req: Request<SnapshotRequest>,
    ) -> Result<Response<SnapshotResponse>, Status> {
        let turn = self.bands_computed();
        let last = self.state.last.lock().clone();

        let resp = match last {
            Some(LastGrid {
                grid,
                width,
                height,
            }) => SnapshotResponse {
                grid,
                width,
                height,
                turn,
            },
            None => SnapshotResponse {
                turn,
                ..Default::default()
            },
        };

        Ok(Response::new(resp))
    }
}

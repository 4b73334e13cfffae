//! gRPC handler for the `Broker` service.
//!
//! [`BrokerService`] runs the turn loop for `ComputeTurns` and serves the
//! control plane (`QueryAlive`, `Snapshot`, `Pause`, `Shutdown`,
//! `WatchTurns`) concurrently with it. All of them meet only in
//! [`ClusterState`].

use super::{
    pool::WorkerPool,
    state::{ClusterState, Snapshot},
    turns::run_turns,
};
use crate::server::config::BrokerConfig;
use core::pin::Pin;
use futures::{Stream, StreamExt, future};
use std::sync::Arc;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use torus_tonic_core::{
    Error,
    proto::{
        AliveRequest, AliveResponse, PauseRequest, PauseResponse, ShutdownRequest,
        ShutdownResponse, SnapshotRequest, SnapshotResponse, TurnEvent, TurnsRequest,
        TurnsResponse, WatchRequest, broker_server::Broker,
    },
    types::grid_from_wire,
};

/// Implementation of the `Broker` service.
///
/// Cloning is cheap; clones share the cluster state, the worker pool and
/// the shutdown token.
#[derive(Clone)]
pub struct BrokerService {
    state: Arc<ClusterState>,
    pool: Arc<WorkerPool>,
    shutdown: CancellationToken,
    max_grid_cells: usize,
}

impl BrokerService {
    /// Creates the service and lazy connections to the configured workers.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker address is malformed.
    pub fn new(config: &BrokerConfig, shutdown: CancellationToken) -> Result<Self, Error> {
        let pool = WorkerPool::connect_lazy(&config.worker_addrs, config.band_timeout)?;
        Ok(Self {
            state: Arc::new(ClusterState::new(config.event_buffer_size)),
            pool: Arc::new(pool),
            shutdown,
            max_grid_cells: config.max_grid_cells,
        })
    }

    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    fn validate(&self, req: &TurnsRequest) -> Result<(), Error> {
        if req.threads == 0 {
            return Err(Error::InvalidRequest {
                reason: "threads must be greater than 0".to_owned(),
            });
        }

        let cells = (req.width as usize).saturating_mul(req.height as usize);
        if cells > self.max_grid_cells {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "grid {}x{} exceeds maximum of {} cells",
                    req.width, req.height, self.max_grid_cells
                ),
            });
        }

        Ok(())
    }
}

#[tonic::async_trait]
impl Broker for BrokerService {
    type WatchTurnsStream = Pin<Box<dyn Stream<Item = Result<TurnEvent, Status>> + Send>>;

    /// Runs the requested number of generations and returns the final grid.
    ///
    /// The run keeps going only as long as this call does: if the client
    /// disconnects the request future is dropped between or during
    /// generations and the broker goes back to idle.
    async fn compute_turns(
        &self,
        req: Request<TurnsRequest>,
    ) -> Result<Response<TurnsResponse>, Status> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ServiceShutdown.into());
        }

        let req = req.into_inner();
        self.validate(&req)?;
        let grid = grid_from_wire(req.width, req.height, &req.grid)?;

        let resp = run_turns(
            &self.state,
            &self.pool,
            &self.shutdown,
            grid,
            req.turns,
            req.threads as usize,
        )
        .await
        .inspect_err(|e| tracing::warn!("Run failed: {e}"))?;

        Ok(Response::new(resp))
    }

    async fn query_alive(
        &self,
        _req: Request<AliveRequest>,
    ) -> Result<Response<AliveResponse>, Status> {
        let (turn, alive_count) = self.state.alive();
        Ok(Response::new(AliveResponse { turn, alive_count }))
    }

    async fn snapshot(
        &self,
        _req: Request<SnapshotRequest>,
    ) -> Result<Response<SnapshotResponse>, Status> {
        let Snapshot {
            grid,
            width,
            height,
            turn,
        } = self.state.snapshot();
        Ok(Response::new(SnapshotResponse {
            grid,
            width,
            height,
            turn,
        }))
    }

    async fn pause(&self, req: Request<PauseRequest>) -> Result<Response<PauseResponse>, Status> {
        let (turn, paused) = self.state.set_paused(req.get_ref().paused);
        tracing::info!(turn, paused, "Pause toggled");
        Ok(Response::new(PauseResponse { turn, paused }))
    }

    /// Kills every worker and then stops the broker itself.
    ///
    /// The response is still delivered: the server drains in-flight calls
    /// before it stops.
    async fn shutdown(
        &self,
        _req: Request<ShutdownRequest>,
    ) -> Result<Response<ShutdownResponse>, Status> {
        tracing::warn!(turn = self.state.turn(), "Shutdown requested");

        self.state.kill();
        self.shutdown.cancel();
        self.pool.kill_all().await;

        Ok(Response::new(ShutdownResponse {}))
    }

    async fn watch_turns(
        &self,
        _req: Request<WatchRequest>,
    ) -> Result<Response<Self::WatchTurnsStream>, Status> {
        let events = BroadcastStream::new(self.state.subscribe())
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => Some(Ok(event)),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Turn watcher lagged");
                        None
                    }
                })
            })
            .take_until(self.shutdown.clone().cancelled_owned());

        Ok(Response::new(Box::pin(events)))
    }
}

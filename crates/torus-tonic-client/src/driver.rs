//! The client's orchestration loop.
//!
//! [`Driver::run`] hands the whole run to the broker as one `ComputeTurns`
//! call on its own task, then reacts to four things until that call
//! returns or the user leaves:
//!
//! - the broker's turn events, forwarded as [`Event::TurnComplete`];
//! - an alive-count ticker, reported as [`Event::AliveCellsCount`];
//! - key commands (`s` save, `q` quit, `p` pause/resume, `k` kill);
//! - completion of the run itself.

use crate::{
    error::{Error, Result},
    event::{Event, State},
    io::ImageStore,
    params::Params,
};
use core::time::Duration;
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tonic::{
    Response, Status, Streaming,
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};
use torus_tonic_core::{
    proto::{
        AliveRequest, PauseRequest, ShutdownRequest, SnapshotRequest, TurnEvent, TurnsRequest,
        TurnsResponse, WatchRequest, broker_client::BrokerClient,
    },
    torus::Grid,
    types::grid_to_wire,
};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The broker finished every turn.
    Completed { turn: u64 },
    /// The user quit; broker and workers are still up.
    Quit { turn: u64 },
    /// The user killed the cluster.
    Killed { turn: u64 },
}

impl Outcome {
    pub const fn turn(&self) -> u64 {
        match self {
            Self::Completed { turn } | Self::Quit { turn } | Self::Killed { turn } => *turn,
        }
    }
}

type RunHandle = JoinHandle<core::result::Result<Response<TurnsResponse>, Status>>;

pub struct Driver<S> {
    client: BrokerClient<Channel>,
    store: Arc<S>,
    events: mpsc::Sender<Event>,
    alive_interval: Duration,
    last_turn: u64,
}

impl<S: ImageStore> Driver<S> {
    /// Connects to the broker at `addr` (a full URI such as
    /// `http://127.0.0.1:8030`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::error::Error::Transport) if the
    /// broker cannot be reached.
    pub async fn connect(
        addr: String,
        store: S,
        events: mpsc::Sender<Event>,
        alive_interval: Duration,
    ) -> Result<Self> {
        let channel = Endpoint::from_shared(addr)?.connect().await?;
        let client = BrokerClient::new(channel)
            .send_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Zstd)
            .max_decoding_message_size(usize::MAX)
            .max_encoding_message_size(usize::MAX);
        Ok(Self::new(client, store, events, alive_interval))
    }

    pub fn new(
        client: BrokerClient<Channel>,
        store: S,
        events: mpsc::Sender<Event>,
        alive_interval: Duration,
    ) -> Self {
        Self {
            client,
            store: Arc::new(store),
            events,
            alive_interval,
            last_turn: 0,
        }
    }

    /// Runs `params.turns` generations of the input image on the broker.
    ///
    /// # Errors
    ///
    /// Fails before anything is submitted if the input image cannot be
    /// loaded or does not match `params`. Otherwise fails if the broker
    /// rejects or fails the run, or the final image cannot be written. Snapshot
    /// failures on `s`, `q` and `k` are logged and do not end the run.
    pub async fn run(&mut self, params: Params, mut keys: mpsc::Receiver<char>) -> Result<Outcome> {
        self.last_turn = 0;

        let grid = self.load(params.input_name()).await?;
        if (grid.width(), grid.height()) != (params.width, params.height) {
            return Err(Error::InvalidParams {
                reason: format!(
                    "image {} is {}x{}, expected {}x{}",
                    params.input_name(),
                    grid.width(),
                    grid.height(),
                    params.width,
                    params.height
                ),
            });
        }
        let (cells, width, height) = grid_to_wire(&grid)?;
        let threads = u32::try_from(params.threads).map_err(|_| Error::InvalidParams {
            reason: format!("{} threads exceeds the wire limit", params.threads),
        })?;

        for cell in grid.alive_cells() {
            self.emit(Event::CellFlipped { turn: 0, cell }).await;
        }

        // Subscribe before starting so no turn is missed.
        let mut turns = self
            .client
            .watch_turns(WatchRequest {})
            .await?
            .into_inner();

        let request = TurnsRequest {
            grid: cells,
            width,
            height,
            turns: params.turns,
            threads,
        };
        let mut runner = self.client.clone();
        let mut run: RunHandle = tokio::spawn(async move { runner.compute_turns(request).await });

        tracing::info!(
            width = params.width,
            height = params.height,
            turns = params.turns,
            threads = params.threads,
            "Run submitted"
        );

        let outcome = self
            .control_loop(params, &mut run, &mut turns, &mut keys)
            .await;
        // Leaving early drops the ComputeTurns call, which ends the run on
        // the broker.
        run.abort();
        outcome
    }

    async fn control_loop(
        &mut self,
        params: Params,
        run: &mut RunHandle,
        turns: &mut Streaming<TurnEvent>,
        keys: &mut mpsc::Receiver<char>,
    ) -> Result<Outcome> {
        let mut ticker = interval_at(Instant::now() + self.alive_interval, self.alive_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut keys_open = true;
        let mut turns_open = true;

        loop {
            tokio::select! {
                res = &mut *run => {
                    let resp = res??.into_inner();
                    return self.finish(params, resp).await;
                }
                _ = ticker.tick() => {
                    let alive = self.client.query_alive(AliveRequest {}).await?.into_inner();
                    self.last_turn = self.last_turn.max(alive.turn);
                    self.emit(Event::AliveCellsCount {
                        turn: alive.turn,
                        count: alive.alive_count,
                    })
                    .await;
                }
                event = turns.message(), if turns_open => match event {
                    Ok(Some(event)) => {
                        self.last_turn = self.last_turn.max(event.turn);
                        self.emit(Event::TurnComplete { turn: event.turn }).await;
                    }
                    Ok(None) => turns_open = false,
                    Err(status) => {
                        tracing::warn!("Turn stream ended: {}", status.message());
                        turns_open = false;
                    }
                },
                key = keys.recv(), if keys_open => match key {
                    Some(key) => {
                        if let Some(outcome) = self.handle_key(key, params, keys).await? {
                            return Ok(outcome);
                        }
                    }
                    None => keys_open = false,
                },
            }
        }
    }

    async fn handle_key(
        &mut self,
        key: char,
        params: Params,
        keys: &mut mpsc::Receiver<char>,
    ) -> Result<Option<Outcome>> {
        match key {
            's' => {
                if let Err(e) = self.save_snapshot(params).await {
                    tracing::warn!("Failed to save snapshot: {e}");
                }
                Ok(None)
            }
            'q' => self.quit(params).await.map(Some),
            'k' => self.kill(params).await.map(Some),
            'p' => self.pause(params, keys).await,
            other => {
                tracing::debug!("Ignoring key {other:?}");
                Ok(None)
            }
        }
    }

    /// Parks the broker and the control loop until the next `p`. `q` and `k`
    /// still work while paused.
    async fn pause(
        &mut self,
        params: Params,
        keys: &mut mpsc::Receiver<char>,
    ) -> Result<Option<Outcome>> {
        let paused = self
            .client
            .pause(PauseRequest { paused: true })
            .await?
            .into_inner();
        self.last_turn = self.last_turn.max(paused.turn);
        self.emit(Event::StateChange {
            turn: paused.turn,
            state: State::Paused,
        })
        .await;

        loop {
            match keys.recv().await {
                Some('p') | None => break,
                Some('q') => return self.quit(params).await.map(Some),
                Some('k') => return self.kill(params).await.map(Some),
                Some(_) => {}
            }
        }

        let resumed = self
            .client
            .pause(PauseRequest { paused: false })
            .await?
            .into_inner();
        self.emit(Event::StateChange {
            turn: resumed.turn,
            state: State::Executing,
        })
        .await;
        Ok(None)
    }

    async fn quit(&mut self, params: Params) -> Result<Outcome> {
        let (turn, alive) = match self.save_snapshot(params).await {
            Ok((turn, grid)) => (turn, grid.alive_cells()),
            Err(e) => {
                tracing::warn!("Failed to save snapshot: {e}");
                (self.last_turn, Vec::new())
            }
        };

        self.emit(Event::FinalTurnComplete { turn, alive }).await;
        self.emit(Event::StateChange {
            turn,
            state: State::Quitting,
        })
        .await;
        Ok(Outcome::Quit { turn })
    }

    async fn kill(&mut self, params: Params) -> Result<Outcome> {
        let turn = match self.save_snapshot(params).await {
            Ok((turn, _)) => turn,
            Err(e) => {
                tracing::warn!("Failed to save snapshot: {e}");
                self.last_turn
            }
        };

        self.client.shutdown(ShutdownRequest {}).await?;
        tracing::info!(turn, "Cluster shut down");

        self.emit(Event::StateChange {
            turn,
            state: State::Quitting,
        })
        .await;
        Ok(Outcome::Killed { turn })
    }

    async fn finish(&mut self, params: Params, resp: TurnsResponse) -> Result<Outcome> {
        let turn = resp.turn;
        let grid = Grid::new(params.width, params.height, resp.grid.to_vec())?;

        let filename = params.output_name(turn);
        self.save(filename.clone(), grid.clone()).await?;
        self.emit(Event::ImageOutputComplete { turn, filename }).await;

        self.emit(Event::FinalTurnComplete {
            turn,
            alive: grid.alive_cells(),
        })
        .await;
        self.emit(Event::StateChange {
            turn,
            state: State::Quitting,
        })
        .await;

        tracing::info!(turn, alive = resp.alive_count, "Run completed");
        Ok(Outcome::Completed { turn })
    }

    /// Pulls the broker's grid, writes it out and reports the file.
    async fn save_snapshot(&mut self, params: Params) -> Result<(u64, Grid)> {
        let snap = self.client.snapshot(SnapshotRequest {}).await?.into_inner();
        let grid = Grid::new(
            snap.width as usize,
            snap.height as usize,
            snap.grid.to_vec(),
        )?;
        self.last_turn = self.last_turn.max(snap.turn);

        let filename = params.output_name(snap.turn);
        self.save(filename.clone(), grid.clone()).await?;
        self.emit(Event::ImageOutputComplete {
            turn: snap.turn,
            filename,
        })
        .await;

        Ok((snap.turn, grid))
    }

    async fn load(&self, name: String) -> Result<Grid> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.load(&name)).await?
    }

    async fn save(&self, name: String, grid: Grid) -> Result<()> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(&name, &grid)).await?
    }

    async fn emit(&self, event: Event) {
        if self.events.send(event).await.is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

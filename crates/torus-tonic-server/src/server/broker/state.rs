//! Canonical cluster state owned by the broker.
//!
//! [`ClusterState`] is shared (through an `Arc`) by the turn loop, which is
//! its only writer, and by the control-plane handlers, which only read it.
//! Grid, turn and alive count sit behind a single mutex and are always read
//! and written together, so a reader can never pair the grid of one turn
//! with the count of another.

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use torus_tonic_core::{Error, proto::TurnEvent};

/// Lifecycle of the broker's turn loop.
///
/// `Idle -> Running -> {Paused <-> Running} -> Finished | Killed`. A failed
/// or abandoned run falls back to `Idle`. `Killed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Finished,
    Killed,
}

impl Phase {
    /// Whether a run currently owns the turn loop.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

/// Point-in-time copy of the canonical grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub grid: Bytes,
    pub width: u32,
    pub height: u32,
    pub turn: u64,
}

#[derive(Debug)]
struct Inner {
    grid: Bytes,
    width: u32,
    height: u32,
    turn: u64,
    alive_count: u64,
    phase: Phase,
}

#[derive(Debug)]
pub struct ClusterState {
    inner: Mutex<Inner>,
    paused: watch::Sender<bool>,
    events: broadcast::Sender<TurnEvent>,
}

impl ClusterState {
    /// Empty state. `event_buffer_size` bounds how far a `WatchTurns`
    /// subscriber may fall behind before it starts skipping events.
    pub fn new(event_buffer_size: usize) -> Self {
        let (paused, _) = watch::channel(false);
        let (events, _) = broadcast::channel(event_buffer_size.max(1));
        Self {
            inner: Mutex::new(Inner {
                grid: Bytes::new(),
                width: 0,
                height: 0,
                turn: 0,
                alive_count: 0,
                phase: Phase::Idle,
            }),
            paused,
            events,
        }
    }

    /// Starts a run on `grid`, resetting the turn counter and clearing any
    /// pause left over from an earlier run.
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if a run is already active.
    /// - [`Error::ServiceShutdown`] once the broker has been killed.
    pub fn begin(&self, grid: Bytes, width: u32, height: u32, alive_count: u64) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        match inner.phase {
            Phase::Killed => return Err(Error::ServiceShutdown),
            phase if phase.is_active() => return Err(Error::Busy),
            _ => {}
        }

        inner.grid = grid;
        inner.width = width;
        inner.height = height;
        inner.turn = 0;
        inner.alive_count = alive_count;
        inner.phase = Phase::Running;
        drop(inner);

        self.paused.send_replace(false);
        Ok(())
    }

    /// Installs the next generation and publishes its [`TurnEvent`].
    ///
    /// Grid, alive count and turn change in one critical section.
    pub fn commit(&self, grid: Bytes, alive_count: u64) -> TurnEvent {
        let event = {
            let mut inner = self.inner.lock();
            inner.grid = grid;
            inner.alive_count = alive_count;
            inner.turn += 1;
            TurnEvent {
                turn: inner.turn,
                alive_count,
            }
        };

        // No subscribers is fine.
        let _ = self.events.send(event);
        event
    }

    /// Ends the active run with `phase`. Does nothing once killed.
    pub fn finish(&self, phase: Phase) {
        let mut inner = self.inner.lock();
        if inner.phase != Phase::Killed {
            inner.phase = phase;
        }
    }

    /// Marks the broker as killed. A paused turn loop is woken by the
    /// shutdown token, not here.
    pub fn kill(&self) {
        self.inner.lock().phase = Phase::Killed;
    }

    /// `(turn, alive_count)` as of the last committed generation.
    pub fn alive(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.turn, inner.alive_count)
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock();
        Snapshot {
            grid: inner.grid.clone(),
            width: inner.width,
            height: inner.height,
            turn: inner.turn,
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    pub fn turn(&self) -> u64 {
        self.inner.lock().turn
    }

    /// Requests the turn loop to park (`true`) or continue (`false`) and
    /// returns `(turn, paused)`.
    ///
    /// The phase follows the flag only while a run is active. Outside a run
    /// the flag is recorded but cleared again by the next [`begin`].
    ///
    /// [`begin`]: Self::begin
    pub fn set_paused(&self, paused: bool) -> (u64, bool) {
        let turn = {
            let mut inner = self.inner.lock();
            if inner.phase.is_active() {
                inner.phase = if paused {
                    Phase::Paused
                } else {
                    Phase::Running
                };
            }
            inner.turn
        };
        self.paused.send_replace(paused);
        (turn, paused)
    }

    pub fn pause_receiver(&self) -> watch::Receiver<bool> {
        self.paused.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> ClusterState {
        let state = ClusterState::new(8);
        state
            .begin(Bytes::from_static(&[0, 255, 255, 0]), 2, 2, 2)
            .unwrap();
        state
    }

    #[test]
    fn begin_resets_turn_and_rejects_overlap() {
        let state = started();
        assert_eq!(state.phase(), Phase::Running);
        assert_eq!(state.alive(), (0, 2));

        let err = state.begin(Bytes::from_static(&[0; 4]), 2, 2, 0).unwrap_err();
        assert!(matches!(err, Error::Busy));

        state.finish(Phase::Finished);
        state.begin(Bytes::from_static(&[0; 4]), 2, 2, 0).unwrap();
        assert_eq!(state.alive(), (0, 0));
    }

    #[test]
    fn commit_moves_grid_turn_and_count_together() {
        let state = started();
        let mut events = state.subscribe();

        let event = state.commit(Bytes::from_static(&[255; 4]), 4);
        assert_eq!(event, TurnEvent { turn: 1, alive_count: 4 });
        assert_eq!(events.try_recv().unwrap(), event);

        let snap = state.snapshot();
        assert_eq!(snap.turn, 1);
        assert_eq!(&snap.grid[..], &[255; 4]);
        assert_eq!(state.alive(), (1, 4));
    }

    #[test]
    fn pause_follows_active_runs_only() {
        let state = ClusterState::new(8);
        assert_eq!(state.set_paused(true), (0, true));
        assert_eq!(state.phase(), Phase::Idle);

        state
            .begin(Bytes::from_static(&[0; 4]), 2, 2, 0)
            .unwrap();
        assert!(!*state.pause_receiver().borrow());

        state.set_paused(true);
        assert_eq!(state.phase(), Phase::Paused);
        assert!(*state.pause_receiver().borrow());

        state.set_paused(false);
        assert_eq!(state.phase(), Phase::Running);
    }

    #[test]
    fn killed_is_terminal() {
        let state = started();
        state.kill();
        state.finish(Phase::Idle);
        assert_eq!(state.phase(), Phase::Killed);

        let err = state.begin(Bytes::from_static(&[0; 4]), 2, 2, 0).unwrap_err();
        assert!(matches!(err, Error::ServiceShutdown));
    }
}

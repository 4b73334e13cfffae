//! Notifications emitted by the [`Driver`](crate::driver::Driver).
//!
//! Every event carries the turn it refers to. Consumers get them in emission
//! order through a `tokio::sync::mpsc` channel.

use core::fmt;
use torus_tonic_core::torus::Cell;

/// Execution state reported by [`Event::StateChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Executing,
    Paused,
    Quitting,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executing => f.write_str("Executing"),
            Self::Paused => f.write_str("Paused"),
            Self::Quitting => f.write_str("Quitting"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A cell of the input grid that starts alive, sent once per cell
    /// before the run begins.
    CellFlipped { turn: u64, cell: Cell },
    /// The broker committed `turn`.
    TurnComplete { turn: u64 },
    /// Periodic alive-cell report.
    AliveCellsCount { turn: u64, count: u64 },
    /// A snapshot was written to `filename`.
    ImageOutputComplete { turn: u64, filename: String },
    StateChange { turn: u64, state: State },
    /// The run ended; `alive` lists the alive cells in row-major order.
    FinalTurnComplete { turn: u64, alive: Vec<Cell> },
}

impl Event {
    pub const fn turn(&self) -> u64 {
        match self {
            Self::CellFlipped { turn, .. }
            | Self::TurnComplete { turn }
            | Self::AliveCellsCount { turn, .. }
            | Self::ImageOutputComplete { turn, .. }
            | Self::StateChange { turn, .. }
            | Self::FinalTurnComplete { turn, .. } => *turn,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CellFlipped { cell, .. } => write!(f, "Cell {cell} alive"),
            Self::TurnComplete { turn } => write!(f, "Turn {turn} complete"),
            Self::AliveCellsCount { turn, count } => {
                write!(f, "Alive cells at turn {turn}: {count}")
            }
            Self::ImageOutputComplete { filename, .. } => write!(f, "Wrote {filename}"),
            Self::StateChange { turn, state } => write!(f, "{state} at turn {turn}"),
            Self::FinalTurnComplete { turn, alive } => {
                write!(f, "Final turn {turn}: {} alive cells", alive.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        let event = Event::StateChange {
            turn: 12,
            state: State::Paused,
        };
        assert_eq!(event.to_string(), "Paused at turn 12");
        assert_eq!(event.turn(), 12);

        let event = Event::FinalTurnComplete {
            turn: 3,
            alive: vec![Cell::new(0, 0), Cell::new(1, 0)],
        };
        assert_eq!(event.to_string(), "Final turn 3: 2 alive cells");
    }
}

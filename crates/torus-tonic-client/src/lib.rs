#![doc = include_str!("../README.md")]

pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod io;
pub mod keys;
pub mod params;

pub use driver::{Driver, Outcome};
pub use error::{Error, Result};
pub use event::{Event, State};
pub use io::{ImageStore, PgmStore};
pub use params::Params;

#![doc = include_str!("../README.md")]

mod band;
mod cell;
mod error;
mod grid;
#[cfg(feature = "parallel")]
mod parallel;
pub mod pgm;

pub use crate::band::*;
pub use crate::cell::*;
pub use crate::error::*;
pub use crate::grid::*;
#[cfg(feature = "parallel")]
pub use crate::parallel::*;

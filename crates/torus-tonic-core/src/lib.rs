#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-export so downstream crates can reach the engine via
// `torus_tonic_core::torus`
pub use torus;

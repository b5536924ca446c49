//! Segment cutting engine

pub mod cutter;

pub use cutter::{CutSource, Cutter};

//! Core data types, rollup aggregation, and derived metrics for a single
//! personal weather station
//!
//! Everything in this crate is pure: no storage, no network.

pub mod circular;
pub mod ephemeris;
pub mod metrics;
pub mod pipeline;
pub mod rollups;
pub mod types;
pub mod units;

pub use circular::CircularAccumulator;
pub use pipeline::*;
pub use rollups::*;
pub use types::*;
pub use units::*;

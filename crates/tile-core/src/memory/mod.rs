//! Memory systems for the Tileworld agent.
//!
//! Each agent owns one `SpatialMemory`: a decaying image of the grid built from
//! its own percepts and from discoveries reported by peers.

mod spatial;
mod spiral;

pub use spatial::{MemoryError, Observation, Percept, SpatialMemory, UpdateSummary};
pub use spiral::spiral;

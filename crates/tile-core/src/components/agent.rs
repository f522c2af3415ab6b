//! Agent Components
//!
//! Identity and physical state of an agent: position, fuel, carried tiles.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tile_events::{Position, Tick};

/// Unique identifier for an agent
#[derive(Component, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical state the world reports back and the planner reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub position: Position,
    pub fuel: u32,
    pub carried: usize,
    pub now: Tick,
}

impl AgentStatus {
    pub fn is_carrying(&self) -> bool {
        self.carried > 0
    }
}

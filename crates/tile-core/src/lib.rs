//! Tileworld Agent Core
//!
//! Cognitive core for agents in a Tileworld grid: decaying spatial memory, a
//! task planner over A* routes, and gossip over a shared bus. The `sim`
//! module holds a small reference world for running agents end to end.

pub mod agent;
pub mod comms;
pub mod components;
pub mod config;
pub mod events;
pub mod memory;
pub mod pathfinding;
pub mod planner;
pub mod sim;

pub use agent::{ActionOutcome, TileAgent};
pub use comms::{CommunicationBus, Message, MessageId, Messenger, Recipient};
pub use components::{AgentId, AgentStatus};
pub use config::{Config, ConfigError};
pub use events::{EventLogger, EventSink, NullSink, PendingEvents};
pub use memory::{MemoryError, Observation, Percept, SpatialMemory};
pub use pathfinding::{AStarPathFinder, PathFinder, Route};
pub use planner::{Planner, Task};
pub use sim::{RunReport, Simulation};

//! Shared grid vocabulary and event types for the Tileworld agents.
//!
//! This crate contains pure data structures with no agent logic.
//! It is a dependency for all other crates in the workspace.

pub mod event;
pub mod grid;

/// Simulation time, in whole ticks
pub type Tick = u64;

pub use event::{
    payload_priority_bonus, ActionKind, AgentEvent, AgentEventKind, MessageKind, TaskKind,
    TransitionReason,
};
pub use grid::{Direction, EntityKind, Position};

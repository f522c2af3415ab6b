//! ECS Components
//!
//! Per-agent components shared by the core and the runner.

pub mod agent;

pub use agent::*;

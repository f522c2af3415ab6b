//! Configuration System
//!
//! Loads tuning parameters from tuning.toml for easy adjustment without recompiling.
//! Every section is optional; missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default tuning file path
pub const DEFAULT_TUNING_PATH: &str = "tuning.toml";

/// Top-level configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub communication: CommunicationConfig,
}

/// Runner parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub ticks: u64,
    pub seed: u64,
    pub agent_count: usize,
    /// Ticks between progress reports
    pub report_interval: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: 1000,
            seed: 42,
            agent_count: 2,
            report_interval: 100,
        }
    }
}

/// Reference world layout and churn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: i32,
    pub height: i32,
    /// Fraction of cells holding an obstacle at start
    pub obstacle_density: f64,
    /// Tiles the world tries to keep on the map
    pub tile_target: usize,
    /// Holes the world tries to keep on the map
    pub hole_target: usize,
    /// Ticks a tile or hole survives before it expires
    pub entity_lifetime: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            obstacle_density: 0.05,
            tile_target: 40,
            hole_target: 40,
            entity_lifetime: 100,
        }
    }
}

/// Per-agent physical limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Chebyshev radius observed every tick
    pub sensor_range: i32,
    pub fuel_capacity: u32,
    /// Maximum number of carried tiles
    pub carry_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            sensor_range: 3,
            fuel_capacity: 500,
            carry_capacity: 3,
        }
    }
}

/// Working memory decay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Cells older than this many ticks are always forgotten
    pub max_age: u64,
    /// Per-tick chance of forgetting a younger cell
    pub decay_probability: f64,
    /// Spiral radius for nearest-object queries, as a multiple of sensor range
    pub search_range_factor: i32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_age: 10,
            decay_probability: 0.5,
            search_range_factor: 4,
        }
    }
}

/// Task state machine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Fuel level below which the agent heads for the station
    pub fuel_threshold: u32,
    /// Ticks between task evaluations
    pub evaluation_interval: u64,
    /// Ticks before a non-explore task is abandoned
    pub task_timeout: u64,
    /// Rows skipped between exploration sweeps
    pub row_stride: i32,
    /// Recency threshold for memory lookups of targets
    pub memory_recency: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            fuel_threshold: 100,
            evaluation_interval: 10,
            task_timeout: 50,
            row_stride: 7,
            memory_recency: 100,
        }
    }
}

/// Bus retention, owned by the runner rather than the agent core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicationConfig {
    /// Messages older than this are dropped by the runner's garbage collection
    pub retention_ticks: u64,
}

impl Default for CommunicationConfig {
    fn default() -> Self {
        Self {
            retention_ticks: 200,
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default path, or use defaults if not found
    pub fn load_or_default() -> Self {
        Self::load(DEFAULT_TUNING_PATH).unwrap_or_else(|e| {
            tracing::warn!("Could not load {}: {}. Using defaults.", DEFAULT_TUNING_PATH, e);
            Self::default()
        })
    }

    /// Reject values the agent core cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !(0.0..=1.0).contains(&self.memory.decay_probability) {
            return invalid("memory.decay_probability must be within [0, 1]");
        }
        if self.memory.search_range_factor < 1 {
            return invalid("memory.search_range_factor must be at least 1");
        }
        if self.agent.sensor_range < 1 {
            return invalid("agent.sensor_range must be at least 1");
        }
        if self.agent.carry_capacity == 0 {
            return invalid("agent.carry_capacity must be positive");
        }
        if self.planner.row_stride < 1 {
            return invalid("planner.row_stride must be at least 1");
        }
        if self.planner.evaluation_interval == 0 {
            return invalid("planner.evaluation_interval must be positive");
        }
        if self.world.width < 1 || self.world.height < 1 {
            return invalid("world dimensions must be positive");
        }
        if !(0.0..1.0).contains(&self.world.obstacle_density) {
            return invalid("world.obstacle_density must be within [0, 1)");
        }
        Ok(())
    }

    /// Returns the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.memory.max_age, 10);
        assert_eq!(config.memory.decay_probability, 0.5);
        assert_eq!(config.agent.carry_capacity, 3);
        assert_eq!(config.planner.row_stride, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
            [memory]
            max_age = 20

            [planner]
            fuel_threshold = 60
        "#;

        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.memory.max_age, 20);
        assert_eq!(config.planner.fuel_threshold, 60);
        // Default values
        assert_eq!(config.memory.decay_probability, 0.5);
        assert_eq!(config.planner.task_timeout, 50);
        assert_eq!(config.agent.sensor_range, 3);
    }

    #[test]
    fn test_invalid_probability_rejected() {
        let toml = r#"
            [memory]
            decay_probability = 1.5
        "#;

        let err = Config::from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let err = Config::from_str("[memory\nmax_age = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();

        assert!(toml.contains("[memory]"));
        assert!(toml.contains("[planner]"));
        assert_eq!(Config::from_str(&toml).unwrap(), config);
    }
}

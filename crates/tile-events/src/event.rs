//! Event Types
//!
//! Structured events emitted by agents. These are the hooks an external logger
//! subscribes to; the agent core never prints.

use serde::{Deserialize, Serialize};

use crate::grid::{EntityKind, Position};
use crate::Tick;

/// The planner's task modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    Explore,
    Collect,
    Deliver,
    Refuel,
}

/// Kinds of message carried on the communication bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    TileFound,
    HoleFound,
    ObstacleFound,
    FuelStationFound,
    TilePickedUp,
    HoleFilled,
    FuelLow,
    RequestHelp,
}

impl MessageKind {
    /// Discovery message announcing an entity of the given kind.
    /// Agents are mobile and never announced.
    pub fn discovery_for(kind: EntityKind) -> Option<MessageKind> {
        match kind {
            EntityKind::Tile => Some(MessageKind::TileFound),
            EntityKind::Hole => Some(MessageKind::HoleFound),
            EntityKind::Obstacle => Some(MessageKind::ObstacleFound),
            EntityKind::FuelStation => Some(MessageKind::FuelStationFound),
            EntityKind::Agent => None,
        }
    }

    /// Whether this kind announces a newly seen entity
    pub fn is_discovery(self) -> bool {
        matches!(
            self,
            MessageKind::TileFound
                | MessageKind::HoleFound
                | MessageKind::ObstacleFound
                | MessageKind::FuelStationFound
        )
    }

    /// The discovery kind this message retracts, if any.
    /// A pickup supersedes an earlier `TileFound` at the same position.
    pub fn retracts(self) -> Option<EntityKind> {
        match self {
            MessageKind::TilePickedUp => Some(EntityKind::Tile),
            MessageKind::HoleFilled => Some(EntityKind::Hole),
            _ => None,
        }
    }

    /// Base priority before the payload bonus
    pub fn base_priority(self) -> u8 {
        match self {
            MessageKind::FuelStationFound => 5,
            MessageKind::FuelLow => 4,
            MessageKind::RequestHelp => 3,
            MessageKind::TileFound | MessageKind::HoleFound => 2,
            _ => 1,
        }
    }

    /// Coarse 1-5 urgency; recipients use it to decide whether to interrupt planning
    pub fn urgency(self) -> u8 {
        match self {
            MessageKind::FuelLow | MessageKind::RequestHelp => 5,
            MessageKind::FuelStationFound => 4,
            MessageKind::TileFound | MessageKind::HoleFound => 3,
            _ => 1,
        }
    }
}

/// Priority bonus contributed by a message's payload entity
pub fn payload_priority_bonus(kind: EntityKind) -> u8 {
    match kind {
        EntityKind::FuelStation => 2,
        EntityKind::Tile => 1,
        EntityKind::Hole | EntityKind::Obstacle | EntityKind::Agent => 0,
    }
}

/// Actions an agent emits, one per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "direction")]
pub enum ActionKind {
    Move(crate::grid::Direction),
    Pickup,
    Putdown,
    Refuel,
    Stay,
}

/// What happened, with the details each kind needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AgentEventKind {
    /// An entity was seen in sensor range for the first time and announced
    Discovery { entity: EntityKind, position: Position },
    /// The planner switched tasks
    TaskTransition {
        from: TaskKind,
        to: TaskKind,
        target: Option<Position>,
        reason: TransitionReason,
    },
    /// A message was posted to the bus
    MessageSent {
        message_id: u64,
        message_kind: MessageKind,
        priority: u8,
        urgency: u8,
    },
    /// A message from another agent was applied
    MessageReceived {
        message_id: u64,
        message_kind: MessageKind,
        sender: String,
    },
    /// A remembered entity was dropped because it is known to be gone
    MemoryEvicted { entity: EntityKind, position: Position },
    /// A percept could not be stored
    IngestionRejected { position: Position, reason: String },
    /// The mover reported the target cell as blocked
    MoveBlocked { position: Position },
    /// A terminal action succeeded
    ActionCompleted { action: ActionKind, position: Position },
}

/// Why a task transition happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// Periodic or forced evaluation picked a different task
    Evaluation,
    /// The task ran longer than the configured timeout
    Timeout,
    /// Fuel fell below the threshold
    FuelEmergency,
}

/// A single event from one agent at one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub tick: Tick,
    pub agent_id: String,
    #[serde(flatten)]
    pub kind: AgentEventKind,
}

impl AgentEvent {
    pub fn new(tick: Tick, agent_id: impl Into<String>, kind: AgentEventKind) -> Self {
        Self {
            tick,
            agent_id: agent_id.into(),
            kind,
        }
    }

    /// Short category name, stable for log filtering
    pub fn category(&self) -> &'static str {
        match self.kind {
            AgentEventKind::Discovery { .. } => "discovery",
            AgentEventKind::TaskTransition { .. } => "task_transition",
            AgentEventKind::MessageSent { .. } => "message_sent",
            AgentEventKind::MessageReceived { .. } => "message_received",
            AgentEventKind::MemoryEvicted { .. } => "memory_evicted",
            AgentEventKind::IngestionRejected { .. } => "ingestion_rejected",
            AgentEventKind::MoveBlocked { .. } => "move_blocked",
            AgentEventKind::ActionCompleted { .. } => "action_completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Direction;

    #[test]
    fn test_priority_table() {
        assert_eq!(MessageKind::FuelStationFound.base_priority(), 5);
        assert_eq!(MessageKind::FuelLow.base_priority(), 4);
        assert_eq!(MessageKind::RequestHelp.base_priority(), 3);
        assert_eq!(MessageKind::TileFound.base_priority(), 2);
        assert_eq!(MessageKind::HoleFound.base_priority(), 2);
        assert_eq!(MessageKind::TilePickedUp.base_priority(), 1);

        assert_eq!(payload_priority_bonus(EntityKind::FuelStation), 2);
        assert_eq!(payload_priority_bonus(EntityKind::Tile), 1);
        assert_eq!(payload_priority_bonus(EntityKind::Hole), 0);
    }

    #[test]
    fn test_urgency_table() {
        assert_eq!(MessageKind::FuelLow.urgency(), 5);
        assert_eq!(MessageKind::RequestHelp.urgency(), 5);
        assert_eq!(MessageKind::FuelStationFound.urgency(), 4);
        assert_eq!(MessageKind::TileFound.urgency(), 3);
        assert_eq!(MessageKind::HoleFilled.urgency(), 1);
    }

    #[test]
    fn test_discovery_mapping() {
        assert_eq!(MessageKind::discovery_for(EntityKind::Tile), Some(MessageKind::TileFound));
        assert_eq!(MessageKind::discovery_for(EntityKind::Agent), None);
        assert!(MessageKind::ObstacleFound.is_discovery());
        assert!(!MessageKind::TilePickedUp.is_discovery());
        assert_eq!(MessageKind::TilePickedUp.retracts(), Some(EntityKind::Tile));
        assert_eq!(MessageKind::FuelLow.retracts(), None);
    }

    #[test]
    fn test_event_serialization() {
        let event = AgentEvent::new(
            12,
            "agent_01",
            AgentEventKind::ActionCompleted {
                action: ActionKind::Move(Direction::East),
                position: Position::new(4, 2),
            },
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"action_completed""#));
        assert!(json.contains(r#""agent_id":"agent_01""#));

        let parsed: AgentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.category(), "action_completed");
    }
}

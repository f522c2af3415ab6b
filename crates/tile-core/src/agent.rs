//! The per-tick agent loop.
//!
//! Each tick: refresh memory from percepts, decay it, gossip, evaluate the
//! task and emit one action. The world then reports what happened through
//! [`TileAgent::apply_outcome`].

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tile_events::{ActionKind, AgentEvent, AgentEventKind, EntityKind, Position, Tick};

use crate::comms::{CommunicationBus, Messenger};
use crate::components::{AgentId, AgentStatus};
use crate::config::Config;
use crate::events::EventSink;
use crate::memory::{MemoryError, Observation, SpatialMemory};
use crate::pathfinding::PathFinder;
use crate::planner::{Planner, Task};

/// Inbox urgency at which the planner re-evaluates straight away
const INTERRUPT_URGENCY: u8 = 4;

/// The world's answer to an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ActionOutcome {
    Moved { to: Position },
    Blocked,
    PickedUp,
    PutDown,
    Refueled,
    Stayed,
    /// The action was legal to emit but the world refused it (no tile here,
    /// nothing carried, out of fuel)
    Failed,
}

/// Cognitive core of one agent
#[derive(Component, Debug, Clone)]
pub struct TileAgent {
    id: AgentId,
    position: Position,
    fuel: u32,
    fuel_capacity: u32,
    carried: usize,
    carry_capacity: usize,
    sensor_range: i32,
    memory: SpatialMemory,
    planner: Planner,
    messenger: Messenger,
    last_action: Option<ActionKind>,
}

impl TileAgent {
    pub fn new(id: AgentId, position: Position, config: &Config) -> Self {
        let (width, height) = (config.world.width, config.world.height);
        let sensor_range = config.agent.sensor_range;
        Self {
            position,
            fuel: config.agent.fuel_capacity,
            fuel_capacity: config.agent.fuel_capacity,
            carried: 0,
            carry_capacity: config.agent.carry_capacity,
            sensor_range,
            memory: SpatialMemory::new(width, height, sensor_range, &config.memory),
            planner: Planner::new(width, height, config.agent.carry_capacity, &config.planner),
            messenger: Messenger::new(id.clone(), sensor_range),
            last_action: None,
            id,
        }
    }

    /// Starts with a given fuel level instead of a full tank
    pub fn with_fuel(mut self, fuel: u32) -> Self {
        self.fuel = fuel.min(self.fuel_capacity);
        self
    }

    pub fn id(&self) -> &AgentId {
        &self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn fuel(&self) -> u32 {
        self.fuel
    }

    pub fn carried(&self) -> usize {
        self.carried
    }

    pub fn sensor_range(&self) -> i32 {
        self.sensor_range
    }

    pub fn memory(&self) -> &SpatialMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut SpatialMemory {
        &mut self.memory
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn task(&self) -> &Task {
        self.planner.task()
    }

    pub fn status(&self, now: Tick) -> AgentStatus {
        AgentStatus {
            position: self.position,
            fuel: self.fuel,
            carried: self.carried,
            now,
        }
    }

    fn emit(&self, sink: &mut dyn EventSink, now: Tick, kind: AgentEventKind) {
        sink.emit(AgentEvent::new(now, self.id.as_str(), kind));
    }

    /// Runs one tick of the agent and returns the action to perform
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        now: Tick,
        observations: &[Observation],
        bus: &mut CommunicationBus,
        pathfinder: &dyn PathFinder,
        rng: &mut R,
        sink: &mut dyn EventSink,
    ) -> ActionKind {
        let span = tracing::debug_span!("agent_tick", agent = %self.id, tick = now);
        let _enter = span.enter();

        let summary = self.memory.update(self.position, observations, now);
        for error in &summary.rejected {
            let position = match error {
                MemoryError::OutOfBounds { position, .. } => *position,
            };
            self.emit(
                sink,
                now,
                AgentEventKind::IngestionRejected {
                    position,
                    reason: error.to_string(),
                },
            );
        }
        let forgotten = self.memory.decay(now, rng);

        self.messenger
            .announce_discoveries(self.position, observations, &mut self.memory, bus, now, sink);
        let inbox = self.messenger.consume(bus, &mut self.memory, now, sink);
        if !inbox.help_requests.is_empty() {
            self.messenger
                .answer_help_requests(&inbox.help_requests, &self.memory, bus, now, sink);
        }
        let fuel_low = self.planner.is_fuel_low(self.fuel);
        let fuel_critical = self.planner.is_fuel_critical(self.fuel);
        let knows_station = self.memory.fuel_station().is_some();
        self.messenger
            .announce_fuel_low(fuel_low, fuel_critical, knows_station, bus, now, sink);
        if inbox.max_urgency >= INTERRUPT_URGENCY {
            self.planner.request_evaluation();
        }

        let status = self.status(now);
        if let Some(transition) = self.planner.evaluate(&status, &self.memory) {
            tracing::debug!(
                from = ?transition.from,
                to = ?transition.to,
                target = ?transition.target,
                reason = ?transition.reason,
                "task transition"
            );
            self.emit(
                sink,
                now,
                AgentEventKind::TaskTransition {
                    from: transition.from,
                    to: transition.to,
                    target: transition.target,
                    reason: transition.reason,
                },
            );
        }

        let action = self.planner.plan(&status, &self.memory, pathfinder);
        tracing::trace!(
            ?action,
            fuel = self.fuel,
            carried = self.carried,
            remembered = self.memory.len(),
            forgotten,
            "planned"
        );
        self.last_action = Some(action);
        action
    }

    /// Absorbs the world's answer to the last action
    pub fn apply_outcome(
        &mut self,
        outcome: ActionOutcome,
        now: Tick,
        bus: &mut CommunicationBus,
        sink: &mut dyn EventSink,
    ) {
        let action = self.last_action.take().unwrap_or(ActionKind::Stay);
        let here = self.position;

        match outcome {
            ActionOutcome::Moved { to } => {
                self.position = to;
                self.fuel = self.fuel.saturating_sub(1);
            }
            ActionOutcome::Blocked => {
                let position = match action {
                    ActionKind::Move(direction) => here.step(direction),
                    _ => here,
                };
                tracing::debug!(agent = %self.id, %position, "move blocked");
                self.planner.on_blocked();
                self.emit(sink, now, AgentEventKind::MoveBlocked { position });
            }
            ActionOutcome::PickedUp => {
                self.carried = (self.carried + 1).min(self.carry_capacity);
                self.memory.evict(here, EntityKind::Tile);
                self.messenger
                    .announce_removal(EntityKind::Tile, here, bus, now, sink);
                self.complete(action, now, sink);
            }
            ActionOutcome::PutDown => {
                self.carried = self.carried.saturating_sub(1);
                self.memory.evict(here, EntityKind::Hole);
                self.messenger
                    .announce_removal(EntityKind::Hole, here, bus, now, sink);
                self.complete(action, now, sink);
            }
            ActionOutcome::Refueled => {
                self.fuel = self.fuel_capacity;
                self.complete(action, now, sink);
            }
            ActionOutcome::Stayed => {}
            ActionOutcome::Failed => {
                tracing::debug!(agent = %self.id, ?action, position = %here, "action failed");
                match action {
                    ActionKind::Pickup => {
                        self.memory.evict(here, EntityKind::Tile);
                    }
                    ActionKind::Putdown => {
                        self.memory.evict(here, EntityKind::Hole);
                    }
                    _ => {}
                }
                match action {
                    ActionKind::Move(_) => self.planner.on_blocked(),
                    _ => self.planner.on_completed(),
                }
            }
        }
    }

    fn complete(&mut self, action: ActionKind, now: Tick, sink: &mut dyn EventSink) {
        self.planner.on_completed();
        self.emit(
            sink,
            now,
            AgentEventKind::ActionCompleted {
                action,
                position: self.position,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathfinding::AStarPathFinder;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use tile_events::{Direction, TaskKind};

    fn config() -> Config {
        let mut config = Config::default();
        config.world.width = 20;
        config.world.height = 20;
        config.memory.decay_probability = 0.0;
        config
    }

    #[test]
    fn test_tick_announces_and_collects() {
        let config = config();
        let mut agent = TileAgent::new(AgentId::new("a"), Position::new(2, 2), &config);
        let mut bus = CommunicationBus::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let finder = AStarPathFinder::new(20, 20);
        let mut events: Vec<AgentEvent> = Vec::new();
        let seen = [Observation::new(EntityKind::Tile, Position::new(3, 2))];

        let action = agent.tick(0, &seen, &mut bus, &finder, &mut rng, &mut events);

        assert_eq!(action, ActionKind::Move(Direction::East));
        assert_eq!(agent.task().kind, TaskKind::Collect);
        assert_eq!(bus.len(), 1);
        assert!(events.iter().any(|e| e.category() == "task_transition"));

        agent.apply_outcome(ActionOutcome::Moved { to: Position::new(3, 2) }, 0, &mut bus, &mut events);
        assert_eq!(agent.position(), Position::new(3, 2));
        assert_eq!(agent.fuel(), config.agent.fuel_capacity - 1);

        let action = agent.tick(1, &seen, &mut bus, &finder, &mut rng, &mut events);
        assert_eq!(action, ActionKind::Pickup);
        agent.apply_outcome(ActionOutcome::PickedUp, 1, &mut bus, &mut events);

        assert_eq!(agent.carried(), 1);
        assert!(agent.memory().get(Position::new(3, 2)).is_none());
        assert!(!bus.has_live_discovery(EntityKind::Tile, Position::new(3, 2)));
    }

    #[test]
    fn test_blocked_move_is_reported() {
        let config = config();
        let mut agent = TileAgent::new(AgentId::new("a"), Position::new(0, 0), &config);
        let mut bus = CommunicationBus::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let finder = AStarPathFinder::new(20, 20);
        let mut events: Vec<AgentEvent> = Vec::new();

        let action = agent.tick(0, &[], &mut bus, &finder, &mut rng, &mut events);
        assert_eq!(action, ActionKind::Move(Direction::East));

        agent.apply_outcome(ActionOutcome::Blocked, 0, &mut bus, &mut events);
        assert_eq!(agent.position(), Position::new(0, 0));
        assert!(agent.planner().route().is_none());
        assert!(events.iter().any(|e| matches!(
            e.kind,
            AgentEventKind::MoveBlocked { position } if position == Position::new(1, 0)
        )));
    }

    #[test]
    fn test_failed_pickup_forgets_tile() {
        let config = config();
        let spot = Position::new(4, 4);
        let mut agent = TileAgent::new(AgentId::new("a"), spot, &config);
        let mut bus = CommunicationBus::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let finder = AStarPathFinder::new(20, 20);
        let mut events: Vec<AgentEvent> = Vec::new();

        let action = agent.tick(
            0,
            &[Observation::new(EntityKind::Tile, spot)],
            &mut bus,
            &finder,
            &mut rng,
            &mut events,
        );
        assert_eq!(action, ActionKind::Pickup);

        agent.apply_outcome(ActionOutcome::Failed, 0, &mut bus, &mut events);
        assert!(agent.memory().get(spot).is_none());
        assert_eq!(agent.carried(), 0);
    }
}

//! Reference Grid World
//!
//! A minimal Tileworld for running agents: tiles and holes that come and go,
//! static obstacles, one fuel station. It answers perception queries and
//! resolves actions; it is not part of the agent core.

use bevy_ecs::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tile_events::{ActionKind, EntityKind, Position, Tick};

use crate::agent::ActionOutcome;
use crate::components::{AgentId, AgentStatus};
use crate::config::WorldConfig;
use crate::memory::Observation;

/// Random placement attempts before giving up on a free cell
const PLACEMENT_ATTEMPTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placed {
    kind: EntityKind,
    created_at: Tick,
}

/// Running totals of what agents achieved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldStats {
    pub tiles_picked: u64,
    pub holes_filled: u64,
    pub refuels: u64,
    pub blocked_moves: u64,
    pub failed_actions: u64,
    pub tiles_expired: u64,
    pub holes_expired: u64,
}

/// What one churn pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChurnSummary {
    pub expired: usize,
    pub spawned: usize,
}

#[derive(Resource, Debug, Clone)]
pub struct GridWorld {
    width: i32,
    height: i32,
    cells: Vec<Option<Placed>>,
    fuel_station: Option<Position>,
    agents: BTreeMap<AgentId, Position>,
    tile_target: usize,
    hole_target: usize,
    entity_lifetime: Tick,
    stats: WorldStats,
}

impl GridWorld {
    /// An empty world with the configured size and churn targets
    pub fn empty(config: &WorldConfig) -> Self {
        let width = config.width.max(1);
        let height = config.height.max(1);
        Self {
            width,
            height,
            cells: vec![None; (width * height) as usize],
            fuel_station: None,
            agents: BTreeMap::new(),
            tile_target: config.tile_target,
            hole_target: config.hole_target,
            entity_lifetime: config.entity_lifetime,
            stats: WorldStats::default(),
        }
    }

    /// A randomly laid out world: one fuel station, obstacles by density,
    /// then tiles and holes up to their targets
    pub fn generate<R: Rng + ?Sized>(config: &WorldConfig, rng: &mut R) -> Self {
        let mut world = Self::empty(config);

        if let Some(station) = world.random_free_cell(rng) {
            world.place(EntityKind::FuelStation, station, 0);
        }

        let obstacles = (world.cells.len() as f64 * config.obstacle_density.clamp(0.0, 1.0)) as usize;
        for _ in 0..obstacles {
            if let Some(cell) = world.random_free_cell(rng) {
                world.place(EntityKind::Obstacle, cell, 0);
            }
        }

        world.churn(0, rng);
        tracing::info!(
            width = world.width,
            height = world.height,
            obstacles,
            tiles = world.count(EntityKind::Tile),
            holes = world.count(EntityKind::Hole),
            "world generated"
        );
        world
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        position.x >= 0 && position.y >= 0 && position.x < self.width && position.y < self.height
    }

    fn index(&self, position: Position) -> Option<usize> {
        self.in_bounds(position)
            .then(|| (position.y * self.width + position.x) as usize)
    }

    pub fn stats(&self) -> WorldStats {
        self.stats
    }

    pub fn fuel_station(&self) -> Option<Position> {
        self.fuel_station
    }

    pub fn entity_at(&self, position: Position) -> Option<EntityKind> {
        self.index(position)
            .and_then(|idx| self.cells[idx])
            .map(|placed| placed.kind)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.cells.iter().flatten().filter(|p| p.kind == kind).count()
    }

    /// Puts an entity on an empty cell. Returns false if the cell is taken or
    /// out of bounds. Agents are tracked separately through `add_agent`.
    pub fn place(&mut self, kind: EntityKind, position: Position, now: Tick) -> bool {
        if kind == EntityKind::Agent {
            return false;
        }
        let Some(idx) = self.index(position) else {
            return false;
        };
        if self.cells[idx].is_some() {
            return false;
        }
        self.cells[idx] = Some(Placed { kind, created_at: now });
        if kind == EntityKind::FuelStation {
            self.fuel_station = Some(position);
        }
        true
    }

    pub fn remove(&mut self, position: Position) -> Option<EntityKind> {
        let idx = self.index(position)?;
        let removed = self.cells[idx].take().map(|placed| placed.kind);
        if removed == Some(EntityKind::FuelStation) {
            self.fuel_station = None;
        }
        removed
    }

    /// A uniformly drawn empty cell, if one turns up within a few attempts
    pub fn random_free_cell<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Position> {
        (0..PLACEMENT_ATTEMPTS)
            .map(|_| Position::new(rng.gen_range(0..self.width), rng.gen_range(0..self.height)))
            .find(|&position| self.entity_at(position).is_none())
    }

    /// A free cell for an agent to start on
    pub fn random_start<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        self.random_free_cell(rng).unwrap_or_else(|| Position::new(0, 0))
    }

    pub fn add_agent(&mut self, id: AgentId, position: Position) {
        self.agents.insert(id, position);
    }

    pub fn agent_position(&self, id: &AgentId) -> Option<Position> {
        self.agents.get(id).copied()
    }

    /// Everything within Chebyshev `range` of `origin`, row by row, including
    /// other agents but not the observer
    pub fn observe(&self, observer: &AgentId, origin: Position, range: i32) -> Vec<Observation> {
        let mut seen = Vec::new();
        for y in (origin.y - range)..=(origin.y + range) {
            for x in (origin.x - range)..=(origin.x + range) {
                let position = Position::new(x, y);
                if let Some(kind) = self.entity_at(position) {
                    seen.push(Observation::new(kind, position));
                }
            }
        }
        seen.extend(
            self.agents
                .iter()
                .filter(|(id, position)| *id != observer && origin.chebyshev(**position) <= range)
                .map(|(_, position)| Observation::new(EntityKind::Agent, *position)),
        );
        seen
    }

    /// Carries out one agent action against the grid
    pub fn resolve(
        &mut self,
        agent: &AgentId,
        status: &AgentStatus,
        carry_capacity: usize,
        action: ActionKind,
    ) -> ActionOutcome {
        let here = status.position;
        let outcome = match action {
            ActionKind::Move(direction) => {
                let next = here.step(direction);
                if status.fuel == 0 {
                    ActionOutcome::Failed
                } else if !self.in_bounds(next) || self.entity_at(next) == Some(EntityKind::Obstacle) {
                    self.stats.blocked_moves += 1;
                    ActionOutcome::Blocked
                } else {
                    self.agents.insert(agent.clone(), next);
                    ActionOutcome::Moved { to: next }
                }
            }
            ActionKind::Pickup => {
                if self.entity_at(here) == Some(EntityKind::Tile) && status.carried < carry_capacity {
                    self.remove(here);
                    self.stats.tiles_picked += 1;
                    ActionOutcome::PickedUp
                } else {
                    ActionOutcome::Failed
                }
            }
            ActionKind::Putdown => {
                if self.entity_at(here) == Some(EntityKind::Hole) && status.carried > 0 {
                    self.remove(here);
                    self.stats.holes_filled += 1;
                    ActionOutcome::PutDown
                } else {
                    ActionOutcome::Failed
                }
            }
            ActionKind::Refuel => {
                if self.fuel_station == Some(here) {
                    self.stats.refuels += 1;
                    ActionOutcome::Refueled
                } else {
                    ActionOutcome::Failed
                }
            }
            ActionKind::Stay => ActionOutcome::Stayed,
        };

        if outcome == ActionOutcome::Failed {
            self.stats.failed_actions += 1;
            tracing::debug!(agent = %agent, ?action, position = %here, "action failed");
        }
        outcome
    }

    /// Expires old tiles and holes, then tops both back up to their targets
    pub fn churn<R: Rng + ?Sized>(&mut self, now: Tick, rng: &mut R) -> ChurnSummary {
        let mut summary = ChurnSummary::default();
        let lifetime = self.entity_lifetime;

        for cell in self.cells.iter_mut() {
            let expired = matches!(
                cell,
                Some(placed)
                    if matches!(placed.kind, EntityKind::Tile | EntityKind::Hole)
                        && now.saturating_sub(placed.created_at) > lifetime
            );
            if !expired {
                continue;
            }
            if let Some(placed) = cell.take() {
                match placed.kind {
                    EntityKind::Tile => self.stats.tiles_expired += 1,
                    _ => self.stats.holes_expired += 1,
                }
                summary.expired += 1;
            }
        }

        for (kind, target) in [(EntityKind::Tile, self.tile_target), (EntityKind::Hole, self.hole_target)] {
            let missing = target.saturating_sub(self.count(kind));
            for _ in 0..missing {
                let Some(cell) = self.random_free_cell(rng) else { break };
                self.place(kind, cell, now);
                summary.spawned += 1;
            }
        }

        summary
    }
}

//! Reference runner.
//!
//! Wires agents, the grid world, the bus and the event log into a `bevy_ecs`
//! world and steps it one tick at a time.

mod systems;
mod world;

pub use systems::{
    advance_clock, churn_world, collect_bus_garbage, flush_events, tick_agents, EventTally, RunSettings,
    SharedPathFinder, SimClock, SimRng,
};
pub use world::{ChurnSummary, GridWorld, WorldStats};

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tile_events::{Position, TaskKind, Tick};

use crate::agent::TileAgent;
use crate::comms::CommunicationBus;
use crate::components::AgentId;
use crate::config::Config;
use crate::events::{EventLogger, PendingEvents};
use crate::pathfinding::AStarPathFinder;

/// Snapshot of one agent for reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: AgentId,
    pub position: Position,
    pub fuel: u32,
    pub carried: usize,
    pub task: TaskKind,
    pub remembered: usize,
    pub exploration_efficiency: f64,
}

/// State of a run at one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub tick: Tick,
    /// Holes filled so far
    pub score: u64,
    pub world: WorldStats,
    pub messages_on_bus: usize,
    pub events_logged: u64,
    pub agents: Vec<AgentSummary>,
}

pub struct Simulation {
    world: World,
    schedule: Schedule,
}

impl Simulation {
    /// Builds a randomly generated world seeded from `config.simulation.seed`
    pub fn new(config: &Config, logger: EventLogger) -> Self {
        let mut rng = SmallRng::seed_from_u64(config.simulation.seed);
        let grid = GridWorld::generate(&config.world, &mut rng);
        Self::with_world(config, grid, rng, logger)
    }

    /// Builds a run around a prepared grid. Agents are placed on random free
    /// cells drawn from `rng`.
    pub fn with_world(config: &Config, mut grid: GridWorld, mut rng: SmallRng, logger: EventLogger) -> Self {
        let mut world = World::new();

        for n in 0..config.simulation.agent_count {
            let id = AgentId::new(format!("agent_{:02}", n));
            let start = grid.random_start(&mut rng);
            grid.add_agent(id.clone(), start);
            world.spawn((id.clone(), TileAgent::new(id, start, config)));
        }

        world.insert_resource(SimClock::default());
        world.insert_resource(SimRng(rng));
        world.insert_resource(SharedPathFinder(AStarPathFinder::new(grid.width(), grid.height())));
        world.insert_resource(RunSettings {
            carry_capacity: config.agent.carry_capacity,
            retention_ticks: config.communication.retention_ticks,
        });
        world.insert_resource(grid);
        world.insert_resource(CommunicationBus::new());
        world.insert_resource(PendingEvents::new());
        world.insert_resource(EventTally::default());
        world.insert_resource(logger);

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                advance_clock,
                churn_world,
                tick_agents,
                collect_bus_garbage,
                flush_events,
            )
                .chain(),
        );

        Self { world, schedule }
    }

    pub fn tick(&self) -> Tick {
        self.world.resource::<SimClock>().tick
    }

    /// Advances the run by one tick
    pub fn step(&mut self) {
        self.schedule.run(&mut self.world);
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    pub fn grid(&self) -> &GridWorld {
        self.world.resource::<GridWorld>()
    }

    pub fn bus(&self) -> &CommunicationBus {
        self.world.resource::<CommunicationBus>()
    }

    pub fn tally(&self) -> &EventTally {
        self.world.resource::<EventTally>()
    }

    /// Agents in spawn order
    pub fn agents(&mut self) -> Vec<TileAgent> {
        let mut query = self.world.query::<&TileAgent>();
        query.iter(&self.world).cloned().collect()
    }

    pub fn flush_log(&mut self) -> std::io::Result<()> {
        self.world.resource_mut::<EventLogger>().flush()
    }

    pub fn report(&mut self) -> RunReport {
        let tick = self.tick();
        let agents = self
            .agents()
            .into_iter()
            .map(|agent| AgentSummary {
                id: agent.id().clone(),
                position: agent.position(),
                fuel: agent.fuel(),
                carried: agent.carried(),
                task: agent.task().kind,
                remembered: agent.memory().len(),
                exploration_efficiency: agent.planner().explorer().efficiency(),
            })
            .collect();
        let stats = self.grid().stats();

        RunReport {
            tick,
            score: stats.holes_filled,
            world: stats,
            messages_on_bus: self.bus().len(),
            events_logged: self.world.resource::<EventLogger>().event_count(),
            agents,
        }
    }
}

//! ECS systems for the reference runner, run in this order each tick:
//! advance_clock, churn_world, tick_agents, collect_bus_garbage, flush_events.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;
use std::collections::BTreeMap;
use tile_events::{AgentEvent, Tick};

use super::world::GridWorld;
use crate::agent::TileAgent;
use crate::comms::CommunicationBus;
use crate::events::{EventLogger, PendingEvents};
use crate::pathfinding::AStarPathFinder;

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);

/// Current tick
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimClock {
    pub tick: Tick,
}

/// Route planner shared by all agents
#[derive(Resource, Debug, Clone, Copy)]
pub struct SharedPathFinder(pub AStarPathFinder);

/// Runner knobs that are not part of any agent
#[derive(Resource, Debug, Clone, Copy)]
pub struct RunSettings {
    pub carry_capacity: usize,
    pub retention_ticks: Tick,
}

/// Event counts by category since the start of the run
#[derive(Resource, Debug, Clone, Default, PartialEq, Eq)]
pub struct EventTally {
    pub by_category: BTreeMap<&'static str, u64>,
}

impl EventTally {
    pub fn record(&mut self, events: &[AgentEvent]) {
        for event in events {
            *self.by_category.entry(event.category()).or_insert(0) += 1;
        }
    }

    pub fn get(&self, category: &str) -> u64 {
        self.by_category.get(category).copied().unwrap_or(0)
    }
}

pub fn advance_clock(mut clock: ResMut<SimClock>) {
    clock.tick += 1;
}

pub fn churn_world(clock: Res<SimClock>, mut world: ResMut<GridWorld>, mut rng: ResMut<SimRng>) {
    let summary = world.churn(clock.tick, &mut rng.0);
    if summary.expired > 0 || summary.spawned > 0 {
        tracing::trace!(tick = clock.tick, expired = summary.expired, spawned = summary.spawned, "world churn");
    }
}

/// Senses, thinks and acts for every agent, one after another
#[allow(clippy::too_many_arguments)]
pub fn tick_agents(
    clock: Res<SimClock>,
    settings: Res<RunSettings>,
    finder: Res<SharedPathFinder>,
    mut agents: Query<&mut TileAgent>,
    mut world: ResMut<GridWorld>,
    mut bus: ResMut<CommunicationBus>,
    mut rng: ResMut<SimRng>,
    mut events: ResMut<PendingEvents>,
) {
    let now = clock.tick;
    for mut agent in agents.iter_mut() {
        let observations = world.observe(agent.id(), agent.position(), agent.sensor_range());
        let action = agent.tick(now, &observations, &mut bus, &finder.0, &mut rng.0, &mut *events);
        let outcome = world.resolve(agent.id(), &agent.status(now), settings.carry_capacity, action);
        agent.apply_outcome(outcome, now, &mut bus, &mut *events);
    }
}

pub fn collect_bus_garbage(clock: Res<SimClock>, settings: Res<RunSettings>, mut bus: ResMut<CommunicationBus>) {
    let dropped = bus.retain_recent(clock.tick, settings.retention_ticks);
    if dropped > 0 {
        tracing::trace!(tick = clock.tick, dropped, remaining = bus.len(), "bus garbage collected");
    }
}

pub fn flush_events(
    mut events: ResMut<PendingEvents>,
    mut logger: ResMut<EventLogger>,
    mut tally: ResMut<EventTally>,
) {
    let drained = events.drain();
    if drained.is_empty() {
        return;
    }
    tally.record(&drained);
    if let Err(e) = logger.log_batch(&drained) {
        tracing::warn!(error = %e, "failed to write events");
    }
}

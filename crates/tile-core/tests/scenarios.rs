//! End-to-end agent scenarios
//!
//! Each test drives one or two agents against a hand-built grid world, feeding
//! observations in and outcomes back exactly as the runner does.

use rand::rngs::SmallRng;
use rand::SeedableRng;
use tile_core::comms::Message;
use tile_core::config::{Config, WorldConfig};
use tile_core::sim::GridWorld;
use tile_core::{AStarPathFinder, ActionOutcome, AgentId, CommunicationBus, Percept, TileAgent};
use tile_events::{ActionKind, AgentEvent, AgentEventKind, Direction, EntityKind, MessageKind, Position, TaskKind, Tick};

fn config(width: i32, height: i32) -> Config {
    let mut config = Config::default();
    config.world = WorldConfig {
        width,
        height,
        obstacle_density: 0.0,
        tile_target: 0,
        hole_target: 0,
        entity_lifetime: 1000,
    };
    config.memory.decay_probability = 0.0;
    config
}

struct Harness {
    world: GridWorld,
    bus: CommunicationBus,
    finder: AStarPathFinder,
    rng: SmallRng,
    events: Vec<AgentEvent>,
    capacity: usize,
}

impl Harness {
    fn new(config: &Config) -> Self {
        Self {
            world: GridWorld::empty(&config.world),
            bus: CommunicationBus::new(),
            finder: AStarPathFinder::new(config.world.width, config.world.height),
            rng: SmallRng::seed_from_u64(7),
            events: Vec::new(),
            capacity: config.agent.carry_capacity,
        }
    }

    fn spawn(&mut self, name: &str, at: Position, config: &Config) -> TileAgent {
        let id = AgentId::new(name);
        self.world.add_agent(id.clone(), at);
        TileAgent::new(id, at, config)
    }

    /// One full sense-plan-act cycle; returns the action and its outcome
    fn step(&mut self, agent: &mut TileAgent, now: Tick) -> (ActionKind, ActionOutcome) {
        let seen = self.world.observe(agent.id(), agent.position(), agent.sensor_range());
        let action = agent.tick(now, &seen, &mut self.bus, &self.finder, &mut self.rng, &mut self.events);
        let outcome = self
            .world
            .resolve(agent.id(), &agent.status(now), self.capacity, action);
        agent.apply_outcome(outcome, now, &mut self.bus, &mut self.events);
        (action, outcome)
    }
}

#[test]
fn fuel_emergency_heads_for_reported_station() {
    let config = config(20, 20);
    let mut harness = Harness::new(&config);
    let station = Position::new(10, 10);
    harness.world.place(EntityKind::FuelStation, station, 0);

    let threshold = config.planner.fuel_threshold;
    let mut agent = harness
        .spawn("runner", Position::new(2, 2), &config)
        .with_fuel(threshold - 1);

    harness.step(&mut agent, 1);
    assert_eq!(agent.task().kind, TaskKind::Refuel);
    assert!(harness
        .bus
        .read_all()
        .iter()
        .any(|m| m.kind() == MessageKind::FuelLow));

    // A peer reports the station
    let report = Percept::new(EntityKind::FuelStation, station, 1);
    harness.bus.post(Message::broadcast(
        AgentId::new("scout"),
        MessageKind::FuelStationFound,
        Some(report),
        1,
    ));

    harness.step(&mut agent, 2);
    assert_eq!(agent.task().target, Some(station));

    let mut refuelled_at = None;
    for now in 3..60 {
        let (action, outcome) = harness.step(&mut agent, now);
        if action == ActionKind::Refuel {
            assert_eq!(outcome, ActionOutcome::Refueled);
            refuelled_at = Some(agent.position());
            break;
        }
    }

    assert_eq!(refuelled_at, Some(station));
    assert_eq!(agent.fuel(), config.agent.fuel_capacity);
}

#[test]
fn pickup_and_delivery_cycle() {
    let config = config(20, 20);
    let mut harness = Harness::new(&config);
    for (x, y) in [(2, 0), (4, 0), (4, 2)] {
        harness.world.place(EntityKind::Tile, Position::new(x, y), 0);
    }
    let mut agent = harness.spawn("carrier", Position::new(0, 0), &config);

    let mut pickups = Vec::new();
    let mut holes_revealed = false;
    let mut first_putdown = None;
    let mut last_action = ActionKind::Stay;

    for now in 1..120 {
        let (action, outcome) = harness.step(&mut agent, now);
        match outcome {
            ActionOutcome::PickedUp => pickups.push(agent.position()),
            ActionOutcome::PutDown if first_putdown.is_none() => {
                first_putdown = Some(agent.position());
                assert!(matches!(last_action, ActionKind::Move(_)));
            }
            _ => {}
        }
        last_action = action;

        if agent.carried() == 3 && !holes_revealed {
            for (x, y) in [(5, 5), (5, 6), (5, 7)] {
                harness.world.place(EntityKind::Hole, Position::new(x, y), now);
            }
            holes_revealed = true;
        }
        if holes_revealed && agent.carried() == 0 {
            harness.step(&mut agent, now + 1);
            break;
        }
    }

    assert_eq!(
        pickups,
        vec![Position::new(2, 0), Position::new(4, 0), Position::new(4, 2)]
    );
    assert_eq!(first_putdown, Some(Position::new(5, 5)));
    assert_eq!(agent.carried(), 0);
    assert_eq!(harness.world.stats().holes_filled, 3);
    assert!(matches!(agent.task().kind, TaskKind::Collect | TaskKind::Explore));
}

#[test]
fn exploration_sweeps_rows() {
    let config = {
        let mut config = config(8, 15);
        config.planner.row_stride = 7;
        config
    };
    let mut harness = Harness::new(&config);
    let mut agent = harness.spawn("sweeper", Position::new(0, 0), &config);

    let mut goals: Vec<Position> = Vec::new();
    for now in 1..=40 {
        harness.step(&mut agent, now);
        assert_eq!(agent.task().kind, TaskKind::Explore);
        if let Some(goal) = agent.planner().explorer().goal() {
            if goals.last() != Some(&goal) {
                goals.push(goal);
            }
        }
    }

    let mut expected: Vec<Position> = (1..=7).map(|x| Position::new(x, 0)).collect();
    expected.push(Position::new(7, 7));
    expected.extend((0..=6).rev().map(|x| Position::new(x, 7)));
    expected.push(Position::new(0, 14));
    expected.extend((1..=7).map(|x| Position::new(x, 14)));
    // Past the bottom the sweep wraps to row 0
    expected.push(Position::new(7, 0));

    assert!(goals.len() >= expected.len(), "only reached {:?}", goals);
    assert_eq!(goals[..expected.len()], expected[..]);
}

#[test]
fn peer_pickup_redirects_collect() {
    let config = config(20, 20);
    let mut harness = Harness::new(&config);
    let taken = Position::new(5, 2);
    harness.world.place(EntityKind::Tile, taken, 0);
    let mut agent = harness.spawn("collector", Position::new(2, 2), &config);

    let (action, _) = harness.step(&mut agent, 1);
    assert_eq!(agent.task().kind, TaskKind::Collect);
    assert_eq!(action, ActionKind::Move(Direction::East));
    assert_eq!(agent.position(), Position::new(3, 2));

    // A peer takes the tile; a fresh one shows up to the south
    let fresh = Position::new(3, 5);
    harness.world.remove(taken);
    harness.world.place(EntityKind::Tile, fresh, 2);
    harness.bus.post(Message::broadcast(
        AgentId::new("peer"),
        MessageKind::TilePickedUp,
        Some(Percept::new(EntityKind::Tile, taken, 2)),
        2,
    ));

    let (action, _) = harness.step(&mut agent, 2);
    assert!(agent.memory().get(taken).is_none());
    assert_eq!(agent.task().target, Some(fresh));
    assert_eq!(action, ActionKind::Move(Direction::South));
}

#[test]
fn two_agents_announce_a_tile_once() {
    let config = config(20, 20);
    let mut harness = Harness::new(&config);
    let tile = Position::new(5, 5);
    harness.world.place(EntityKind::Tile, tile, 0);

    let mut left = harness.spawn("left", Position::new(3, 5), &config);
    let mut right = harness.spawn("right", Position::new(7, 5), &config);
    harness.step(&mut left, 1);
    harness.step(&mut right, 1);

    let announcements = harness
        .bus
        .read_all()
        .iter()
        .filter(|m| m.kind() == MessageKind::TileFound && m.describes(EntityKind::Tile, tile))
        .count();
    assert_eq!(announcements, 1);
    assert_eq!(right.memory().get(tile).map(|p| p.kind), Some(EntityKind::Tile));
}

#[test]
fn messages_are_applied_once_per_agent() {
    let config = config(20, 20);
    let mut harness = Harness::new(&config);
    let mut reader = harness.spawn("reader", Position::new(0, 0), &config);

    let hole = Position::new(15, 15);
    let id = harness.bus.post(Message::broadcast(
        AgentId::new("writer"),
        MessageKind::HoleFound,
        Some(Percept::new(EntityKind::Hole, hole, 1)),
        1,
    ));

    harness.step(&mut reader, 1);
    let after_first = reader.memory().get(hole).copied();
    assert!(after_first.is_some());

    harness.step(&mut reader, 2);
    assert_eq!(reader.memory().get(hole).copied(), after_first);

    let received = harness
        .events
        .iter()
        .filter(|e| matches!(e.kind, AgentEventKind::MessageReceived { message_id, .. } if message_id == id.0))
        .count();
    assert_eq!(received, 1);
    assert!(harness.bus.get(id).unwrap().is_processed_by(reader.id()));
}

//! Grid Vocabulary
//!
//! Positions, directions and entity kinds shared by every crate in the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell on the grid. `y` grows southwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Position offset by `(dx, dy)`
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Neighbouring cell in the given direction
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.offset(dx, dy)
    }

    /// Square-radius distance, used for sensor range checks
    pub fn chebyshev(self, other: Position) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Grid walking distance
    pub fn manhattan(self, other: Position) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Squared euclidean distance (avoids floats when only ordering matters)
    pub fn distance_squared(self, other: Position) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Compass direction of a single move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// `(dx, dy)` for one step in this direction
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// All directions in fixed order: N, E, S, W.
    pub const fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Direction that moves `from` onto an adjacent `to`, if they are adjacent
    pub fn between(from: Position, to: Position) -> Option<Direction> {
        Direction::all()
            .into_iter()
            .find(|direction| from.step(*direction) == to)
    }
}

/// Everything an agent can perceive on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Collectible resource
    Tile,
    /// Drop-site for tiles
    Hole,
    /// Impassable cell
    Obstacle,
    /// The shared refuelling location
    FuelStation,
    /// Another agent
    Agent,
}

impl EntityKind {
    /// Returns all entity kind variants.
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Tile,
            EntityKind::Hole,
            EntityKind::Obstacle,
            EntityKind::FuelStation,
            EntityKind::Agent,
        ]
    }

    /// Static entities stay put until something consumes them
    pub fn is_static(self) -> bool {
        !matches!(self, EntityKind::Agent)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Tile => "tile",
            EntityKind::Hole => "hole",
            EntityKind::Obstacle => "obstacle",
            EntityKind::FuelStation => "fuel_station",
            EntityKind::Agent => "agent",
        };
        f.write_str(name)
    }
}

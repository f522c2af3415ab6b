//! Pathfinding contract and the grid A* behind it.
//!
//! The planner only depends on [`PathFinder`]: a pure, synchronous query from
//! start to goal given a blocked-cell predicate.

mod astar;

use std::collections::VecDeque;
use tile_events::{Direction, Position};

pub use astar::AStarPathFinder;

/// Grid search capability
pub trait PathFinder {
    /// Route from `start` to `goal` avoiding cells for which `is_blocked` holds.
    ///
    /// Returns `None` when no route exists. A route from a cell to itself is
    /// empty.
    fn find_path(
        &self,
        start: Position,
        goal: Position,
        is_blocked: &dyn Fn(Position) -> bool,
    ) -> Option<Route>;
}

/// One move of a route and the cell it lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStep {
    pub direction: Direction,
    pub position: Position,
}

/// Ordered moves from a start cell to a destination, consumed one per tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    steps: VecDeque<PathStep>,
    destination: Position,
}

impl Route {
    pub fn new(steps: impl IntoIterator<Item = PathStep>, destination: Position) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            destination,
        }
    }

    /// Route that is already at its destination
    pub fn arrived(destination: Position) -> Self {
        Self::new(Vec::new(), destination)
    }

    pub fn destination(&self) -> Position {
        self.destination
    }

    /// Next step without consuming it
    pub fn peek(&self) -> Option<&PathStep> {
        self.steps.front()
    }

    /// Consumes the next step
    pub fn next_step(&mut self) -> Option<PathStep> {
        self.steps.pop_front()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> impl Iterator<Item = &PathStep> {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_consumption() {
        let start = Position::new(0, 0);
        let first = PathStep {
            direction: Direction::East,
            position: start.step(Direction::East),
        };
        let second = PathStep {
            direction: Direction::South,
            position: first.position.step(Direction::South),
        };
        let mut route = Route::new([first, second], second.position);

        assert_eq!(route.len(), 2);
        assert_eq!(route.peek(), Some(&first));
        assert_eq!(route.next_step(), Some(first));
        assert_eq!(route.next_step(), Some(second));
        assert!(route.is_empty());
        assert_eq!(route.next_step(), None);
        assert_eq!(route.destination(), Position::new(1, 1));
    }
}

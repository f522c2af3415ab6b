//! Boustrophedon sweep.
//!
//! Goals march one cell at a time along a row. At the edge the sweep drops
//! `row_stride` rows (back to row 0 past the bottom) and turns around.

use std::collections::{HashSet, VecDeque};
use tile_events::{Direction, Position};

/// Goals kept for the efficiency ratio
const GOAL_HISTORY: usize = 100;

#[derive(Debug, Clone)]
pub struct Explorer {
    width: i32,
    height: i32,
    row_stride: i32,
    goal: Option<Position>,
    row: i32,
    heading: Direction,
    history: VecDeque<Position>,
}

impl Explorer {
    pub fn new(width: i32, height: i32, row_stride: i32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            row_stride: row_stride.max(1),
            goal: None,
            row: 0,
            heading: Direction::East,
            history: VecDeque::with_capacity(GOAL_HISTORY),
        }
    }

    /// Current sweep goal, if the sweep has started
    pub fn goal(&self) -> Option<Position> {
        self.goal
    }

    pub fn heading(&self) -> Direction {
        self.heading
    }

    /// Advances the sweep as seen from `from`, the agent's cell.
    ///
    /// The first goal is `from` itself, heading east on its row.
    pub fn next_goal(&mut self, from: Position) -> Position {
        let goal = match self.goal {
            None => {
                self.row = from.y;
                self.heading = Direction::East;
                from
            }
            Some(_) => self.step_from(from),
        };
        self.set_goal(goal)
    }

    /// Skips the current goal, advancing from the goal cell instead of the
    /// agent. Used when the goal cannot be reached.
    pub fn skip(&mut self, from: Position) -> Position {
        let anchor = self.goal.unwrap_or(from);
        let goal = self.step_from(anchor);
        self.set_goal(goal)
    }

    fn step_from(&mut self, from: Position) -> Position {
        let max_x = self.width - 1;
        let at_edge = match self.heading {
            Direction::West => from.x <= 0,
            _ => from.x >= max_x,
        };

        if at_edge {
            self.row += self.row_stride;
            if self.row > self.height - 1 {
                self.row = 0;
            }
            self.heading = match self.heading {
                Direction::West => Direction::East,
                _ => Direction::West,
            };
            Position::new(from.x.clamp(0, max_x), self.row)
        } else {
            from.step(self.heading)
        }
    }

    fn set_goal(&mut self, goal: Position) -> Position {
        if self.history.len() == GOAL_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(goal);
        self.goal = Some(goal);
        goal
    }

    /// Share of distinct cells among recent goals, 0.0 before the first goal
    pub fn efficiency(&self) -> f64 {
        if self.history.is_empty() {
            return 0.0;
        }
        let distinct: HashSet<&Position> = self.history.iter().collect();
        distinct.len() as f64 / self.history.len() as f64
    }
}

use core::cmp::Ordering;
use std::collections::BinaryHeap;
use tile_events::{Direction, Position};

use super::{PathFinder, PathStep, Route};

#[derive(Debug)]
struct OpenNode {
    f: u32,
    g: u32,
    position: Position,
    tie: u64,
}

impl OpenNode {
    fn key(&self) -> (u32, u32, Position, u64) {
        (self.f, self.g, self.position, self.tie)
    }
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap behave like a min-heap.
        other.key().cmp(&self.key())
    }
}

/// 4-connected A* over a bounded grid with unit step cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AStarPathFinder {
    width: i32,
    height: i32,
}

impl AStarPathFinder {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    fn idx(&self, position: Position) -> Option<usize> {
        if position.x < 0 || position.y < 0 || position.x >= self.width || position.y >= self.height {
            return None;
        }
        Some((position.y * self.width + position.x) as usize)
    }

    fn heuristic(a: Position, b: Position) -> u32 {
        a.manhattan(b) as u32
    }

    fn reconstruct(
        &self,
        came_from: &[Option<(usize, Direction)>],
        goal_idx: usize,
        goal: Position,
    ) -> Route {
        let mut steps = Vec::new();
        let mut current = goal_idx;
        while let Some((prev, direction)) = came_from[current] {
            steps.push(PathStep {
                direction,
                position: self.position_of(current),
            });
            current = prev;
        }
        steps.reverse();
        Route::new(steps, goal)
    }

    fn position_of(&self, idx: usize) -> Position {
        let idx = idx as i32;
        Position::new(idx % self.width, idx / self.width)
    }
}

impl PathFinder for AStarPathFinder {
    fn find_path(
        &self,
        start: Position,
        goal: Position,
        is_blocked: &dyn Fn(Position) -> bool,
    ) -> Option<Route> {
        let start_idx = self.idx(start)?;
        let goal_idx = self.idx(goal)?;
        if start == goal {
            return Some(Route::arrived(goal));
        }
        // The start cell is occupied by the agent itself, so only the goal is checked.
        if is_blocked(goal) {
            return None;
        }

        let grid_len = (self.width * self.height) as usize;
        let mut g_score = vec![u32::MAX; grid_len];
        let mut came_from: Vec<Option<(usize, Direction)>> = vec![None; grid_len];
        let mut open = BinaryHeap::new();
        let mut tie: u64 = 0;

        g_score[start_idx] = 0;
        open.push(OpenNode {
            f: Self::heuristic(start, goal),
            g: 0,
            position: start,
            tie,
        });

        while let Some(node) = open.pop() {
            if node.position == goal {
                return Some(self.reconstruct(&came_from, goal_idx, goal));
            }

            let node_idx = self.idx(node.position)?;
            if node.g != g_score[node_idx] {
                // Stale heap entry.
                continue;
            }

            // Fixed order for determinism: N, E, S, W.
            for direction in Direction::all() {
                let next = node.position.step(direction);
                let Some(next_idx) = self.idx(next) else { continue };
                if is_blocked(next) {
                    continue;
                }

                let tentative_g = node.g.saturating_add(1);
                if tentative_g >= g_score[next_idx] {
                    continue;
                }

                came_from[next_idx] = Some((node_idx, direction));
                g_score[next_idx] = tentative_g;
                tie += 1;
                open.push(OpenNode {
                    f: tentative_g.saturating_add(Self::heuristic(next, goal)),
                    g: tentative_g,
                    position: next,
                    tie,
                });
            }
        }

        None
    }
}

use serde::{Deserialize, Serialize};
use tile_events::{Position, TaskKind, Tick, TransitionReason};

/// The one task an agent is working on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub kind: TaskKind,
    pub target: Option<Position>,
    pub started_at: Tick,
}

impl Task {
    pub fn new(kind: TaskKind, target: Option<Position>, started_at: Tick) -> Self {
        Self {
            kind,
            target,
            started_at,
        }
    }

    pub fn explore(started_at: Tick) -> Self {
        Self::new(TaskKind::Explore, None, started_at)
    }

    pub fn age(&self, now: Tick) -> Tick {
        now.saturating_sub(self.started_at)
    }

    /// Exploration never times out
    pub fn is_timed_out(&self, now: Tick, timeout: Tick) -> bool {
        self.kind != TaskKind::Explore && self.age(now) > timeout
    }
}

/// A change of task, reported by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: TaskKind,
    pub to: TaskKind,
    pub target: Option<Position>,
    pub reason: TransitionReason,
}

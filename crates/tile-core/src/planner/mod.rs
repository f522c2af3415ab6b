//! Task planner.
//!
//! A four-state machine (Explore, Collect, Deliver, Refuel). `evaluate` picks
//! the task, `plan` turns it into one action per tick.

mod explore;
mod task;

pub use explore::Explorer;
pub use task::{Task, Transition};

use tile_events::{ActionKind, EntityKind, Position, TaskKind, Tick, TransitionReason};

use crate::components::AgentStatus;
use crate::config::PlannerConfig;
use crate::memory::SpatialMemory;
use crate::pathfinding::{PathFinder, Route};

#[derive(Debug, Clone)]
pub struct Planner {
    config: PlannerConfig,
    carry_capacity: usize,
    task: Task,
    route: Option<Route>,
    explorer: Explorer,
    last_evaluation: Option<Tick>,
    needs_evaluation: bool,
}

impl Planner {
    pub fn new(width: i32, height: i32, carry_capacity: usize, config: &PlannerConfig) -> Self {
        Self {
            carry_capacity,
            task: Task::explore(0),
            route: None,
            explorer: Explorer::new(width, height, config.row_stride),
            last_evaluation: None,
            needs_evaluation: true,
            config: config.clone(),
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn explorer(&self) -> &Explorer {
        &self.explorer
    }

    pub fn is_fuel_low(&self, fuel: u32) -> bool {
        fuel < self.config.fuel_threshold
    }

    /// Under half the refuel threshold
    pub fn is_fuel_critical(&self, fuel: u32) -> bool {
        fuel < self.config.fuel_threshold / 2
    }

    /// Re-evaluates the task when due and reports a change of task.
    ///
    /// Due means: every `evaluation_interval` ticks, after a completed or
    /// failed action, or when fuel runs low outside a refuel. A timed-out task
    /// is abandoned to exploration until the next evaluation.
    pub fn evaluate(&mut self, status: &AgentStatus, memory: &SpatialMemory) -> Option<Transition> {
        let now = status.now;
        let fuel_emergency = self.is_fuel_low(status.fuel) && self.task.kind != TaskKind::Refuel;

        if !fuel_emergency && self.task.is_timed_out(now, self.config.task_timeout) {
            tracing::debug!(task = ?self.task.kind, target = ?self.task.target, "task timed out");
            self.last_evaluation = Some(now);
            self.needs_evaluation = false;
            return self.switch_to(Task::explore(now), TransitionReason::Timeout);
        }

        let scheduled = self
            .last_evaluation
            .map_or(true, |last| now.saturating_sub(last) >= self.config.evaluation_interval);
        if !(fuel_emergency || scheduled || self.needs_evaluation) {
            return None;
        }
        self.last_evaluation = Some(now);
        self.needs_evaluation = false;

        let (kind, target) = self.choose(status, memory);
        if kind == self.task.kind {
            if target.is_some() && target != self.task.target {
                self.task.target = target;
                self.route = None;
            }
            return None;
        }

        let reason = if fuel_emergency {
            TransitionReason::FuelEmergency
        } else {
            TransitionReason::Evaluation
        };
        self.switch_to(Task::new(kind, target, now), reason)
    }

    fn switch_to(&mut self, task: Task, reason: TransitionReason) -> Option<Transition> {
        let from = self.task.kind;
        self.task = task;
        self.route = None;
        Some(Transition {
            from,
            to: task.kind,
            target: task.target,
            reason,
        })
    }

    /// Task selection, fuel first
    fn choose(&self, status: &AgentStatus, memory: &SpatialMemory) -> (TaskKind, Option<Position>) {
        if self.is_fuel_low(status.fuel) {
            return (TaskKind::Refuel, Self::fuel_station(memory));
        }
        if status.carried >= self.carry_capacity {
            return (TaskKind::Deliver, self.known_nearby(EntityKind::Hole, status, memory));
        }

        let tile = self.known_nearby(EntityKind::Tile, status, memory);
        if status.carried == 0 {
            if tile.is_some() {
                return (TaskKind::Collect, tile);
            }
            return (TaskKind::Explore, None);
        }

        if let Some(hole) = self.known_nearby(EntityKind::Hole, status, memory) {
            return (TaskKind::Deliver, Some(hole));
        }
        if tile.is_some() {
            return (TaskKind::Collect, tile);
        }
        (TaskKind::Explore, None)
    }

    fn fuel_station(memory: &SpatialMemory) -> Option<Position> {
        memory.fuel_station().or_else(|| {
            memory
                .closest_in_sensor_range(EntityKind::FuelStation)
                .map(|p| p.position)
        })
    }

    /// Whether memory still places `kind` at `target`. Evicted or decayed
    /// targets are dropped.
    fn still_holds(memory: &SpatialMemory, kind: EntityKind, target: Position) -> bool {
        memory.get(target).map_or(false, |p| p.kind == kind)
            || memory
                .closest_in_sensor_range(kind)
                .map_or(false, |p| p.position == target)
    }

    /// Closest of `kind` in sensor range, else the best match in memory
    fn known_nearby(&self, kind: EntityKind, status: &AgentStatus, memory: &SpatialMemory) -> Option<Position> {
        memory
            .closest_in_sensor_range(kind)
            .or_else(|| memory.nearest_of_kind(status.position, kind, self.config.memory_recency, status.now))
            .map(|p| p.position)
    }

    /// The action for this tick. Never fails: dead ends explore, then stay.
    pub fn plan(&mut self, status: &AgentStatus, memory: &SpatialMemory, pathfinder: &dyn PathFinder) -> ActionKind {
        match self.task.kind {
            TaskKind::Explore => self.explore(status, memory, pathfinder),
            TaskKind::Collect => self.pursue(EntityKind::Tile, ActionKind::Pickup, status, memory, pathfinder),
            TaskKind::Deliver => self.pursue(EntityKind::Hole, ActionKind::Putdown, status, memory, pathfinder),
            TaskKind::Refuel => {
                self.pursue(EntityKind::FuelStation, ActionKind::Refuel, status, memory, pathfinder)
            }
        }
    }

    fn pursue(
        &mut self,
        kind: EntityKind,
        terminal: ActionKind,
        status: &AgentStatus,
        memory: &SpatialMemory,
        pathfinder: &dyn PathFinder,
    ) -> ActionKind {
        let target = match self.task.kind {
            TaskKind::Refuel => Self::fuel_station(memory),
            _ => self
                .task
                .target
                .filter(|target| Self::still_holds(memory, kind, *target))
                .or_else(|| self.known_nearby(kind, status, memory)),
        };
        if target != self.task.target {
            self.route = None;
            self.task.target = target;
        }
        let Some(target) = target else {
            self.needs_evaluation = true;
            return self.explore(status, memory, pathfinder);
        };

        if status.position == target {
            self.route = None;
            return terminal;
        }
        match self.step_towards(target, status.position, memory, pathfinder) {
            Some(action) => action,
            None => {
                tracing::debug!(task = ?self.task.kind, %target, "no route to target");
                self.needs_evaluation = true;
                self.explore(status, memory, pathfinder)
            }
        }
    }

    fn explore(&mut self, status: &AgentStatus, memory: &SpatialMemory, pathfinder: &dyn PathFinder) -> ActionKind {
        let position = status.position;
        let goal = match self.explorer.goal() {
            Some(goal) if goal != position => goal,
            _ => self.explorer.next_goal(position),
        };
        if let Some(action) = self.step_towards(goal, position, memory, pathfinder) {
            return action;
        }

        let goal = if goal == position {
            self.explorer.next_goal(position)
        } else {
            self.explorer.skip(position)
        };
        self.step_towards(goal, position, memory, pathfinder)
            .unwrap_or(ActionKind::Stay)
    }

    /// One step along the cached route, replanning when it no longer fits
    fn step_towards(
        &mut self,
        target: Position,
        position: Position,
        memory: &SpatialMemory,
        pathfinder: &dyn PathFinder,
    ) -> Option<ActionKind> {
        let usable = self.route.as_ref().map_or(false, |route| {
            route.destination() == target
                && route.peek().map_or(false, |step| {
                    position.step(step.direction) == step.position && !memory.is_blocked(step.position)
                })
        });
        if !usable {
            self.route = pathfinder.find_path(position, target, &|p| memory.is_blocked(p));
        }

        let step = self.route.as_mut().and_then(Route::next_step);
        if self.route.as_ref().map_or(false, Route::is_empty) {
            self.route = None;
        }
        step.map(|step| ActionKind::Move(step.direction))
    }

    /// Forces an evaluation on the next call to `evaluate`
    pub fn request_evaluation(&mut self) {
        self.needs_evaluation = true;
    }

    /// The last move was refused; the route is no longer trusted
    pub fn on_blocked(&mut self) {
        self.route = None;
    }

    /// A terminal action finished, successfully or not. The target is spent.
    pub fn on_completed(&mut self) {
        self.route = None;
        self.task.target = None;
        self.needs_evaluation = true;
    }
}

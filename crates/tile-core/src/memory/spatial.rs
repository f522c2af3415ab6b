//! Spatial working memory.
//!
//! A full image of the grid, one percept per cell, trading space for cheap
//! overwrites. Cells fade out probabilistically and are forced out after
//! `max_age` ticks.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tile_events::{EntityKind, Position, Tick};

use super::spiral::spiral;
use crate::config::MemoryConfig;

/// One entity the world reports as visible this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub kind: EntityKind,
    pub position: Position,
}

impl Observation {
    pub const fn new(kind: EntityKind, position: Position) -> Self {
        Self { kind, position }
    }
}

/// A timestamped observation of one entity at one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percept {
    pub kind: EntityKind,
    pub position: Position,
    pub observed_at: Tick,
}

impl Percept {
    pub const fn new(kind: EntityKind, position: Position, observed_at: Tick) -> Self {
        Self {
            kind,
            position,
            observed_at,
        }
    }

    /// Ticks elapsed since the observation
    pub fn age(&self, now: Tick) -> Tick {
        now.saturating_sub(self.observed_at)
    }
}

/// Errors raised while storing a percept
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("{kind} at {position} is outside the {width}x{height} grid")]
    OutOfBounds {
        kind: EntityKind,
        position: Position,
        width: i32,
        height: i32,
    },
}

/// Result of one perception refresh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSummary {
    /// Cells overwritten
    pub written: usize,
    /// Percepts skipped because they could not be stored
    pub rejected: Vec<MemoryError>,
}

/// Per-agent decaying map of everything perceived or reported
#[derive(Debug, Clone)]
pub struct SpatialMemory {
    width: i32,
    height: i32,
    cells: Vec<Option<Percept>>,
    occupied: usize,
    /// Nearest entity of each kind in the last perception batch
    closest: HashMap<EntityKind, Percept>,
    fuel_station: Option<Position>,
    max_age: Tick,
    decay_probability: f64,
    spiral: Vec<(i32, i32)>,
}

impl SpatialMemory {
    /// Creates an empty memory for a `width` x `height` grid.
    ///
    /// Nearest-object searches cover `sensor_range * search_range_factor` cells
    /// around the query point.
    pub fn new(width: i32, height: i32, sensor_range: i32, config: &MemoryConfig) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![None; (width * height) as usize],
            occupied: 0,
            closest: HashMap::with_capacity(EntityKind::all().len()),
            fuel_station: None,
            max_age: config.max_age,
            decay_probability: config.decay_probability.clamp(0.0, 1.0),
            spiral: spiral(sensor_range * config.search_range_factor),
        }
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
        if !self.in_bounds(position) {
            return None;
        }
        Some((position.y * self.width + position.x) as usize)
    }

    /// Refreshes memory with this tick's observations, seen from `origin`.
    ///
    /// The closest-in-sensor-range index is rebuilt from this batch alone, so an
    /// empty batch clears it without touching any remembered cell. Agents only
    /// feed the index: they move every tick and are never written to cells.
    pub fn update(&mut self, origin: Position, observations: &[Observation], now: Tick) -> UpdateSummary {
        self.closest.clear();
        let mut summary = UpdateSummary::default();

        for observation in observations {
            let percept = Percept::new(observation.kind, observation.position, now);
            if !self.in_bounds(percept.position) {
                let error = self.out_of_bounds(&percept);
                tracing::warn!(%error, "skipping percept");
                summary.rejected.push(error);
                continue;
            }

            self.note_closest(origin, percept);
            if percept.kind == EntityKind::Agent {
                continue;
            }
            if self.ingest(percept).is_ok() {
                summary.written += 1;
            }
        }

        summary
    }

    /// Stores a percept that arrived in a message rather than through sensing.
    ///
    /// Fuel stations also fill the dedicated station slot, which never decays.
    pub fn apply_external(&mut self, percept: Percept) -> Result<(), MemoryError> {
        if percept.kind == EntityKind::Agent {
            return Ok(());
        }
        self.ingest(percept)?;
        if percept.kind == EntityKind::FuelStation {
            self.fuel_station = Some(percept.position);
        }
        Ok(())
    }

    fn ingest(&mut self, percept: Percept) -> Result<(), MemoryError> {
        let Some(idx) = self.index(percept.position) else {
            return Err(self.out_of_bounds(&percept));
        };
        if self.cells[idx].is_none() {
            self.occupied += 1;
        }
        self.cells[idx] = Some(percept);
        Ok(())
    }

    fn out_of_bounds(&self, percept: &Percept) -> MemoryError {
        MemoryError::OutOfBounds {
            kind: percept.kind,
            position: percept.position,
            width: self.width,
            height: self.height,
        }
    }

    fn note_closest(&mut self, origin: Position, percept: Percept) {
        let distance = origin.distance_squared(percept.position);
        let nearer = self
            .closest
            .get(&percept.kind)
            .map_or(true, |current| distance < origin.distance_squared(current.position));
        if nearer {
            self.closest.insert(percept.kind, percept);
        }
    }

    /// Forgets stale cells. Returns how many were removed.
    ///
    /// Cells older than `max_age` always go; younger ones go with the configured
    /// probability. Cells observed this tick are left alone so they can be used
    /// before they get a chance to fade.
    pub fn decay<R: Rng + ?Sized>(&mut self, now: Tick, rng: &mut R) -> usize {
        let mut removed = 0;

        for cell in self.cells.iter_mut() {
            let Some(percept) = cell else { continue };
            let age = percept.age(now);
            let forget = if age > self.max_age {
                true
            } else if age == 0 {
                false
            } else {
                rng.gen::<f64>() < self.decay_probability
            };

            if forget {
                *cell = None;
                removed += 1;
            }
        }

        self.occupied -= removed;
        removed
    }

    /// Nearest remembered entity of `kind`, searching outwards from `origin`.
    ///
    /// Returns the first match seen within `recency` ticks of `now`. If none is
    /// that fresh, returns the most recently observed match found during the
    /// scan, or `None` if nothing of that kind is remembered nearby.
    pub fn nearest_of_kind(
        &self,
        origin: Position,
        kind: EntityKind,
        recency: Tick,
        now: Tick,
    ) -> Option<Percept> {
        let mut most_recent: Option<Percept> = None;

        for &(dx, dy) in &self.spiral {
            let Some(percept) = self.get(origin.offset(dx, dy)) else {
                continue;
            };
            if percept.kind != kind {
                continue;
            }
            if percept.age(now) <= recency {
                return Some(*percept);
            }
            match most_recent {
                Some(best) if best.observed_at >= percept.observed_at => {}
                _ => most_recent = Some(*percept),
            }
        }

        most_recent
    }

    /// Closest entity of `kind` in the last perception batch
    pub fn closest_in_sensor_range(&self, kind: EntityKind) -> Option<Percept> {
        self.closest.get(&kind).copied()
    }

    /// Whether memory says the cell holds an obstacle.
    ///
    /// Unknown cells are assumed passable.
    pub fn is_blocked(&self, position: Position) -> bool {
        matches!(self.get(position), Some(p) if p.kind == EntityKind::Obstacle)
    }

    /// Removes the cell at `position` if it holds `kind`
    pub fn evict(&mut self, position: Position, kind: EntityKind) -> Option<Percept> {
        match self.get(position) {
            Some(percept) if percept.kind == kind => self.forget(position),
            _ => None,
        }
    }

    /// Removes whatever is remembered at `position`
    pub fn forget(&mut self, position: Position) -> Option<Percept> {
        let idx = self.index(position)?;
        let removed = self.cells[idx].take();
        if removed.is_some() {
            self.occupied -= 1;
        }
        removed
    }

    pub fn get(&self, position: Position) -> Option<&Percept> {
        self.index(position).and_then(|idx| self.cells[idx].as_ref())
    }

    /// Number of occupied cells
    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Position of the fuel station, once sensed or reported
    pub fn fuel_station(&self) -> Option<Position> {
        self.fuel_station
    }

    /// All remembered percepts, row by row
    pub fn iter(&self) -> impl Iterator<Item = &Percept> {
        self.cells.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn memory_with(max_age: u64, decay_probability: f64) -> SpatialMemory {
        let config = MemoryConfig {
            max_age,
            decay_probability,
            search_range_factor: 4,
        };
        SpatialMemory::new(20, 20, 3, &config)
    }

    fn obs(kind: EntityKind, x: i32, y: i32) -> Observation {
        Observation::new(kind, Position::new(x, y))
    }

    #[test]
    fn test_update_overwrites_cells() {
        let mut memory = memory_with(10, 0.0);
        let origin = Position::new(5, 5);

        memory.update(origin, &[obs(EntityKind::Tile, 6, 5)], 1);
        memory.update(origin, &[obs(EntityKind::Hole, 6, 5)], 2);

        let cell = memory.get(Position::new(6, 5)).unwrap();
        assert_eq!(cell.kind, EntityKind::Hole);
        assert_eq!(cell.observed_at, 2);
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_ingestion_is_idempotent() {
        let mut once = memory_with(10, 0.0);
        let mut twice = memory_with(10, 0.0);
        let percept = Percept::new(EntityKind::Tile, Position::new(2, 3), 4);

        once.apply_external(percept).unwrap();
        twice.apply_external(percept).unwrap();
        twice.apply_external(percept).unwrap();

        assert_eq!(once.get(percept.position), twice.get(percept.position));
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn test_out_of_bounds_is_rejected_not_fatal() {
        let mut memory = memory_with(10, 0.0);
        let summary = memory.update(
            Position::new(0, 0),
            &[obs(EntityKind::Tile, -1, 0), obs(EntityKind::Tile, 1, 0), obs(EntityKind::Hole, 0, 20)],
            1,
        );

        assert_eq!(summary.written, 1);
        assert_eq!(summary.rejected.len(), 2);
        assert!(matches!(summary.rejected[0], MemoryError::OutOfBounds { .. }));

        let external = memory.apply_external(Percept::new(EntityKind::Hole, Position::new(99, 99), 1));
        assert!(external.is_err());
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_empty_update_clears_only_the_index() {
        let mut memory = memory_with(10, 0.0);
        memory.update(Position::new(0, 0), &[obs(EntityKind::Tile, 1, 1)], 1);
        assert!(memory.closest_in_sensor_range(EntityKind::Tile).is_some());

        let summary = memory.update(Position::new(0, 0), &[], 2);
        assert_eq!(summary, UpdateSummary::default());
        assert!(memory.closest_in_sensor_range(EntityKind::Tile).is_none());
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_closest_in_sensor_range_picks_nearest() {
        let mut memory = memory_with(10, 0.0);
        memory.update(
            Position::new(5, 5),
            &[
                obs(EntityKind::Tile, 8, 5),
                obs(EntityKind::Tile, 6, 6),
                obs(EntityKind::Hole, 2, 2),
                obs(EntityKind::Agent, 5, 6),
            ],
            3,
        );

        assert_eq!(
            memory.closest_in_sensor_range(EntityKind::Tile).unwrap().position,
            Position::new(6, 6)
        );
        assert!(memory.closest_in_sensor_range(EntityKind::Agent).is_some());
        assert!(memory.closest_in_sensor_range(EntityKind::FuelStation).is_none());
        // Agents are never written to cells
        assert!(memory.get(Position::new(5, 6)).is_none());
    }

    #[test]
    fn test_decay_forces_out_old_cells() {
        let mut memory = memory_with(10, 0.0);
        let mut rng = SmallRng::seed_from_u64(7);
        memory.update(Position::new(0, 0), &[obs(EntityKind::Tile, 3, 3)], 5);

        for now in 5..=15 {
            memory.decay(now, &mut rng);
            assert!(memory.get(Position::new(3, 3)).is_some(), "still present at {}", now);
        }

        assert_eq!(memory.decay(16, &mut rng), 1);
        assert!(memory.get(Position::new(3, 3)).is_none());
        assert!(memory.is_empty());
    }

    #[test]
    fn test_fresh_cells_survive_certain_decay() {
        let mut memory = memory_with(10, 1.0);
        let mut rng = SmallRng::seed_from_u64(7);
        memory.update(Position::new(0, 0), &[obs(EntityKind::Tile, 3, 3)], 5);

        assert_eq!(memory.decay(5, &mut rng), 0);
        assert_eq!(memory.decay(6, &mut rng), 1);
    }

    #[test]
    fn test_probabilistic_decay_removes_some() {
        let mut memory = memory_with(10, 0.5);
        let mut rng = SmallRng::seed_from_u64(42);
        let observations: Vec<_> = (0..20).map(|x| obs(EntityKind::Tile, x, 0)).collect();
        memory.update(Position::new(0, 0), &observations, 1);

        let removed = memory.decay(2, &mut rng);
        assert!(removed > 0 && removed < 20);
        assert_eq!(memory.len(), 20 - removed);
    }

    #[test]
    fn test_nearest_of_kind_prefers_fresh_and_near() {
        let mut memory = memory_with(100, 0.0);
        let origin = Position::new(10, 10);
        memory.apply_external(Percept::new(EntityKind::Tile, Position::new(12, 10), 50)).unwrap();
        memory.apply_external(Percept::new(EntityKind::Tile, Position::new(15, 10), 50)).unwrap();
        memory.apply_external(Percept::new(EntityKind::Hole, Position::new(11, 10), 50)).unwrap();

        let found = memory.nearest_of_kind(origin, EntityKind::Tile, 10, 55).unwrap();
        assert_eq!(found.position, Position::new(12, 10));
    }

    #[test]
    fn test_nearest_of_kind_skips_stale_for_fresh() {
        let mut memory = memory_with(100, 0.0);
        let origin = Position::new(10, 10);
        memory.apply_external(Percept::new(EntityKind::Tile, Position::new(11, 10), 5)).unwrap();
        memory.apply_external(Percept::new(EntityKind::Tile, Position::new(16, 10), 48)).unwrap();

        let found = memory.nearest_of_kind(origin, EntityKind::Tile, 5, 50).unwrap();
        assert_eq!(found.position, Position::new(16, 10));
    }

    #[test]
    fn test_nearest_of_kind_falls_back_to_most_recent() {
        let mut memory = memory_with(100, 0.0);
        let origin = Position::new(10, 10);
        memory.apply_external(Percept::new(EntityKind::Tile, Position::new(11, 10), 5)).unwrap();
        memory.apply_external(Percept::new(EntityKind::Tile, Position::new(14, 10), 20)).unwrap();
        memory.apply_external(Percept::new(EntityKind::Tile, Position::new(10, 16), 12)).unwrap();

        let found = memory.nearest_of_kind(origin, EntityKind::Tile, 1, 60).unwrap();
        assert_eq!(found.position, Position::new(14, 10));
        assert!(memory.nearest_of_kind(origin, EntityKind::FuelStation, 1, 60).is_none());
    }

    #[test]
    fn test_is_blocked_is_optimistic() {
        let mut memory = memory_with(10, 0.0);
        memory.apply_external(Percept::new(EntityKind::Obstacle, Position::new(4, 4), 1)).unwrap();
        memory.apply_external(Percept::new(EntityKind::Tile, Position::new(5, 4), 1)).unwrap();

        assert!(memory.is_blocked(Position::new(4, 4)));
        assert!(!memory.is_blocked(Position::new(5, 4)));
        assert!(!memory.is_blocked(Position::new(6, 4)));
        assert!(!memory.is_blocked(Position::new(-1, 4)));
    }

    #[test]
    fn test_fuel_station_slot_outlives_cell() {
        let mut memory = memory_with(2, 0.0);
        let mut rng = SmallRng::seed_from_u64(1);
        let station = Position::new(10, 10);
        memory.apply_external(Percept::new(EntityKind::FuelStation, station, 1)).unwrap();

        memory.decay(10, &mut rng);

        assert!(memory.get(station).is_none());
        assert_eq!(memory.fuel_station(), Some(station));
    }

    #[test]
    fn test_evict_only_matching_kind() {
        let mut memory = memory_with(10, 0.0);
        let spot = Position::new(3, 3);
        memory.apply_external(Percept::new(EntityKind::Hole, spot, 1)).unwrap();

        assert!(memory.evict(spot, EntityKind::Tile).is_none());
        assert_eq!(memory.len(), 1);
        assert!(memory.evict(spot, EntityKind::Hole).is_some());
        assert!(memory.is_empty());
    }
}

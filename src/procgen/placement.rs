//! Placement rule engine.
//!
//! Every generated object goes through the same gate: it may not touch a
//! road, overlap another object's footprint, or sit closer than its class's
//! minimum spacing to a sibling. Accepted footprints are indexed in a spatial
//! hash so each check only visits nearby objects.

use bevy::prelude::*;
use std::collections::BTreeMap;

use super::chunk::{Chunk, RoadSegment};
use super::geometry::Footprint;
use crate::world::grid::SpatialGrid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectClass {
    Building,
    Sign,
    Vehicle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Constraint {
    /// Footprint keeps at least `clearance` from every road edge.
    OffRoad { clearance: f32 },
    /// Footprint, grown by `clearance`, overlaps no placed footprint.
    NoOverlap { clearance: f32 },
    /// Centre is at least `distance` from every same-class centre.
    MinSpacing { distance: f32 },
    /// Every corner lies inside the chunk.
    WithinChunk,
    /// The centre lies inside the chunk (half-open).
    CenterInChunk,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rejection {
    OnRoad,
    NearRoad,
    Overlap,
    TooClose,
    OutOfChunk,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(Rejection),
}

impl Verdict {
    pub fn is_accept(self) -> bool {
        self == Verdict::Accept
    }
}

/// Ordered set of constraints for one object class.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSet {
    pub class: ObjectClass,
    pub constraints: Vec<Constraint>,
}

impl RuleSet {
    pub fn new(class: ObjectClass) -> Self {
        Self {
            class,
            constraints: Vec::new(),
        }
    }

    pub fn off_road(mut self, clearance: f32) -> Self {
        self.constraints.push(Constraint::OffRoad { clearance });
        self
    }

    pub fn no_overlap(mut self, clearance: f32) -> Self {
        self.constraints.push(Constraint::NoOverlap { clearance });
        self
    }

    pub fn min_spacing(mut self, distance: f32) -> Self {
        self.constraints.push(Constraint::MinSpacing { distance });
        self
    }

    pub fn within_chunk(mut self) -> Self {
        self.constraints.push(Constraint::WithinChunk);
        self
    }

    pub fn center_in_chunk(mut self) -> Self {
        self.constraints.push(Constraint::CenterInChunk);
        self
    }
}

#[derive(Clone, Copy, Debug)]
struct Placed {
    class: ObjectClass,
    footprint: Footprint,
}

/// Occupancy of one chunk plus the checks run against it.
#[derive(Clone, Debug)]
pub struct PlacementRuleEngine {
    grid: SpatialGrid<usize>,
    placed: Vec<Placed>,
    max_radius: f32,
    rejections: BTreeMap<(ObjectClass, Rejection), usize>,
}

impl Default for PlacementRuleEngine {
    fn default() -> Self {
        Self::new(16.0)
    }
}

impl PlacementRuleEngine {
    pub fn new(cell_size: f32) -> Self {
        Self {
            grid: SpatialGrid::new(cell_size),
            placed: Vec::new(),
            max_radius: 0.0,
            rejections: BTreeMap::new(),
        }
    }

    /// Rebuild occupancy from what a chunk already holds.
    pub fn from_chunk(chunk: &Chunk) -> Self {
        let mut engine = Self::default();
        for b in &chunk.buildings {
            engine.commit(ObjectClass::Building, b.footprint());
        }
        for s in &chunk.signs {
            engine.commit(ObjectClass::Sign, s.footprint());
        }
        for v in &chunk.vehicles {
            engine.commit(ObjectClass::Vehicle, v.footprint());
        }
        engine
    }

    pub fn count_of(&self, class: ObjectClass) -> usize {
        self.placed.iter().filter(|p| p.class == class).count()
    }

    pub fn rejections(&self) -> &BTreeMap<(ObjectClass, Rejection), usize> {
        &self.rejections
    }

    pub fn rejection_total(&self, class: ObjectClass) -> usize {
        self.rejections
            .iter()
            .filter(|((c, _), _)| *c == class)
            .map(|(_, n)| *n)
            .sum()
    }

    /// Run every constraint in order; the first failure wins.
    pub fn evaluate(
        &self,
        rules: &RuleSet,
        candidate: &Footprint,
        roads: &[RoadSegment],
        bounds: Rect,
    ) -> Verdict {
        for constraint in &rules.constraints {
            if let Some(rejection) = self.check(rules.class, constraint, candidate, roads, bounds) {
                return Verdict::Reject(rejection);
            }
        }
        Verdict::Accept
    }

    /// Evaluate, and on acceptance record the footprint.
    pub fn try_place(
        &mut self,
        rules: &RuleSet,
        candidate: &Footprint,
        roads: &[RoadSegment],
        bounds: Rect,
    ) -> Verdict {
        let verdict = self.evaluate(rules, candidate, roads, bounds);
        match verdict {
            Verdict::Accept => self.commit(rules.class, *candidate),
            Verdict::Reject(reason) => self.record_rejection(rules.class, reason),
        }
        verdict
    }

    /// Count a rejection decided outside the engine (cheap pre-filters).
    pub fn record_rejection(&mut self, class: ObjectClass, reason: Rejection) {
        *self.rejections.entry((class, reason)).or_default() += 1;
    }

    pub fn commit(&mut self, class: ObjectClass, footprint: Footprint) {
        let idx = self.placed.len();
        self.placed.push(Placed { class, footprint });
        self.grid.insert(idx, footprint.center);
        self.max_radius = self.max_radius.max(footprint.bounding_radius());
    }

    fn check(
        &self,
        class: ObjectClass,
        constraint: &Constraint,
        candidate: &Footprint,
        roads: &[RoadSegment],
        bounds: Rect,
    ) -> Option<Rejection> {
        match *constraint {
            Constraint::OffRoad { clearance } => {
                for seg in roads {
                    let d = candidate.distance_to_segment(seg.start, seg.end);
                    let half = seg.width * 0.5;
                    if d <= half {
                        return Some(Rejection::OnRoad);
                    }
                    if d - half < clearance {
                        return Some(Rejection::NearRoad);
                    }
                }
                None
            }
            Constraint::NoOverlap { clearance } => {
                let reach = candidate.bounding_radius() + self.max_radius + clearance;
                self.grid
                    .query_radius(candidate.center, reach)
                    .into_iter()
                    .any(|(_, idx)| self.placed[idx].footprint.overlaps(candidate, clearance))
                    .then_some(Rejection::Overlap)
            }
            Constraint::MinSpacing { distance } => self
                .grid
                .query_radius(candidate.center, distance)
                .into_iter()
                .any(|(pos, idx)| {
                    self.placed[idx].class == class && pos.distance(candidate.center) < distance
                })
                .then_some(Rejection::TooClose),
            Constraint::WithinChunk => {
                let inside = candidate.corners().iter().all(|c| {
                    c.x >= bounds.min.x - 1e-4
                        && c.y >= bounds.min.y - 1e-4
                        && c.x <= bounds.max.x + 1e-4
                        && c.y <= bounds.max.y + 1e-4
                });
                (!inside).then_some(Rejection::OutOfChunk)
            }
            Constraint::CenterInChunk => {
                let c = candidate.center;
                let inside = c.x >= bounds.min.x
                    && c.y >= bounds.min.y
                    && c.x < bounds.max.x
                    && c.y < bounds.max.y;
                (!inside).then_some(Rejection::OutOfChunk)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Rect {
        Rect::new(0.0, 0.0, 100.0, 100.0)
    }

    fn road() -> Vec<RoadSegment> {
        vec![RoadSegment {
            start: Vec2::new(0.0, 50.0),
            end: Vec2::new(100.0, 50.0),
            width: 10.0,
        }]
    }

    #[test]
    fn rejects_footprints_touching_roads() {
        let engine = PlacementRuleEngine::default();
        let rules = RuleSet::new(ObjectClass::Building).off_road(2.0);

        let on = Footprint::new(Vec2::new(30.0, 50.0), Vec2::splat(4.0), 0.0);
        assert_eq!(
            engine.evaluate(&rules, &on, &road(), bounds()),
            Verdict::Reject(Rejection::OnRoad)
        );

        // edge at z = 55, footprint reaches z = 56.5 from centre 58.5
        let near = Footprint::new(Vec2::new(30.0, 58.5), Vec2::splat(4.0), 0.0);
        assert_eq!(
            engine.evaluate(&rules, &near, &road(), bounds()),
            Verdict::Reject(Rejection::NearRoad)
        );

        let clear = Footprint::new(Vec2::new(30.0, 70.0), Vec2::splat(4.0), 0.0);
        assert!(engine.evaluate(&rules, &clear, &road(), bounds()).is_accept());
    }

    #[test]
    fn spacing_only_applies_within_class() {
        let mut engine = PlacementRuleEngine::default();
        let buildings = RuleSet::new(ObjectClass::Building).min_spacing(10.0);
        let signs = RuleSet::new(ObjectClass::Sign).min_spacing(10.0);

        let first = Footprint::point(Vec2::new(20.0, 20.0));
        assert!(engine.try_place(&buildings, &first, &[], bounds()).is_accept());

        let second = Footprint::point(Vec2::new(25.0, 20.0));
        assert_eq!(
            engine.try_place(&buildings, &second, &[], bounds()),
            Verdict::Reject(Rejection::TooClose)
        );
        assert!(engine.try_place(&signs, &second, &[], bounds()).is_accept());
        assert_eq!(engine.rejection_total(ObjectClass::Building), 1);
        assert_eq!(engine.count_of(ObjectClass::Building), 1);
    }

    #[test]
    fn overlap_checks_every_class() {
        let mut engine = PlacementRuleEngine::default();
        engine.commit(
            ObjectClass::Building,
            Footprint::new(Vec2::new(50.0, 20.0), Vec2::splat(10.0), 0.0),
        );
        let rules = RuleSet::new(ObjectClass::Vehicle).no_overlap(0.5);
        let car = Footprint::new(Vec2::new(56.0, 20.0), Vec2::new(1.8, 4.5), 0.0);
        assert_eq!(
            engine.evaluate(&rules, &car, &[], bounds()),
            Verdict::Reject(Rejection::Overlap)
        );
        let car = Footprint::new(Vec2::new(58.0, 20.0), Vec2::new(1.8, 4.5), 0.0);
        assert!(engine.evaluate(&rules, &car, &[], bounds()).is_accept());
    }

    #[test]
    fn chunk_bounds() {
        let engine = PlacementRuleEngine::default();
        let rules = RuleSet::new(ObjectClass::Building).within_chunk();
        let spill = Footprint::new(Vec2::new(2.0, 50.0), Vec2::splat(6.0), 0.0);
        assert_eq!(
            engine.evaluate(&rules, &spill, &[], bounds()),
            Verdict::Reject(Rejection::OutOfChunk)
        );
        let centered = RuleSet::new(ObjectClass::Sign).center_in_chunk();
        assert!(engine.evaluate(&centered, &spill, &[], bounds()).is_accept());
    }
}

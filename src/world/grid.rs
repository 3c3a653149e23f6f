//! Spatial partitioning grid for efficient neighbourhood queries.

use bevy::prelude::*;
use std::collections::HashMap;

/// Spatial hash grid mapping cells to the items positioned inside them.
#[derive(Clone, Debug)]
pub struct SpatialGrid<T> {
    pub cell_size: f32,
    pub cells: HashMap<(i32, i32), Vec<(Vec2, T)>>,
    len: usize,
}

impl<T: Copy> SpatialGrid<T> {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(0.01),
            cells: HashMap::new(),
            len: 0,
        }
    }

    /// Convert world position to cell coordinates.
    pub fn to_cell(&self, pos: Vec2) -> (i32, i32) {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
        )
    }

    /// Insert an item at a position.
    pub fn insert(&mut self, item: T, pos: Vec2) {
        let cell = self.to_cell(pos);
        self.cells.entry(cell).or_default().push((pos, item));
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Items whose position lies within `radius` of `center`.
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<(Vec2, T)> {
        let min_cell = self.to_cell(center - Vec2::splat(radius));
        let max_cell = self.to_cell(center + Vec2::splat(radius));
        let radius_sq = radius * radius;

        let mut result = Vec::new();

        for cx in min_cell.0..=max_cell.0 {
            for cy in min_cell.1..=max_cell.1 {
                if let Some(entries) = self.cells.get(&(cx, cy)) {
                    result.extend(
                        entries
                            .iter()
                            .filter(|(pos, _)| pos.distance_squared(center) <= radius_sq)
                            .copied(),
                    );
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_query_crosses_cells() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(1u32, Vec2::new(9.0, 9.0));
        grid.insert(2u32, Vec2::new(11.0, 11.0));
        grid.insert(3u32, Vec2::new(-30.0, 4.0));

        let mut found: Vec<u32> = grid
            .query_radius(Vec2::new(10.0, 10.0), 2.0)
            .into_iter()
            .map(|(_, id)| id)
            .collect();
        found.sort();
        assert_eq!(found, vec![1, 2]);
        assert_eq!(grid.len(), 3);
    }
}

//! Hashed uniform grid for fixed-radius range queries.
//!
//! The grid cell size is twice the query radius, so every point within the
//! radius of a query lies in the query's cell or one of the seven cells
//! diagonal to it towards the query's nearest cell corner.

use vcm_math::{Aabb, Vec3};

#[derive(Debug, Clone, Default)]
pub struct HashGrid {
    bounds: Aabb,
    radius: f32,
    radius_squared: f32,
    inv_cell_size: f32,
    /// Point indices sorted by cell
    indices: Vec<u32>,
    /// Exclusive end of each cell's range in `indices`
    cell_ends: Vec<u32>,
    positions: Vec<Vec3>,
}

impl HashGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the grid over `positions` for queries of `radius`.
    pub fn build(&mut self, positions: &[Vec3], radius: f32) {
        self.radius = radius;
        self.radius_squared = radius * radius;
        self.inv_cell_size = 1.0 / (2.0 * radius);
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        self.bounds = Aabb::from_iter_points(positions.iter().copied()).pad(2.0 * radius);

        let cell_count = positions.len().max(1);
        self.cell_ends.clear();
        self.cell_ends.resize(cell_count, 0);
        self.indices.clear();
        self.indices.resize(positions.len(), 0);

        for &p in positions {
            let cell = self.cell_index_of(p);
            self.cell_ends[cell] += 1;
        }

        // Exclusive prefix sum; each cell's range starts at its end value
        // and grows as points are written.
        let mut sum = 0;
        for end in self.cell_ends.iter_mut() {
            let count = *end;
            *end = sum;
            sum += count;
        }

        for (i, &p) in positions.iter().enumerate() {
            let cell = self.cell_index_of(p);
            let slot = self.cell_ends[cell] as usize;
            self.indices[slot] = i as u32;
            self.cell_ends[cell] += 1;
        }

        log::debug!(
            "Hash grid built: {} points, {} cells, radius {:.5}",
            positions.len(),
            cell_count,
            radius
        );
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Call `f(index)` for every point within the radius of `query`. Each
    /// point is reported once.
    pub fn process(&self, query: Vec3, mut f: impl FnMut(u32)) {
        if self.positions.is_empty() {
            return;
        }
        let min = self.bounds.min();
        let max = self.bounds.max();
        if query.cmplt(min).any() || query.cmpgt(max).any() {
            return;
        }

        let cell_pos = (query - min) * self.inv_cell_size;
        let coords = cell_pos.floor();
        let frac = cell_pos - coords;
        let base = [coords.x as i32, coords.y as i32, coords.z as i32];
        let step = [
            if frac.x > 0.5 { 1 } else { -1 },
            if frac.y > 0.5 { 1 } else { -1 },
            if frac.z > 0.5 { 1 } else { -1 },
        ];

        let mut cells = [0usize; 8];
        for (j, cell) in cells.iter_mut().enumerate() {
            let x = base[0] + if j & 1 != 0 { step[0] } else { 0 };
            let y = base[1] + if j & 2 != 0 { step[1] } else { 0 };
            let z = base[2] + if j & 4 != 0 { step[2] } else { 0 };
            *cell = self.cell_index(x, y, z);
        }
        cells.sort_unstable();

        for (j, &cell) in cells.iter().enumerate() {
            // Distinct coordinates can hash to the same cell
            if j > 0 && cells[j - 1] == cell {
                continue;
            }
            let (start, end) = self.cell_range(cell);
            for &index in &self.indices[start..end] {
                let p = self.positions[index as usize];
                if p.distance_squared(query) <= self.radius_squared {
                    f(index);
                }
            }
        }
    }

    fn cell_range(&self, cell: usize) -> (usize, usize) {
        let start = if cell == 0 {
            0
        } else {
            self.cell_ends[cell - 1] as usize
        };
        (start, self.cell_ends[cell] as usize)
    }

    fn cell_index_of(&self, p: Vec3) -> usize {
        let c = ((p - self.bounds.min()) * self.inv_cell_size).floor();
        self.cell_index(c.x as i32, c.y as i32, c.z as i32)
    }

    fn cell_index(&self, x: i32, y: i32, z: i32) -> usize {
        let h = (x as u32).wrapping_mul(73_856_093)
            ^ (y as u32).wrapping_mul(19_349_663)
            ^ (z as u32).wrapping_mul(83_492_791);
        h as usize % self.cell_ends.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_returns_exactly_points_within_radius() {
        let mut rng = StdRng::seed_from_u64(42);
        let points: Vec<Vec3> = (0..2000)
            .map(|_| Vec3::new(rng.gen(), rng.gen(), rng.gen()))
            .collect();
        let radius = 0.05;
        let mut grid = HashGrid::new();
        grid.build(&points, radius);

        for _ in 0..200 {
            let q = Vec3::new(rng.gen(), rng.gen(), rng.gen()) * 1.1 - Vec3::splat(0.05);
            let mut found = Vec::new();
            grid.process(q, |i| found.push(i));
            found.sort_unstable();
            let before = found.len();
            found.dedup();
            assert_eq!(before, found.len(), "a point was reported twice");

            let expected: Vec<u32> = (0..points.len() as u32)
                .filter(|&i| points[i as usize].distance_squared(q) <= radius * radius)
                .collect();
            assert_eq!(found, expected);
        }
    }

    #[test]
    fn test_query_far_outside_is_empty() {
        let mut grid = HashGrid::new();
        grid.build(&[Vec3::ZERO, Vec3::ONE], 0.1);
        let mut count = 0;
        grid.process(Vec3::splat(10.0), |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_empty_grid() {
        let mut grid = HashGrid::new();
        grid.build(&[], 0.1);
        assert!(grid.is_empty());
        let mut count = 0;
        grid.process(Vec3::ZERO, |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_unbuilt_grid_has_empty_bounds() {
        let grid = HashGrid::default();
        assert!(grid.bounds.is_empty());
        assert_eq!(grid.radius(), 0.0);
        let mut count = 0;
        grid.process(Vec3::ZERO, |_| count += 1);
        assert_eq!(count, 0);
    }
}

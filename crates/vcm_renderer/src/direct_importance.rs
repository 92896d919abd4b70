//! Assignment of sensor splats to the tiles that own their pixels.
//!
//! Connecting a light vertex to the sensor writes to whatever pixel the
//! vertex projects to. Projecting every vertex once, before tiles are
//! processed, lets each tile splat only into its own pixels.

use crate::path::PathVertex;
use crate::rng::RngHandle;
use crate::tiles::TileGrid;
use vcm_core::Sensor;
use vcm_math::{UVec2, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectImportanceSample {
    /// Index of the light vertex in the light path buffer
    pub light_vertex: usize,
    pub lens_sample: Vec2,
    pub pixel: UVec2,
}

#[derive(Debug, Clone, Default)]
pub struct DirectImportancePartition {
    tiles: Vec<Vec<DirectImportanceSample>>,
}

impl DirectImportancePartition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project every valid surface vertex of `vertices` onto the sensor.
    /// Runs serially so the lens samples only depend on `rng`.
    pub fn build(
        &mut self,
        vertices: &[PathVertex],
        sensor: &dyn Sensor,
        grid: &TileGrid,
        rng: &mut RngHandle,
    ) {
        self.tiles.resize_with(grid.len(), Vec::new);
        self.tiles.truncate(grid.len());
        for list in &mut self.tiles {
            list.clear();
        }

        for (index, vertex) in vertices.iter().enumerate() {
            let Some(receiver) = vertex.surface_point() else {
                continue;
            };
            let lens_sample = rng.get_float2();
            let Some(di) = sensor.sample_direct_importance(lens_sample, &receiver) else {
                continue;
            };
            if di.importance <= 0.0 {
                continue;
            }
            let tile = grid.tile_of_pixel(di.pixel);
            if let Some(list) = self.tiles.get_mut(tile) {
                list.push(DirectImportanceSample {
                    light_vertex: index,
                    lens_sample,
                    pixel: di.pixel,
                });
            }
        }

        log::debug!(
            "Direct importance: {} sensor splats over {} tiles",
            self.sample_count(),
            self.tiles.len()
        );
    }

    /// Splats landing in tile `tile_index`.
    pub fn tile(&self, tile_index: usize) -> &[DirectImportanceSample] {
        self.tiles.get(tile_index).map_or(&[], Vec::as_slice)
    }

    pub fn sample_count(&self) -> usize {
        self.tiles.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light_sampler::PowerLightSampler;
    use crate::mis::{MisContext, MisHeuristic};
    use crate::path::sample_light_path;
    use vcm_core::presets::cornell_box;

    #[test]
    fn test_samples_land_in_owning_tile() {
        let (scene, camera) = cornell_box(40, 30).expect("scene");
        let sampler = PowerLightSampler::new(&scene);
        let mis = MisContext::connection(MisHeuristic::Balance, 1);
        let mut rng = RngHandle::new(42);

        let depth = 3;
        let mut vertices = vec![PathVertex::invalid(); 200 * depth];
        for path in vertices.chunks_mut(depth) {
            sample_light_path(path, &scene, &sampler, &mis, &mut rng);
        }

        let grid = TileGrid::new(40, 30, 16);
        let mut partition = DirectImportancePartition::new();
        partition.build(&vertices, &camera, &grid, &mut rng);
        assert!(partition.sample_count() > 0);

        for tile in grid.tiles() {
            for sample in partition.tile(tile.index) {
                assert!(tile.contains(sample.pixel));
                assert!(vertices[sample.light_vertex].is_valid());
            }
        }
        assert!(partition.tile(grid.len()).is_empty());
    }

    #[test]
    fn test_rebuild_is_reproducible() {
        let (scene, camera) = cornell_box(16, 16).expect("scene");
        let sampler = PowerLightSampler::new(&scene);
        let mis = MisContext::connection(MisHeuristic::Balance, 1);
        let grid = TileGrid::new(16, 16, 8);

        let run = || {
            let mut rng = RngHandle::new(42);
            let mut vertices = vec![PathVertex::invalid(); 64 * 2];
            for path in vertices.chunks_mut(2) {
                sample_light_path(path, &scene, &sampler, &mis, &mut rng);
            }
            let mut partition = DirectImportancePartition::new();
            partition.build(&vertices, &camera, &grid, &mut rng);
            (0..grid.len())
                .flat_map(|t| partition.tile(t).to_vec())
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}

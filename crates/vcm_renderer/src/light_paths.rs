//! Per-frame arena of light sub-paths.

use crate::light_sampler::PowerLightSampler;
use crate::mis::MisContext;
use crate::parallel::process_tasks_deterministic;
use crate::path::{sample_light_path, EmissionVertex, PathVertex};
use crate::rng::RngHandle;
use vcm_core::Scene;

/// Light paths of a frame, stored path after path.
///
/// Vertex `depth` (one based) of path `p` lives at
/// `p * max_light_depth + depth - 1`. Invalid vertices mark the end of a
/// path. The emission vertex each path was rooted at is kept alongside.
#[derive(Debug, Clone, Default)]
pub struct LightPathBuffer {
    vertices: Vec<PathVertex>,
    emission: Vec<EmissionVertex>,
    max_light_depth: usize,
}

impl LightPathBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize for `path_count` paths and invalidate every vertex.
    pub fn resize(&mut self, path_count: usize, max_light_depth: usize) {
        self.max_light_depth = max_light_depth;
        self.vertices.clear();
        self.vertices
            .resize(path_count * max_light_depth, PathVertex::invalid());
        self.emission.clear();
        self.emission.resize(path_count, EmissionVertex::default());
    }

    /// Sample every path. Paths are distributed over the worker slots by
    /// contiguous blocks.
    pub fn sample(
        &mut self,
        scene: &dyn Scene,
        light_sampler: &PowerLightSampler,
        mis: &MisContext,
        rngs: &mut [RngHandle],
    ) {
        let depth = self.max_light_depth;
        if depth == 0 {
            process_tasks_deterministic(self.emission.iter_mut(), rngs, |_, emission, rng| {
                *emission = sample_light_path(&mut [], scene, light_sampler, mis, rng);
            });
        } else {
            let tasks = self.vertices.chunks_mut(depth).zip(self.emission.iter_mut());
            process_tasks_deterministic(tasks, rngs, |_, (path, emission), rng| {
                *emission = sample_light_path(path, scene, light_sampler, mis, rng);
            });
        }
        log::debug!(
            "Sampled {} light paths, {} valid vertices",
            self.path_count(),
            self.valid_vertex_count()
        );
    }

    pub fn path_count(&self) -> usize {
        self.emission.len()
    }

    pub fn max_light_depth(&self) -> usize {
        self.max_light_depth
    }

    /// Vertices of path `index`, ordered by depth.
    pub fn path(&self, index: usize) -> &[PathVertex] {
        let start = index * self.max_light_depth;
        &self.vertices[start..start + self.max_light_depth]
    }

    /// Vertex at `depth` (one based) of path `index`.
    pub fn vertex(&self, index: usize, depth: usize) -> &PathVertex {
        &self.vertices[index * self.max_light_depth + depth - 1]
    }

    pub fn emission(&self, index: usize) -> &EmissionVertex {
        &self.emission[index]
    }

    /// Every vertex, in arena order.
    pub fn vertices(&self) -> &[PathVertex] {
        &self.vertices
    }

    pub fn valid_vertex_count(&self) -> usize {
        self.vertices.iter().filter(|v| v.is_valid()).count()
    }
}

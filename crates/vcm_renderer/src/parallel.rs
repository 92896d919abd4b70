//! Deterministic work distribution over a fixed set of worker slots.
//!
//! Work is assigned to slots by index only, never by which thread happens
//! to be free, and each slot consumes its own [`RngHandle`] in a fixed
//! order. The random numbers used by a task therefore only depend on the
//! task index, the worker count and the frame seed.

use crate::rng::RngHandle;
use crate::tiles::Tile;
use rayon::prelude::*;

/// Run `f(task_index, task, rng)` for every task.
///
/// Tasks are cut into contiguous blocks of `max(1, n / workers)`; block `b`
/// goes to slot `b % workers`. Each slot processes its blocks in order.
pub fn process_tasks_deterministic<I, F>(
    tasks: impl IntoIterator<Item = I>,
    rngs: &mut [RngHandle],
    f: F,
) where
    I: Send,
    F: Fn(usize, I, &mut RngHandle) + Sync,
{
    let worker_count = rngs.len();
    if worker_count == 0 {
        return;
    }
    let tasks: Vec<I> = tasks.into_iter().collect();
    let block_size = (tasks.len() / worker_count).max(1);

    let mut per_slot: Vec<Vec<(usize, I)>> = (0..worker_count).map(|_| Vec::new()).collect();
    for (index, task) in tasks.into_iter().enumerate() {
        per_slot[(index / block_size) % worker_count].push((index, task));
    }

    rngs.par_iter_mut()
        .zip(per_slot.into_par_iter())
        .for_each(|(rng, tasks)| {
            for (index, task) in tasks {
                f(index, task, rng);
            }
        });
}

/// Render every tile and return the per-tile results in tile order.
///
/// Tile `i` is processed by slot `i % workers`.
pub fn process_tiles<R, F>(tiles: &[Tile], rngs: &mut [RngHandle], f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&Tile, &mut RngHandle) -> R + Sync,
{
    let worker_count = rngs.len();
    if worker_count == 0 {
        return Vec::new();
    }

    let mut results: Vec<(usize, R)> = rngs
        .par_iter_mut()
        .enumerate()
        .flat_map_iter(|(slot, rng)| {
            tiles
                .iter()
                .skip(slot)
                .step_by(worker_count)
                .map(|tile| (tile.index, f(tile, rng)))
                .collect::<Vec<_>>()
        })
        .collect();

    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, r)| r).collect()
}

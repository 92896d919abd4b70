//! Stratified sample patterns and discrete helpers.

use vcm_math::Vec2;

/// Jittered sample `index` of `count` strata over [0, 1).
pub fn jittered_1d(index: usize, count: usize, jitter: f32) -> f32 {
    let delta = 1.0 / count.max(1) as f32;
    ((index as f32 + jitter) * delta).min(ONE_MINUS_EPSILON)
}

/// Jittered sample `index` of a `width` x `height` grid over [0, 1)^2, in
/// row-major order.
pub fn jittered_2d(index: usize, width: usize, height: usize, jitter: Vec2) -> Vec2 {
    let width = width.max(1);
    let x = index % width;
    let y = index / width;
    Vec2::new(
        jittered_1d(x, width, jitter.x),
        jittered_1d(y, height, jitter.y),
    )
}

/// Pick one of `count` items uniformly. Returns the index and its
/// probability, or `None` when there is nothing to pick.
pub fn uniform_discrete_sample(count: usize, u: f32) -> Option<(usize, f32)> {
    if count == 0 {
        return None;
    }
    let index = ((u * count as f32) as usize).min(count - 1);
    Some((index, 1.0 / count as f32))
}

const ONE_MINUS_EPSILON: f32 = 1.0 - f32::EPSILON;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jittered_1d_strata() {
        assert_eq!(jittered_1d(0, 4, 0.0), 0.0);
        assert_eq!(jittered_1d(2, 4, 0.5), 0.625);
        assert!(jittered_1d(3, 4, 1.0) < 1.0);
    }

    #[test]
    fn test_jittered_2d_row_major() {
        let s = jittered_2d(5, 4, 2, Vec2::ZERO);
        assert_eq!(s, Vec2::new(0.25, 0.5));
    }

    #[test]
    fn test_uniform_discrete_sample_bounds() {
        assert_eq!(uniform_discrete_sample(0, 0.5), None);
        assert_eq!(uniform_discrete_sample(4, 0.0), Some((0, 0.25)));
        assert_eq!(uniform_discrete_sample(4, 0.999_999), Some((3, 0.25)));
        assert_eq!(uniform_discrete_sample(4, 1.0), Some((3, 0.25)));
    }
}

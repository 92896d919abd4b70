//! Discrete distributions stored as normalized CDF buffers.
//!
//! A distribution over `n` items lives in a buffer of `n + 1` floats:
//! `cdf[0] = 0`, `cdf[n] = 1`, or all zeros when every weight is zero.
//! Buffers are plain slices so that many tables can share one flat
//! allocation (the importance cache keeps one per record and depth).

/// A sampled value and the probability of having drawn it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<T> {
    pub value: T,
    pub pdf: f32,
}

impl<T> Sample<T> {
    pub fn new(value: T, pdf: f32) -> Self {
        Self { value, pdf }
    }
}

/// Buffer length for a distribution over `item_count` items.
#[inline]
pub fn distribution_buffer_size(item_count: usize) -> usize {
    item_count + 1
}

/// Fill `cdf` (of length `n + 1`) from `weight(i)` for `i < n` and return
/// the weight sum. Negative or NaN weights count as zero.
///
/// `weight(i)` may read `cdf[i]` and later entries: they are overwritten
/// only after being read, so the buffer can carry the previous weights.
pub fn build_distribution(mut weight: impl FnMut(usize) -> f32, cdf: &mut [f32]) -> f32 {
    let n = cdf.len().saturating_sub(1);
    let mut sum = 0.0;
    for i in 0..n {
        let w = weight(i);
        cdf[i] = sum;
        if w > 0.0 {
            sum += w;
        }
    }
    if let Some(last) = cdf.last_mut() {
        *last = sum;
    }

    if sum > 0.0 {
        for c in cdf.iter_mut() {
            *c /= sum;
        }
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }
    } else {
        cdf.fill(0.0);
    }
    sum
}

/// Probability of item `index`.
#[inline]
pub fn distribution_pdf(cdf: &[f32], index: usize) -> f32 {
    cdf[index + 1] - cdf[index]
}

/// True if the table has at least one item with non-zero probability.
#[inline]
pub fn is_non_empty(cdf: &[f32]) -> bool {
    cdf.last().is_some_and(|&c| c > 0.0)
}

/// First index in `0..n` whose value is strictly above `u`.
fn upper_bound(n: usize, value: impl Fn(usize) -> f32, u: f32) -> usize {
    let (mut lo, mut hi) = (0, n);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if value(mid) <= u {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

pub fn sample_distribution(cdf: &[f32], u: f32) -> Option<Sample<usize>> {
    let n = cdf.len().saturating_sub(1);
    if n == 0 || !is_non_empty(cdf) {
        return None;
    }
    let index = upper_bound(n, |i| cdf[i], u).saturating_sub(1).min(n - 1);
    let pdf = distribution_pdf(cdf, index);
    (pdf > 0.0).then(|| Sample::new(index, pdf))
}

/// Number of non-empty tables among `count`.
fn non_empty_count<'a>(count: usize, table: &impl Fn(usize) -> &'a [f32]) -> usize {
    (0..count).filter(|&k| is_non_empty(table(k))).count()
}

/// Probability of `index` under the average of `count` tables. Empty
/// tables do not take part in the average.
pub fn combined_pdf<'a>(count: usize, table: impl Fn(usize) -> &'a [f32], index: usize) -> f32 {
    let active = non_empty_count(count, &table);
    if active == 0 {
        return 0.0;
    }
    let delta: f32 = (0..count)
        .map(|k| {
            let cdf = table(k);
            cdf[index + 1] - cdf[index]
        })
        .sum();
    delta / active as f32
}

/// Sample the average of `count` tables, each of length `item_count + 1`.
pub fn sample_combined<'a>(
    count: usize,
    table: impl Fn(usize) -> &'a [f32],
    item_count: usize,
    u: f32,
) -> Option<Sample<usize>> {
    if item_count == 0 {
        return None;
    }
    let active = non_empty_count(count, &table);
    if active == 0 {
        return None;
    }
    let scale = 1.0 / active as f32;
    let averaged = |i: usize| (0..count).map(|k| table(k)[i]).sum::<f32>() * scale;

    let index = upper_bound(item_count, averaged, u)
        .saturating_sub(1)
        .min(item_count - 1);
    let pdf = combined_pdf(count, &table, index);
    (pdf > 0.0).then(|| Sample::new(index, pdf))
}

/// Owned distribution, for small tables built once.
#[derive(Debug, Clone, Default)]
pub struct Distribution1D {
    cdf: Vec<f32>,
    sum: f32,
}

impl Distribution1D {
    pub fn new(weights: &[f32]) -> Self {
        let mut cdf = vec![0.0; distribution_buffer_size(weights.len())];
        let sum = build_distribution(|i| weights[i], &mut cdf);
        Self { cdf, sum }
    }

    pub fn len(&self) -> usize {
        self.cdf.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the weights the distribution was built from.
    pub fn sum(&self) -> f32 {
        self.sum
    }

    pub fn sample(&self, u: f32) -> Option<Sample<usize>> {
        sample_distribution(&self.cdf, u)
    }

    pub fn pdf(&self, index: usize) -> f32 {
        if index >= self.len() {
            return 0.0;
        }
        distribution_pdf(&self.cdf, index)
    }
}

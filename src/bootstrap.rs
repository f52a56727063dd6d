use log::{debug, warn};
use ndarray::{Array2, ArrayView1};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

//-----------------------------------------------------------------------------
// Diversified bootstrap sampling
//-----------------------------------------------------------------------------

/// One bootstrap draw, expressed as indices into the original data
#[derive(Clone, Debug, PartialEq)]
pub struct Bootstrap {
    /// Sample the resampling distribution was centered on
    pub root: usize,
    /// Drawn row indices, same cardinality as the original data, duplicates allowed
    pub indices: Vec<usize>,
    /// True when the distance-based weights collapsed and a uniform draw was used
    pub uniform_fallback: bool,
}

/// Farthest-point bootstrap sampler: the first root is random, each next root maximizes
/// the mean distance to all previous roots.
pub struct DiversifiedSampler<'a> {
    distances: &'a Array2<f64>,
    roots: Vec<usize>,
}

impl<'a> DiversifiedSampler<'a> {
    pub fn new(distances: &'a Array2<f64>) -> Self {
        DiversifiedSampler { distances, roots: Vec::new() }
    }

    /// Start from already chosen roots
    #[cfg(test)]
    pub fn with_roots(distances: &'a Array2<f64>, roots: Vec<usize>) -> Self {
        DiversifiedSampler { distances, roots }
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Choose and record the root of the next repeat
    pub fn next_root(&mut self, rng: &mut ChaCha8Rng) -> usize {
        let root = if self.roots.is_empty() {
            rng.gen_range(0..self.distances.nrows())
        } else {
            farthest_from(self.distances, &self.roots)
        };
        self.roots.push(root);
        root
    }

    /// Choose the next root and draw a bootstrap around it
    pub fn draw(&mut self, rng: &mut ChaCha8Rng) -> Bootstrap {
        let root = self.next_root(rng);
        let n = self.distances.nrows();

        let (indices, uniform_fallback) = match sampling_weights(self.distances.row(root)) {
            Some(weights) => match WeightedIndex::new(&weights) {
                Ok(dist) => ((0..n).map(|_| dist.sample(rng)).collect(), false),
                Err(e) => {
                    warn!("Bootstrap weights around root {} rejected ({}): falling back to a uniform draw", root, e);
                    (uniform_draw(n, rng), true)
                }
            },
            None => {
                warn!("Bootstrap weights around root {} collapsed: falling back to a uniform draw", root);
                (uniform_draw(n, rng), true)
            }
        };

        debug!("Bootstrap around root {}: {} rows drawn", root, indices.len());
        Bootstrap { root, indices, uniform_fallback }
    }
}

/// Sample maximizing the mean distance to the given roots (first index on ties)
pub fn farthest_from(distances: &Array2<f64>, roots: &[usize]) -> usize {
    let n = distances.ncols();
    let mut best = 0;
    let mut best_mean = f64::NEG_INFINITY;
    for candidate in 0..n {
        let mean = roots.iter().map(|&r| distances[[r, candidate]]).sum::<f64>() / roots.len() as f64;
        if mean > best_mean {
            best_mean = mean;
            best = candidate;
        }
    }
    best
}

/// `w_i = max(row) - row_i`, normalized to 1: points close to the root are favored.
/// None when the weights cannot form a distribution (all equal, NaN or infinite).
pub fn sampling_weights(distance_row: ArrayView1<f64>) -> Option<Vec<f64>> {
    let max = distance_row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return None;
    }
    let raw: Vec<f64> = distance_row.iter().map(|d| max - d).collect();
    let total: f64 = raw.iter().sum();
    if !(total.is_finite() && total > 0.0) || raw.iter().any(|w| !w.is_finite()) {
        return None;
    }
    Some(raw.into_iter().map(|w| w / total).collect())
}

fn uniform_draw(n: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}

// Fixed-order sampler — reproducible, seeded, size-bounded index order
//
// Repeated runs of the same check must produce identical reports, so every
// sub-sampling decision flows through this sampler: same (length, seed,
// sample_size) → same index sequence, across iterations and across
// processes.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Produces dataset indices in a shuffled constant order.
///
/// With a `sample_size`, exactly `min(sample_size, length)` unique indices
/// are drawn once (without replacement) from a generator seeded with `seed`
/// and stored permanently. Without one, a full permutation is regenerated
/// from the seed on each iteration — equivalent, deterministic, unbounded.
#[derive(Debug, Clone)]
pub struct FixedOrderSampler {
    length: usize,
    seed: u64,
    indices: Option<Vec<usize>>,
}

impl FixedOrderSampler {
    pub fn new(length: usize, seed: u64, sample_size: Option<usize>) -> Self {
        let indices = sample_size.map(|size| {
            let size = size.min(length);
            let mut rng = StdRng::seed_from_u64(seed);
            rand::seq::index::sample(&mut rng, length, size).into_vec()
        });
        Self {
            length,
            seed,
            indices,
        }
    }

    /// Number of indices each iteration will produce.
    pub fn len(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The index order, materialized.
    ///
    /// Bounded samplers return the stored draw; unbounded samplers generate
    /// the full seeded permutation (the same one every call).
    pub fn order(&self) -> Vec<usize> {
        match &self.indices {
            Some(indices) => indices.clone(),
            None => {
                let mut order: Vec<usize> = (0..self.length).collect();
                let mut rng = StdRng::seed_from_u64(self.seed);
                order.shuffle(&mut rng);
                order
            }
        }
    }

    /// Iterate the index order.
    pub fn iter(&self) -> impl Iterator<Item = usize> {
        self.order().into_iter()
    }
}

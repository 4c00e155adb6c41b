// Loader — batching and iteration over a record source
//
// The loader pulls records (in parallel when workers are enabled) and
// groups them into `Batch`es. Iteration order is either the source's
// natural order or a `FixedOrderSampler`'s seeded order; checks always see
// the same batches for the same configuration.

use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;

use kestrel_core::{Error, Result};

use crate::sampler::FixedOrderSampler;
use crate::source::{Batch, Record, RecordSource};

/// Configuration for the Loader.
///
/// Everything here is reused unchanged when a sampled sub-view is created:
/// a sub-view differs from its parent only in iteration order.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Number of records per batch.
    pub batch_size: usize,
    /// Number of parallel workers for record fetching (0 = sequential).
    pub num_workers: usize,
    /// Whether batches should be placed in pinned memory by the consumer.
    pub pin_memory: bool,
    /// Optional timeout for blocking I/O in the underlying source.
    pub timeout: Option<Duration>,
    /// How many batches a prefetching consumer may buffer per worker.
    pub prefetch_factor: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            num_workers: 0,
            pin_memory: false,
            timeout: None,
            prefetch_factor: 2,
        }
    }
}

impl LoaderConfig {
    pub fn batch_size(mut self, bs: usize) -> Self {
        self.batch_size = bs;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn pin_memory(mut self, pin: bool) -> Self {
        self.pin_memory = pin;
        self
    }

    pub fn timeout(mut self, t: Duration) -> Self {
        self.timeout = Some(t);
        self
    }

    pub fn prefetch_factor(mut self, n: usize) -> Self {
        self.prefetch_factor = n;
        self
    }
}

/// A Loader wraps a RecordSource and produces `Batch`es.
pub struct Loader {
    source: Arc<dyn RecordSource>,
    config: LoaderConfig,
    order: Option<FixedOrderSampler>,
}

impl Loader {
    /// Create a loader iterating the source in its natural order.
    pub fn new(source: Arc<dyn RecordSource>, config: LoaderConfig) -> Self {
        Self {
            source,
            config,
            order: None,
        }
    }

    /// Create a loader that follows a fixed sampled order.
    pub fn with_order(
        source: Arc<dyn RecordSource>,
        config: LoaderConfig,
        order: FixedOrderSampler,
    ) -> Self {
        Self {
            source,
            config,
            order: Some(order),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<dyn RecordSource> {
        &self.source
    }

    /// The fixed iteration order, if this loader follows one.
    pub fn order(&self) -> Option<&FixedOrderSampler> {
        self.order.as_ref()
    }

    /// Number of records one full iteration will consume, if known.
    pub fn num_records(&self) -> Option<usize> {
        match &self.order {
            Some(order) => Some(order.len()),
            None => self.source.len(),
        }
    }

    /// Number of batches per full iteration, if known.
    pub fn num_batches(&self) -> Option<usize> {
        self.num_records()
            .map(|n| n.div_ceil(self.config.batch_size))
    }

    /// Build a sub-view loader over `min(sample_size, len)` records chosen
    /// deterministically by `seed`, reusing this loader's source and
    /// configuration unchanged.
    ///
    /// Fails with [`Error::UnsupportedSource`] for streaming sources: a
    /// seeded draw needs a known length.
    pub fn subsampled(&self, sample_size: usize, seed: u64) -> Result<Loader> {
        let length = self.source.len().ok_or_else(|| {
            Error::UnsupportedSource("cannot create a sample of a streaming source".into())
        })?;
        let order = FixedOrderSampler::new(length, seed, Some(sample_size));
        log::debug!(
            "sample loader: {} of {length} records, seed {seed}",
            order.len()
        );
        Ok(Loader::with_order(
            Arc::clone(&self.source),
            self.config.clone(),
            order,
        ))
    }

    /// Fetch records at the given indices, in parallel when workers are
    /// configured.
    fn fetch_records(&self, indices: &[usize]) -> Vec<Record> {
        if self.config.num_workers > 0 && indices.len() > 1 {
            indices.par_iter().map(|&i| self.source.get(i)).collect()
        } else {
            indices.iter().map(|&i| self.source.get(i)).collect()
        }
    }

    /// Iterate over batches one at a time.
    pub fn iter_batches(&self) -> BatchIter<'_> {
        let state = match (&self.order, self.source.len()) {
            (Some(order), _) => IterState::Indexed {
                indices: order.order(),
                pos: 0,
            },
            (None, Some(n)) => IterState::Indexed {
                indices: (0..n).collect(),
                pos: 0,
            },
            (None, None) => IterState::Streamed(self.source.stream()),
        };
        BatchIter {
            loader: self,
            state,
        }
    }
}

enum IterState<'a> {
    Indexed { indices: Vec<usize>, pos: usize },
    Streamed(Box<dyn Iterator<Item = Record> + 'a>),
}

/// Iterator yielding one `Batch` at a time.
pub struct BatchIter<'a> {
    loader: &'a Loader,
    state: IterState<'a>,
}

impl Iterator for BatchIter<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let bs = self.loader.config.batch_size;
        match &mut self.state {
            IterState::Indexed { indices, pos } => {
                if *pos >= indices.len() {
                    return None;
                }
                let end = (*pos + bs).min(indices.len());
                let chunk = &indices[*pos..end];
                *pos = end;
                Some(Batch::from_records(self.loader.fetch_records(chunk)))
            }
            IterState::Streamed(records) => {
                let chunk: Vec<Record> = records.take(bs).collect();
                if chunk.is_empty() {
                    None
                } else {
                    Some(Batch::from_records(chunk))
                }
            }
        }
    }
}

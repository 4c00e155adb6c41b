//! # kestrel-data
//!
//! Data sources, deterministic sampling, and the VisionData abstraction.
//!
//! This crate provides:
//! - [`RecordSource`] trait — uniform contract over batched data sources
//! - [`Loader`] — batching and (optionally parallel) iteration
//! - [`FixedOrderSampler`] — reproducible, seeded, size-bounded index order
//! - [`VisionData`] — lazy dataset statistics, seeded sub-views, and
//!   cross-dataset structural validation
//! - Image transforms for augmentation checks

pub mod loader;
pub mod sampler;
pub mod source;
pub mod transform;
pub mod vision;

pub use loader::{BatchIter, Loader, LoaderConfig};
pub use sampler::FixedOrderSampler;
pub use source::{Batch, Image, Record, RecordSource, StreamSource, TransformSlot, VecSource};
pub use transform::{GaussianNoise, HorizontalFlip, Normalize, Transform};
pub use vision::VisionData;

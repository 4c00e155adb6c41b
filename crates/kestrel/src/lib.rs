//! # Kestrel
//!
//! A model-validation toolkit for vision ML pipelines: statistical checks
//! that compare a trained model against baselines across train/test splits,
//! producing diagnostic tables and pass/fail conditions.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kestrel::prelude::*;
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `kestrel-core` | Error taxonomy, task types, labels, label formatters |
//! | `kestrel-data` | Record sources, transforms, sampler, loader, VisionData |
//! | `kestrel` | Check protocol, scorers, results, SimpleModelComparison |

pub mod checks;
pub mod context;
pub mod result;
pub mod scorer;

/// Re-export core types.
pub use kestrel_core::{
    BoundingBox, ClassificationFormat, DetectionFormat, Error, Label, LabelFormatter, RawLabel,
    Result, TaskType,
};

/// Re-export the data layer.
pub mod data {
    pub use kestrel_data::*;
}

pub use checks::{run_check, SimpleModelComparison, SimpleModelComparisonConfig, Strategy, TrainTestCheck};
pub use context::{Context, SplitKind};
pub use result::{
    Bar, BarChart, CheckOutcome, CheckResult, ConditionCategory, ConditionOutcome,
    ConditionResult, MetricRow, ModelKind, ResultTable, ShowOnly,
};
pub use scorer::{PerClassScorer, ScorerSpec};

/// The usual imports for writing and running checks.
pub mod prelude {
    pub use crate::checks::{run_check, SimpleModelComparison, SimpleModelComparisonConfig, TrainTestCheck};
    pub use crate::context::{Context, SplitKind};
    pub use crate::result::{CheckOutcome, CheckResult, ConditionCategory, ModelKind};
    pub use crate::scorer::ScorerSpec;
    pub use kestrel_core::{Error, LabelFormatter, RawLabel, Result, TaskType};
    pub use kestrel_data::{Batch, Loader, LoaderConfig, VecSource, VisionData};
}

// Scorers — streaming per-class classification metrics
//
// A scorer is a stateful accumulator: batches of (prediction vectors, true
// class ids) stream in through `update`, and `compute` reports one value per
// class. Checks build a fresh scorer set per model so accumulators are
// never shared.
//
// Per-class metrics follow sklearn conventions: the predicted class is the
// argmax of the score vector, and zero denominators score 0.

use std::collections::BTreeMap;
use std::sync::Arc;

use kestrel_core::{Error, Result};

/// A stateful per-class metric accumulator.
pub trait PerClassScorer: Send {
    /// Accumulate one batch of (prediction vectors, true class ids).
    fn update(&mut self, predictions: &[Vec<f64>], labels: &[i64]);

    /// Current metric value per class, over everything accumulated so far.
    fn compute(&self) -> BTreeMap<i64, f64>;
}

/// Names accepted by [`ScorerSpec::named`].
pub const BUILTIN_SCORERS: &[&str] = &[
    "f1_per_class",
    "precision_per_class",
    "recall_per_class",
];

/// Build a builtin scorer by name.
pub fn builtin(name: &str) -> Result<Box<dyn PerClassScorer>> {
    let kind = match name {
        "f1_per_class" => MetricKind::F1,
        "precision_per_class" => MetricKind::Precision,
        "recall_per_class" => MetricKind::Recall,
        other => {
            return Err(Error::Configuration(format!(
                "unknown scorer {other:?}, expected one of {BUILTIN_SCORERS:?}"
            )))
        }
    };
    Ok(Box::new(ConfusionScorer::new(kind)))
}

/// Index of the largest value; ties go to the first occurrence.
pub fn argmax(prediction: &[f64]) -> i64 {
    let mut best = 0usize;
    for (i, v) in prediction.iter().enumerate() {
        if *v > prediction[best] {
            best = i;
        }
    }
    best as i64
}

/// A scorer to run, either a builtin by name or a user-supplied factory.
///
/// Factories (rather than boxed instances) let a check build independent
/// accumulators for each model it scores.
#[derive(Clone)]
pub enum ScorerSpec {
    Named(String),
    Custom {
        name: String,
        factory: Arc<dyn Fn() -> Box<dyn PerClassScorer> + Send + Sync>,
    },
}

impl ScorerSpec {
    pub fn named(name: impl Into<String>) -> Self {
        ScorerSpec::Named(name.into())
    }

    pub fn custom<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn PerClassScorer> + Send + Sync + 'static,
    {
        ScorerSpec::Custom {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// The metric name reported in result tables.
    pub fn name(&self) -> &str {
        match self {
            ScorerSpec::Named(n) => n,
            ScorerSpec::Custom { name, .. } => name,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, ScorerSpec::Custom { .. })
    }

    /// Fail early when a named scorer does not exist.
    pub fn validate(&self) -> Result<()> {
        match self {
            ScorerSpec::Named(n) => builtin(n).map(|_| ()),
            ScorerSpec::Custom { .. } => Ok(()),
        }
    }

    /// Build a fresh accumulator.
    pub fn build(&self) -> Result<Box<dyn PerClassScorer>> {
        match self {
            ScorerSpec::Named(n) => builtin(n),
            ScorerSpec::Custom { factory, .. } => Ok(factory()),
        }
    }
}

// Confusion-count scorer

#[derive(Debug, Clone, Copy)]
enum MetricKind {
    F1,
    Precision,
    Recall,
}

#[derive(Debug, Default, Clone)]
struct Counts {
    tp: u64,
    fp: u64,
    fn_: u64,
}

/// Streams (predicted class, true class) pairs into per-class
/// true-positive / false-positive / false-negative counts.
struct ConfusionScorer {
    kind: MetricKind,
    counts: BTreeMap<i64, Counts>,
}

impl ConfusionScorer {
    fn new(kind: MetricKind) -> Self {
        Self {
            kind,
            counts: BTreeMap::new(),
        }
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl PerClassScorer for ConfusionScorer {
    fn update(&mut self, predictions: &[Vec<f64>], labels: &[i64]) {
        for (prediction, &truth) in predictions.iter().zip(labels.iter()) {
            let predicted = argmax(prediction);
            if predicted == truth {
                self.counts.entry(truth).or_default().tp += 1;
            } else {
                self.counts.entry(truth).or_default().fn_ += 1;
                self.counts.entry(predicted).or_default().fp += 1;
            }
        }
    }

    fn compute(&self) -> BTreeMap<i64, f64> {
        self.counts
            .iter()
            .map(|(&class, c)| {
                let precision = ratio(c.tp, c.tp + c.fp);
                let recall = ratio(c.tp, c.tp + c.fn_);
                let value = match self.kind {
                    MetricKind::Precision => precision,
                    MetricKind::Recall => recall,
                    MetricKind::F1 => {
                        if precision + recall == 0.0 {
                            0.0
                        } else {
                            2.0 * precision * recall / (precision + recall)
                        }
                    }
                };
                (class, value)
            })
            .collect()
    }
}

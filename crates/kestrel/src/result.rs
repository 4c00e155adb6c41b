// Check results — the long-form metric table, conditions, and display model
//
// Every comparison check produces a `ResultTable`: one row per
// (model, metric, class). The table is the stable output contract;
// conditions and displays are derived from it.

use std::collections::BTreeSet;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use kestrel_core::{Error, Result};

/// Which model a table row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// The model under validation.
    Given,
    /// A hypothetical model that predicts every label correctly.
    Perfect,
    /// The naive baseline built from the training prior.
    Simple,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Given => "Given Model",
            ModelKind::Perfect => "Perfect Model",
            ModelKind::Simple => "Simple Model",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the comparison table.
#[derive(Debug, Clone)]
pub struct MetricRow {
    pub model: ModelKind,
    pub metric: String,
    pub class_id: i64,
    pub class_name: String,
    pub n_samples: u64,
    pub value: f64,
}

/// Long-form metric table: one row per (model, metric, class).
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    rows: Vec<MetricRow>,
}

impl ResultTable {
    pub fn new(rows: Vec<MetricRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Remove rows whose value is NaN. Undefined metric values must not
    /// reach condition analysis or displays.
    pub fn drop_nan(&mut self) {
        self.rows.retain(|r| !r.value.is_nan());
    }

    /// Sort by model name, then value, both descending.
    pub fn sort(&mut self) {
        self.rows.sort_by(|a, b| {
            b.model
                .name()
                .cmp(a.model.name())
                .then(b.value.total_cmp(&a.value))
        });
    }

    /// The value of one (model, metric, class) cell, if present.
    pub fn value(&self, model: ModelKind, metric: &str, class_id: i64) -> Option<f64> {
        self.rows
            .iter()
            .find(|r| r.model == model && r.metric == metric && r.class_id == class_id)
            .map(|r| r.value)
    }

    /// The row of one (model, metric, class) cell, if present.
    pub fn row(&self, model: ModelKind, metric: &str, class_id: i64) -> Option<&MetricRow> {
        self.rows
            .iter()
            .find(|r| r.model == model && r.metric == metric && r.class_id == class_id)
    }

    /// Distinct metric names, in first-appearance order.
    pub fn metrics(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for r in &self.rows {
            if !out.contains(&r.metric) {
                out.push(r.metric.clone());
            }
        }
        out
    }

    /// Distinct class ids present for one model and metric.
    pub fn classes(&self, model: ModelKind, metric: &str) -> BTreeSet<i64> {
        self.rows
            .iter()
            .filter(|r| r.model == model && r.metric == metric)
            .map(|r| r.class_id)
            .collect()
    }
}

// Display model

/// One bar of a grouped bar chart.
#[derive(Debug, Clone)]
pub struct Bar {
    pub metric: String,
    pub class_name: String,
    pub model: ModelKind,
    pub value: f64,
    pub n_samples: u64,
}

/// A renderer-agnostic description of the check's chart.
#[derive(Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub bars: Vec<Bar>,
}

/// Which classes a display should keep when there are too many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOnly {
    /// Classes with the most test samples.
    Largest,
    /// Classes with the fewest test samples.
    Smallest,
    /// A seeded random choice of classes.
    Random,
    /// Classes where the given model scores highest.
    Best,
    /// Classes where the given model scores lowest.
    Worst,
}

impl ShowOnly {
    pub const ALLOWED: &'static [&'static str] =
        &["largest", "smallest", "random", "best", "worst"];

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "largest" => Ok(ShowOnly::Largest),
            "smallest" => Ok(ShowOnly::Smallest),
            "random" => Ok(ShowOnly::Random),
            "best" => Ok(ShowOnly::Best),
            "worst" => Ok(ShowOnly::Worst),
            other => Err(Error::Configuration(format!(
                "unknown show_only value {other:?}, expected one of {:?}",
                Self::ALLOWED
            ))),
        }
    }
}

/// Choose up to `n_to_show` classes for display, ranked over the given
/// model's rows for `metric`.
pub fn filter_classes_for_display(
    table: &ResultTable,
    show_only: ShowOnly,
    n_to_show: usize,
    metric: &str,
    seed: u64,
) -> Vec<i64> {
    let mut rows: Vec<&MetricRow> = table
        .rows()
        .iter()
        .filter(|r| r.model == ModelKind::Given && r.metric == metric)
        .collect();
    match show_only {
        ShowOnly::Largest => rows.sort_by(|a, b| b.n_samples.cmp(&a.n_samples)),
        ShowOnly::Smallest => rows.sort_by(|a, b| a.n_samples.cmp(&b.n_samples)),
        ShowOnly::Random => {
            let mut rng = StdRng::seed_from_u64(seed);
            rows.shuffle(&mut rng);
        }
        ShowOnly::Best => rows.sort_by(|a, b| b.value.total_cmp(&a.value)),
        ShowOnly::Worst => rows.sort_by(|a, b| a.value.total_cmp(&b.value)),
    }
    rows.into_iter().take(n_to_show).map(|r| r.class_id).collect()
}

// Conditions

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionCategory {
    Pass,
    Fail,
}

/// Outcome of one registered condition.
#[derive(Debug, Clone)]
pub struct ConditionResult {
    pub category: ConditionCategory,
    pub message: String,
}

impl ConditionResult {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            category: ConditionCategory::Pass,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            category: ConditionCategory::Fail,
            message: message.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.category == ConditionCategory::Pass
    }
}

/// A condition's name paired with its evaluation.
#[derive(Debug, Clone)]
pub struct ConditionOutcome {
    pub name: String,
    pub result: ConditionResult,
}

/// What a check computes: the table plus an optional display.
pub struct CheckResult {
    pub header: String,
    pub table: ResultTable,
    pub display: Option<BarChart>,
}

/// A full check run: the result and every condition's outcome.
pub struct CheckOutcome {
    pub result: CheckResult,
    pub conditions: Vec<ConditionOutcome>,
}

impl CheckOutcome {
    /// Whether every registered condition passed.
    pub fn passed(&self) -> bool {
        self.conditions.iter().all(|c| c.result.is_pass())
    }
}

/// Format a fraction as a percent string with up to two decimals,
/// trailing zeros trimmed: 0.8 -> "80%", 0.04 -> "4%", 0.123 -> "12.3%".
pub fn format_percent(value: f64) -> String {
    let mut s = format!("{:.2}", value * 100.0);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s.push('%');
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(model: ModelKind, metric: &str, class_id: i64, n: u64, value: f64) -> MetricRow {
        MetricRow {
            model,
            metric: metric.into(),
            class_id,
            class_name: class_id.to_string(),
            n_samples: n,
            value,
        }
    }

    #[test]
    fn percent_formatting() {
        assert_eq!(format_percent(0.8), "80%");
        assert_eq!(format_percent(0.04), "4%");
        assert_eq!(format_percent(0.123), "12.3%");
        assert_eq!(format_percent(1.0), "100%");
        assert_eq!(format_percent(-0.25), "-25%");
        assert_eq!(format_percent(0.0412), "4.12%");
    }

    #[test]
    fn sort_is_model_then_value_descending() {
        let mut t = ResultTable::new(vec![
            row(ModelKind::Given, "f1_per_class", 0, 5, 0.2),
            row(ModelKind::Simple, "f1_per_class", 0, 5, 0.9),
            row(ModelKind::Given, "f1_per_class", 1, 5, 0.8),
            row(ModelKind::Perfect, "f1_per_class", 0, 5, 1.0),
        ]);
        t.sort();
        let order: Vec<(&str, f64)> = t.rows().iter().map(|r| (r.model.name(), r.value)).collect();
        assert_eq!(
            order,
            vec![
                ("Simple Model", 0.9),
                ("Perfect Model", 1.0),
                ("Given Model", 0.8),
                ("Given Model", 0.2),
            ]
        );
    }

    #[test]
    fn nan_rows_are_dropped() {
        let mut t = ResultTable::new(vec![
            row(ModelKind::Given, "f1_per_class", 0, 5, f64::NAN),
            row(ModelKind::Given, "f1_per_class", 1, 5, 0.5),
        ]);
        t.drop_nan();
        assert_eq!(t.rows().len(), 1);
        assert_eq!(t.rows()[0].class_id, 1);
    }

    #[test]
    fn display_filter_largest_and_worst() {
        let t = ResultTable::new(vec![
            row(ModelKind::Given, "f1_per_class", 0, 100, 0.9),
            row(ModelKind::Given, "f1_per_class", 1, 5, 0.1),
            row(ModelKind::Given, "f1_per_class", 2, 50, 0.5),
            row(ModelKind::Simple, "f1_per_class", 0, 100, 0.3),
        ]);
        assert_eq!(
            filter_classes_for_display(&t, ShowOnly::Largest, 2, "f1_per_class", 0),
            vec![0, 2]
        );
        assert_eq!(
            filter_classes_for_display(&t, ShowOnly::Worst, 2, "f1_per_class", 0),
            vec![1, 2]
        );
    }

    #[test]
    fn display_filter_random_is_seeded() {
        let t = ResultTable::new(
            (0..20)
                .map(|c| row(ModelKind::Given, "f1_per_class", c, 1, 0.5))
                .collect(),
        );
        let a = filter_classes_for_display(&t, ShowOnly::Random, 5, "f1_per_class", 7);
        let b = filter_classes_for_display(&t, ShowOnly::Random, 5, "f1_per_class", 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn show_only_parsing() {
        assert_eq!(ShowOnly::parse("largest").unwrap(), ShowOnly::Largest);
        assert!(matches!(
            ShowOnly::parse("biggest"),
            Err(Error::Configuration(_))
        ));
    }
}

// Simple model comparison — given model vs. perfect and naive baselines
//
// Scores the given model on the test split next to two synthetic models: a
// perfect model that always predicts the true label, and a simple baseline
// built from the training prior with no image information at all. The gap
// between simple and perfect anchors how much of the possible improvement
// the given model actually delivers.

use std::collections::BTreeMap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use kestrel_core::{Error, Result, TaskType};
use kestrel_data::Batch;

use crate::checks::TrainTestCheck;
use crate::context::{Context, SplitKind};
use crate::result::{
    filter_classes_for_display, format_percent, Bar, BarChart, CheckResult, ConditionOutcome,
    ConditionResult, MetricRow, ModelKind, ResultTable, ShowOnly,
};
use crate::scorer::{PerClassScorer, ScorerSpec};

const DEFAULT_MAX_GAIN: f64 = 50.0;

/// How the simple baseline predicts, given only the training prior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Always predict the most frequent training class.
    MostFrequent,
    /// Predict the empirical training class distribution for every sample.
    Prior,
    /// Sample a class per prediction from the training distribution.
    Stratified,
    /// Predict every class with equal probability.
    Uniform,
}

impl Strategy {
    pub const ALLOWED: &'static [&'static str] =
        &["most_frequent", "prior", "stratified", "uniform"];

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "most_frequent" => Ok(Strategy::MostFrequent),
            "prior" => Ok(Strategy::Prior),
            "stratified" => Ok(Strategy::Stratified),
            "uniform" => Ok(Strategy::Uniform),
            other => Err(Error::InvalidStrategy {
                got: other.to_string(),
                allowed: Self::ALLOWED,
            }),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::MostFrequent => "most_frequent",
            Strategy::Prior => "prior",
            Strategy::Stratified => "stratified",
            Strategy::Uniform => "uniform",
        };
        f.write_str(name)
    }
}

/// Configuration for [`SimpleModelComparison`]. All fields have defaults.
pub struct SimpleModelComparisonConfig {
    /// Baseline strategy name (see [`Strategy::ALLOWED`]).
    pub strategy: String,
    /// Metrics to score; `None` means per-class F1.
    pub scorers: Option<Vec<ScorerSpec>>,
    /// How many classes the display keeps.
    pub n_to_show: usize,
    /// How display classes are chosen (see [`ShowOnly::ALLOWED`]).
    pub show_only: String,
    /// Metric the best/worst display ranking uses. Required when custom
    /// scorers are combined with best/worst.
    pub metric_to_show_by: Option<String>,
    /// Explicit class list for display, overriding `show_only`.
    pub class_list_to_show: Option<Vec<i64>>,
    /// Seed for the stratified baseline and the random display filter.
    pub strategy_seed: u64,
}

impl Default for SimpleModelComparisonConfig {
    fn default() -> Self {
        Self {
            strategy: "most_frequent".into(),
            scorers: None,
            n_to_show: 20,
            show_only: "largest".into(),
            metric_to_show_by: None,
            class_list_to_show: None,
            strategy_seed: 0,
        }
    }
}

struct GainCondition {
    min_allowed_gain: f64,
    max_gain: f64,
    classes: Option<Vec<i64>>,
    average: bool,
}

struct ComparisonState {
    given: Vec<(String, Box<dyn PerClassScorer>)>,
    perfect: Vec<(String, Box<dyn PerClassScorer>)>,
    /// True-label counts observed on the test split.
    test_counts: BTreeMap<i64, u64>,
    /// Widest prediction vector seen so far.
    pred_width: usize,
}

/// The simple-model-comparison check (classification only).
pub struct SimpleModelComparison {
    strategy: Strategy,
    scorer_specs: Vec<ScorerSpec>,
    n_to_show: usize,
    show_only: ShowOnly,
    metric_to_show_by: Option<String>,
    class_list_to_show: Option<Vec<i64>>,
    strategy_seed: u64,
    conditions: Vec<GainCondition>,
    state: Option<ComparisonState>,
}

impl SimpleModelComparison {
    /// Validate the configuration and build the check.
    pub fn new(config: SimpleModelComparisonConfig) -> Result<Self> {
        let strategy = Strategy::parse(&config.strategy)?;
        let show_only = ShowOnly::parse(&config.show_only)?;
        let has_custom = config.scorers.is_some();
        let scorer_specs = config
            .scorers
            .unwrap_or_else(|| vec![ScorerSpec::named("f1_per_class")]);
        if scorer_specs.is_empty() {
            return Err(Error::Configuration(
                "at least one scorer is required".into(),
            ));
        }
        for spec in &scorer_specs {
            spec.validate()?;
        }
        if has_custom
            && matches!(show_only, ShowOnly::Best | ShowOnly::Worst)
            && config.metric_to_show_by.is_none()
        {
            return Err(Error::Configuration(
                "metric_to_show_by is required when custom scorers are combined \
                 with show_only \"best\" or \"worst\""
                    .into(),
            ));
        }
        Ok(Self {
            strategy,
            scorer_specs,
            n_to_show: config.n_to_show,
            show_only,
            metric_to_show_by: config.metric_to_show_by,
            class_list_to_show: config.class_list_to_show,
            strategy_seed: config.strategy_seed,
            conditions: Vec::new(),
            state: None,
        })
    }

    /// Require the given model's gain over the simple model to exceed
    /// `min_allowed_gain`, per metric and class.
    pub fn add_condition_gain_greater_than(self, min_allowed_gain: f64) -> Self {
        self.add_condition_gain(min_allowed_gain, DEFAULT_MAX_GAIN, None, false)
    }

    /// Full form of the gain condition: clamp to `[-max_gain, max_gain]`,
    /// restrict to `classes` when given, and with `average` compare mean
    /// scores per metric instead of per class.
    pub fn add_condition_gain(
        mut self,
        min_allowed_gain: f64,
        max_gain: f64,
        classes: Option<Vec<i64>>,
        average: bool,
    ) -> Self {
        self.conditions.push(GainCondition {
            min_allowed_gain,
            max_gain,
            classes,
            average,
        });
        self
    }

    fn build_scorers(&self) -> Result<Vec<(String, Box<dyn PerClassScorer>)>> {
        self.scorer_specs
            .iter()
            .map(|spec| Ok((spec.name().to_string(), spec.build()?)))
            .collect()
    }

    /// Score a freshly generated simple model against the observed test
    /// labels.
    fn score_simple_model(
        &self,
        train_counts: &BTreeMap<i64, u64>,
        test_counts: &BTreeMap<i64, u64>,
        width: usize,
    ) -> Result<Vec<(String, BTreeMap<i64, f64>)>> {
        let prior = prior_distribution(train_counts, width);
        let mut predictor = SimplePredictor::new(self.strategy, &prior, self.strategy_seed)?;
        let mut scorers = self.build_scorers()?;
        for (&class, &count) in test_counts {
            let labels = vec![class; count as usize];
            let predictions: Vec<Vec<f64>> =
                (0..count).map(|_| predictor.next_prediction()).collect();
            for (_, scorer) in scorers.iter_mut() {
                scorer.update(&predictions, &labels);
            }
        }
        Ok(scorers
            .into_iter()
            .map(|(name, scorer)| {
                let scores = scorer.compute();
                (name, scores)
            })
            .collect())
    }
}

impl TrainTestCheck for SimpleModelComparison {
    fn header(&self) -> String {
        "Simple Model Comparison".into()
    }

    fn initialize(&mut self, ctx: &Context) -> Result<()> {
        ctx.assert_task_type(TaskType::Classification)?;
        self.state = Some(ComparisonState {
            given: self.build_scorers()?,
            perfect: self.build_scorers()?,
            test_counts: BTreeMap::new(),
            pred_width: 0,
        });
        Ok(())
    }

    fn update(&mut self, ctx: &Context, batch: &Batch, split: SplitKind) -> Result<()> {
        // The training prior comes from samples_per_class, not batches.
        if split != SplitKind::Test {
            return Ok(());
        }
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| Error::Configuration("check updated before initialize".into()))?;
        let labels = ctx.data(split).class_labels(batch)?;
        let predictions = ctx.predictions(batch);
        if predictions.len() != labels.len() {
            return Err(Error::Msg(format!(
                "model produced {} predictions for a batch of {} samples",
                predictions.len(),
                labels.len()
            )));
        }
        for &label in &labels {
            *state.test_counts.entry(label).or_insert(0) += 1;
        }
        let perfect: Vec<Vec<f64>> = labels
            .iter()
            .zip(predictions.iter())
            .map(|(&label, p)| one_hot(label as usize, p.len().max(label as usize + 1)))
            .collect();
        state.pred_width = predictions
            .iter()
            .map(|p| p.len())
            .fold(state.pred_width, usize::max);
        for (_, scorer) in state.given.iter_mut() {
            scorer.update(&predictions, &labels);
        }
        for (_, scorer) in state.perfect.iter_mut() {
            scorer.update(&perfect, &labels);
        }
        Ok(())
    }

    fn compute(&mut self, ctx: &Context) -> Result<CheckResult> {
        let state = self
            .state
            .take()
            .ok_or_else(|| Error::Configuration("compute called before initialize".into()))?;
        let train_counts = ctx.train().samples_per_class()?;
        let max_id = train_counts
            .keys()
            .chain(state.test_counts.keys())
            .max()
            .copied()
            .unwrap_or(-1);
        let width = ctx
            .train()
            .num_classes()?
            .max((max_id + 1) as usize)
            .max(state.pred_width);

        let mut rows = Vec::new();
        for (model, scorers) in [
            (ModelKind::Given, &state.given),
            (ModelKind::Perfect, &state.perfect),
        ] {
            for (metric, scorer) in scorers {
                push_rows(&mut rows, model, metric, scorer.compute(), &state.test_counts, ctx);
            }
        }
        for (metric, scores) in self.score_simple_model(&train_counts, &state.test_counts, width)? {
            push_rows(&mut rows, ModelKind::Simple, &metric, scores, &state.test_counts, ctx);
        }

        let mut table = ResultTable::new(rows);
        table.drop_nan();
        table.sort();

        let display = if ctx.display_enabled() {
            let classes = match &self.class_list_to_show {
                Some(list) => list.clone(),
                None => {
                    let metric = self
                        .metric_to_show_by
                        .clone()
                        .unwrap_or_else(|| self.scorer_specs[0].name().to_string());
                    filter_classes_for_display(
                        &table,
                        self.show_only,
                        self.n_to_show,
                        &metric,
                        self.strategy_seed,
                    )
                }
            };
            Some(build_bar_chart(&table, &classes))
        } else {
            None
        };

        Ok(CheckResult {
            header: self.header(),
            table,
            display,
        })
    }

    fn evaluate_conditions(&self, result: &CheckResult) -> Result<Vec<ConditionOutcome>> {
        self.conditions
            .iter()
            .map(|cond| {
                Ok(ConditionOutcome {
                    name: cond.name(),
                    result: cond.evaluate(&result.table)?,
                })
            })
            .collect()
    }
}

fn push_rows(
    rows: &mut Vec<MetricRow>,
    model: ModelKind,
    metric: &str,
    scores: BTreeMap<i64, f64>,
    test_counts: &BTreeMap<i64, u64>,
    ctx: &Context,
) {
    for (class_id, value) in scores {
        rows.push(MetricRow {
            model,
            metric: metric.to_string(),
            class_id,
            class_name: ctx.test().class_name(class_id),
            n_samples: test_counts.get(&class_id).copied().unwrap_or(0),
            value,
        });
    }
}

fn build_bar_chart(table: &ResultTable, classes: &[i64]) -> BarChart {
    // Perfect scores 1.0 everywhere and would only flatten the chart.
    let bars = table
        .rows()
        .iter()
        .filter(|r| r.model != ModelKind::Perfect && classes.contains(&r.class_id))
        .map(|r| Bar {
            metric: r.metric.clone(),
            class_name: r.class_name.clone(),
            model: r.model,
            value: r.value,
            n_samples: r.n_samples,
        })
        .collect();
    BarChart {
        title: "Given vs. simple model performance".into(),
        bars,
    }
}

// Simple-model prediction generation

fn one_hot(index: usize, width: usize) -> Vec<f64> {
    let mut v = vec![0.0; width];
    v[index] = 1.0;
    v
}

/// Empirical class distribution over `0..width` from per-class counts.
fn prior_distribution(counts: &BTreeMap<i64, u64>, width: usize) -> Vec<f64> {
    let total: u64 = counts.values().sum();
    let mut prior = vec![0.0; width];
    if total == 0 {
        return prior;
    }
    for (&class, &count) in counts {
        prior[class as usize] = count as f64 / total as f64;
    }
    prior
}

/// Constant prediction vector for the strategies that have one.
fn constant_prediction(strategy: Strategy, prior: &[f64]) -> Option<Vec<f64>> {
    match strategy {
        Strategy::MostFrequent => {
            let mut best = 0usize;
            for (i, p) in prior.iter().enumerate() {
                if *p > prior[best] {
                    best = i;
                }
            }
            Some(one_hot(best, prior.len()))
        }
        Strategy::Prior => Some(prior.to_vec()),
        Strategy::Uniform => Some(vec![1.0 / prior.len() as f64; prior.len()]),
        Strategy::Stratified => None,
    }
}

/// Produces one simple-model prediction per call. The stratified form owns
/// its seeded generator so a full run is reproducible.
enum SimplePredictor {
    Constant(Vec<f64>),
    Stratified {
        dist: WeightedIndex<f64>,
        rng: StdRng,
        width: usize,
    },
}

impl SimplePredictor {
    fn new(strategy: Strategy, prior: &[f64], seed: u64) -> Result<Self> {
        match constant_prediction(strategy, prior) {
            Some(v) => Ok(SimplePredictor::Constant(v)),
            None => {
                let dist = WeightedIndex::new(prior).map_err(|e| {
                    Error::Configuration(format!(
                        "cannot build a stratified baseline from the training prior: {e}"
                    ))
                })?;
                Ok(SimplePredictor::Stratified {
                    dist,
                    rng: StdRng::seed_from_u64(seed),
                    width: prior.len(),
                })
            }
        }
    }

    fn next_prediction(&mut self) -> Vec<f64> {
        match self {
            SimplePredictor::Constant(v) => v.clone(),
            SimplePredictor::Stratified { dist, rng, width } => {
                one_hot(dist.sample(rng), *width)
            }
        }
    }
}

// Gain

/// How much of the simple-to-perfect improvement the given model achieves,
/// clamped to `[-max_gain, max_gain]`.
pub(crate) fn gain(simple: f64, given: f64, perfect: f64, max_gain: f64) -> f64 {
    ((given - simple) / (perfect - simple)).clamp(-max_gain, max_gain)
}

impl GainCondition {
    fn name(&self) -> String {
        format!(
            "Model performance gain over simple model is greater than {}",
            format_percent(self.min_allowed_gain)
        )
    }

    fn included(&self, class: i64) -> bool {
        self.classes.as_ref().is_none_or(|list| list.contains(&class))
    }

    fn evaluate(&self, table: &ResultTable) -> Result<ConditionResult> {
        if self.average {
            self.evaluate_averaged(table)
        } else {
            self.evaluate_per_class(table)
        }
    }

    fn evaluate_per_class(&self, table: &ResultTable) -> Result<ConditionResult> {
        let mut failed: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut min_gain: Option<(f64, String, String)> = None;
        for metric in table.metrics() {
            for class in table.classes(ModelKind::Given, &metric) {
                if !self.included(class) {
                    continue;
                }
                let given_row = match table.row(ModelKind::Given, &metric, class) {
                    Some(r) => r,
                    None => continue,
                };
                let (Some(simple), Some(perfect)) = (
                    table.value(ModelKind::Simple, &metric, class),
                    table.value(ModelKind::Perfect, &metric, class),
                ) else {
                    continue;
                };
                // No headroom to gain over.
                if given_row.value == perfect {
                    continue;
                }
                let g = gain(simple, given_row.value, perfect, self.max_gain);
                if g <= self.min_allowed_gain {
                    failed
                        .entry(metric.clone())
                        .or_default()
                        .insert(given_row.class_name.clone(), format_percent(g));
                }
                if min_gain.as_ref().is_none_or(|(mg, _, _)| g < *mg) {
                    min_gain = Some((g, metric.clone(), given_row.class_name.clone()));
                }
            }
        }
        if !failed.is_empty() {
            return Ok(ConditionResult::fail(format!(
                "Found metrics with gain below threshold: {failed:?}"
            )));
        }
        Ok(match min_gain {
            Some((g, metric, class)) => ConditionResult::pass(format!(
                "Found minimal gain of {} for metric {metric} and class {class}",
                format_percent(g)
            )),
            None => ConditionResult::pass("No comparable classes found"),
        })
    }

    fn evaluate_averaged(&self, table: &ResultTable) -> Result<ConditionResult> {
        let mut failed: BTreeMap<String, String> = BTreeMap::new();
        let mut min_gain: Option<(f64, String)> = None;
        for metric in table.metrics() {
            let classes: Vec<i64> = table
                .classes(ModelKind::Given, &metric)
                .into_iter()
                .filter(|&c| self.included(c))
                .collect();
            if classes.is_empty() {
                continue;
            }
            let mut sums = [0.0f64; 3];
            for &class in &classes {
                let given = table
                    .value(ModelKind::Given, &metric, class)
                    .unwrap_or(f64::NAN);
                let simple =
                    table
                        .value(ModelKind::Simple, &metric, class)
                        .ok_or_else(|| {
                            Error::Msg(format!(
                                "missing simple model score for metric {metric} and class {class}"
                            ))
                        })?;
                let perfect =
                    table
                        .value(ModelKind::Perfect, &metric, class)
                        .ok_or_else(|| {
                            Error::Msg(format!(
                                "missing perfect model score for metric {metric} and class {class}"
                            ))
                        })?;
                sums[0] += given;
                sums[1] += simple;
                sums[2] += perfect;
            }
            let n = classes.len() as f64;
            let (given, simple, perfect) = (sums[0] / n, sums[1] / n, sums[2] / n);
            if given == perfect {
                continue;
            }
            let g = gain(simple, given, perfect, self.max_gain);
            if g <= self.min_allowed_gain {
                failed.insert(metric.clone(), format_percent(g));
            }
            if min_gain.as_ref().is_none_or(|(mg, _)| g < *mg) {
                min_gain = Some((g, metric.clone()));
            }
        }
        if !failed.is_empty() {
            return Ok(ConditionResult::fail(format!(
                "Found metrics with gain below threshold: {failed:?}"
            )));
        }
        Ok(match min_gain {
            Some((g, metric)) => ConditionResult::pass(format!(
                "Found minimal gain of {} for metric {metric}",
                format_percent(g)
            )),
            None => ConditionResult::pass("No comparable classes found"),
        })
    }
}

// Check protocol — the train/test streaming lifecycle
//
// A check is a stateful object driven through a fixed lifecycle:
// initialize, then every train batch, then every test batch, then compute.
// Conditions are evaluated over the computed result. Any error aborts the
// run and propagates; this is a fail-fast diagnostic tool.

pub mod simple_model_comparison;

pub use simple_model_comparison::{
    SimpleModelComparison, SimpleModelComparisonConfig, Strategy,
};

use kestrel_core::Result;
use kestrel_data::Batch;

use crate::context::{Context, SplitKind};
use crate::result::{CheckOutcome, CheckResult, ConditionOutcome};

/// A check that streams both splits and reduces to a result table.
pub trait TrainTestCheck {
    /// Human-readable check name.
    fn header(&self) -> String;

    /// Reset accumulators and validate the context for this check.
    fn initialize(&mut self, ctx: &Context) -> Result<()>;

    /// Accumulate one batch from the given split.
    fn update(&mut self, ctx: &Context, batch: &Batch, split: SplitKind) -> Result<()>;

    /// Reduce accumulated state to the final result.
    fn compute(&mut self, ctx: &Context) -> Result<CheckResult>;

    /// Evaluate registered conditions against a computed result.
    fn evaluate_conditions(&self, _result: &CheckResult) -> Result<Vec<ConditionOutcome>> {
        Ok(Vec::new())
    }
}

/// Drive a check through its full lifecycle.
pub fn run_check(check: &mut dyn TrainTestCheck, ctx: &Context) -> Result<CheckOutcome> {
    log::debug!("running check: {}", check.header());
    check.initialize(ctx)?;
    for batch in ctx.train().iter_batches() {
        check.update(ctx, &batch, SplitKind::Train)?;
    }
    for batch in ctx.test().iter_batches() {
        check.update(ctx, &batch, SplitKind::Test)?;
    }
    let result = check.compute(ctx)?;
    let conditions = check.evaluate_conditions(&result)?;
    Ok(CheckOutcome { result, conditions })
}

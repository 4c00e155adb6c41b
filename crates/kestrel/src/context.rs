// Check context — the datasets and model a check runs against
//
// A `Context` bundles the train and test `VisionData` with the prediction
// function of the model under validation. Structural compatibility of the
// two splits is verified once, at construction.

use std::fmt;

use kestrel_core::{Error, Result, TaskType};
use kestrel_data::{Batch, VisionData};

/// Which split a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    Train,
    Test,
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitKind::Train => write!(f, "train"),
            SplitKind::Test => write!(f, "test"),
        }
    }
}

/// Prediction function of the model under validation.
///
/// Given a batch, returns one score vector per sample; the predicted class
/// is the argmax of the vector.
pub type PredictFn = Box<dyn Fn(&Batch) -> Vec<Vec<f64>> + Send + Sync>;

/// Everything a train/test check needs: both splits and the model.
pub struct Context {
    train: VisionData,
    test: VisionData,
    with_display: bool,
    predict: PredictFn,
}

impl Context {
    /// Bundle the two splits with a model's prediction function.
    ///
    /// Fails when the splits are structurally incompatible.
    pub fn new<F>(train: VisionData, test: VisionData, predict: F) -> Result<Self>
    where
        F: Fn(&Batch) -> Vec<Vec<f64>> + Send + Sync + 'static,
    {
        train.validate_shared_structure(&test)?;
        Ok(Self {
            train,
            test,
            with_display: true,
            predict: Box::new(predict),
        })
    }

    /// Enable or disable display output (enabled by default).
    pub fn with_display(mut self, on: bool) -> Self {
        self.with_display = on;
        self
    }

    pub fn train(&self) -> &VisionData {
        &self.train
    }

    pub fn test(&self) -> &VisionData {
        &self.test
    }

    pub fn data(&self, split: SplitKind) -> &VisionData {
        match split {
            SplitKind::Train => &self.train,
            SplitKind::Test => &self.test,
        }
    }

    pub fn display_enabled(&self) -> bool {
        self.with_display
    }

    /// Fail unless both splits carry the expected task type.
    pub fn assert_task_type(&self, expected: TaskType) -> Result<()> {
        for data in [&self.train, &self.test] {
            if data.task_type() != expected {
                return Err(Error::UnsupportedTaskType {
                    expected,
                    got: data.task_type(),
                });
            }
        }
        Ok(())
    }

    /// Run the model on one batch.
    pub fn predictions(&self, batch: &Batch) -> Vec<Vec<f64>> {
        (self.predict)(batch)
    }
}

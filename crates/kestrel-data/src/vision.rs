// VisionData — a record source wrapped with validation metadata
//
// VisionData is the contract every check consumes: a batched view of the
// dataset plus lazily computed statistics (per-class counts, label shape,
// task type) and a deterministic seeded sub-view for cheap repeated
// analysis. Statistics require a full pass over a potentially large
// dataset, so each is computed at most once and cached; repeated checks
// reuse the same instance without re-scanning.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use kestrel_core::{Error, Label, LabelFormatter, Result, TaskType};

use crate::loader::Loader;
use crate::source::Batch;
use crate::transform::Transform;

/// Wraps a batch loader together with label metadata for validation checks.
pub struct VisionData {
    loader: Loader,
    formatter: LabelFormatter,
    task_type: TaskType,
    declared_num_classes: Option<usize>,
    class_names: Option<BTreeMap<i64, String>>,
    transform_field: String,
    sample_size: usize,
    random_seed: u64,
    /// `Ok` when labels validated against the formatter, otherwise the
    /// reason they did not.
    label_valid: std::result::Result<(), String>,
    samples_per_class: OnceLock<BTreeMap<i64, u64>>,
    sample_loader: OnceLock<Loader>,
    sample_labels: OnceLock<Vec<Label>>,
}

impl VisionData {
    /// Wrap a loader with a label formatter.
    ///
    /// The first batch is pulled once to validate label presence and
    /// well-formedness; the outcome is stored and raised lazily by
    /// label-dependent operations.
    pub fn new(loader: Loader, formatter: LabelFormatter) -> Self {
        let task_type = formatter.task_type();
        if task_type == TaskType::Unknown {
            log::warn!(
                "unknown label formatter provided; only structural checks will run. \
                 Supported formatters: classification, detection"
            );
        }
        let label_valid = validate_first_batch(&loader, &formatter);
        Self {
            loader,
            formatter,
            task_type,
            declared_num_classes: None,
            class_names: None,
            transform_field: "transforms".into(),
            sample_size: 1000,
            random_seed: 0,
            label_valid,
            samples_per_class: OnceLock::new(),
            sample_loader: OnceLock::new(),
            sample_labels: OnceLock::new(),
        }
    }

    /// Declare the number of classes instead of inferring it.
    pub fn with_num_classes(mut self, n: usize) -> Self {
        self.declared_num_classes = Some(n);
        self
    }

    /// Attach human-readable class names.
    pub fn with_class_names(mut self, names: BTreeMap<i64, String>) -> Self {
        self.class_names = Some(names);
        self
    }

    /// Name of the source's transform pipeline field (default "transforms").
    pub fn with_transform_field(mut self, field: impl Into<String>) -> Self {
        self.transform_field = field.into();
        self
    }

    /// Sample size for the cached sub-view (default 1000).
    pub fn with_sample_size(mut self, n: usize) -> Self {
        self.sample_size = n;
        self
    }

    /// Seed for the cached sub-view (default 0).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn formatter(&self) -> &LabelFormatter {
        &self.formatter
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Iterate the full dataset batch-by-batch.
    pub fn iter_batches(&self) -> crate::loader::BatchIter<'_> {
        self.loader.iter_batches()
    }

    /// Whether the data source produces labels.
    pub fn has_labels(&self) -> bool {
        self.loader
            .iter_batches()
            .next()
            .is_some_and(|b| b.labels.is_some())
    }

    /// Fail if labels are missing or did not validate.
    pub fn assert_label(&self) -> Result<()> {
        self.label_valid
            .clone()
            .map_err(Error::InvalidLabel)
    }

    /// Canonical shape of one label sample, excluding the batch dimension.
    pub fn label_shape(&self) -> Result<Vec<usize>> {
        self.assert_label()?;
        let batch = self
            .loader
            .iter_batches()
            .next()
            .ok_or_else(|| Error::InvalidLabel("data source produced no batches".into()))?;
        let labels = batch
            .labels
            .as_ref()
            .ok_or_else(|| Error::InvalidLabel("batch contains no labels".into()))?;
        let first = labels
            .first()
            .ok_or_else(|| Error::InvalidLabel("batch is empty".into()))?;
        Ok(self.formatter.format(first)?.shape())
    }

    /// Convert one batch's raw labels to canonical labels.
    pub fn format_labels(&self, batch: &Batch) -> Result<Vec<Label>> {
        let labels = batch
            .labels
            .as_ref()
            .ok_or_else(|| Error::InvalidLabel("batch contains no labels".into()))?;
        self.formatter.format_batch(labels)
    }

    /// Convert one batch's labels to class ids (classification only).
    pub fn class_labels(&self, batch: &Batch) -> Result<Vec<i64>> {
        self.format_labels(batch)?
            .into_iter()
            .map(|l| match l {
                Label::Class(c) => Ok(c),
                other => Err(Error::InvalidLabel(format!(
                    "expected a class id, got {other:?}"
                ))),
            })
            .collect()
    }

    /// Per-class sample counts.
    ///
    /// The first access streams the entire source once through the label
    /// formatter; the mapping is cached and immutable thereafter. A clone
    /// is returned so callers cannot mutate the cached state.
    pub fn samples_per_class(&self) -> Result<BTreeMap<i64, u64>> {
        if let Some(counts) = self.samples_per_class.get() {
            return Ok(counts.clone());
        }
        let counts = self.scan_samples_per_class()?;
        // First computation wins under a race; the scan is idempotent.
        Ok(self.samples_per_class.get_or_init(|| counts).clone())
    }

    fn scan_samples_per_class(&self) -> Result<BTreeMap<i64, u64>> {
        match self.task_type {
            TaskType::Classification | TaskType::ObjectDetection => {}
            other => {
                return Err(Error::NotImplemented(format!(
                    "samples_per_class is not implemented for {other} tasks"
                )))
            }
        }
        self.assert_label()?;
        let mut counts = BTreeMap::new();
        for batch in self.loader.iter_batches() {
            let labels = self.format_labels(&batch)?;
            self.formatter.count_classes_into(&labels, &mut counts);
        }
        Ok(counts)
    }

    /// Number of classes: the declared value if supplied at construction,
    /// otherwise the number of distinct keys in [`samples_per_class`]
    /// (forcing the full scan).
    ///
    /// [`samples_per_class`]: VisionData::samples_per_class
    pub fn num_classes(&self) -> Result<usize> {
        match self.declared_num_classes {
            Some(n) => Ok(n),
            None => Ok(self.samples_per_class()?.len()),
        }
    }

    /// Human-readable name for a class id.
    pub fn class_name(&self, class_id: i64) -> String {
        self.class_names
            .as_ref()
            .and_then(|names| names.get(&class_id).cloned())
            .unwrap_or_else(|| class_id.to_string())
    }

    /// A new loader restricted to a deterministic seeded subset of records,
    /// reusing the source and all loader configuration unchanged.
    ///
    /// Fails with [`Error::UnsupportedSource`] for streaming sources.
    pub fn sample_view(&self, sample_size: usize, seed: u64) -> Result<Loader> {
        self.loader.subsampled(sample_size, seed)
    }

    /// The cached sub-view built from the constructor-configured
    /// `sample_size` and seed. Computed at most once.
    pub fn sample(&self) -> Result<&Loader> {
        if let Some(loader) = self.sample_loader.get() {
            return Ok(loader);
        }
        let loader = self.sample_view(self.sample_size, self.random_seed)?;
        Ok(self.sample_loader.get_or_init(|| loader))
    }

    /// Canonical labels of the cached sub-view, collected once.
    pub fn sample_labels(&self) -> Result<&[Label]> {
        if let Some(labels) = self.sample_labels.get() {
            return Ok(labels);
        }
        let mut labels = Vec::new();
        for batch in self.sample()?.iter_batches() {
            labels.extend(self.format_labels(&batch)?);
        }
        Ok(self.sample_labels.get_or_init(|| labels))
    }

    /// Verify that `self` and `other` (train vs. test) are structurally
    /// compatible: same label presence, same task type, compatible label
    /// shapes.
    ///
    /// For detection only the per-box feature width must match — box
    /// counts may differ between samples. Segmentation comparison is a
    /// known gap and fails loudly.
    pub fn validate_shared_structure(&self, other: &VisionData) -> Result<()> {
        if self.has_labels() != other.has_labels() {
            return Err(Error::IncompatibleDatasets(
                "datasets must either both have labels or both have none".into(),
            ));
        }
        if self.task_type != other.task_type {
            return Err(Error::IncompatibleDatasets(format!(
                "datasets must share a task type: {} vs {}",
                self.task_type, other.task_type
            )));
        }
        if !self.has_labels() {
            return Ok(());
        }
        match self.task_type {
            TaskType::ObjectDetection => {
                // Box counts vary per sample; compare per-box width only.
                let shape = self.label_shape()?;
                let other_shape = other.label_shape()?;
                if shape.get(1..) != other_shape.get(1..) {
                    return Err(Error::IncompatibleDatasets(
                        "datasets must share the same per-box label width".into(),
                    ));
                }
            }
            TaskType::SemanticSegmentation => {
                return Err(Error::NotImplemented(
                    "structural validation for semantic segmentation".into(),
                ));
            }
            _ => {
                if self.label_shape()? != other.label_shape()? {
                    return Err(Error::IncompatibleDatasets(
                        "datasets must share the same label shape".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Create an independent VisionData over a shallow copy of the record
    /// container, sharing the formatter. Caches start empty.
    pub fn copy(&self) -> VisionData {
        let source = Arc::from(self.loader.source().clone_container());
        let loader = match self.loader.order() {
            Some(order) => {
                Loader::with_order(source, self.loader.config().clone(), order.clone())
            }
            None => Loader::new(source, self.loader.config().clone()),
        };
        let mut copy = VisionData::new(loader, self.formatter.clone())
            .with_transform_field(self.transform_field.clone())
            .with_sample_size(self.sample_size)
            .with_seed(self.random_seed);
        copy.declared_num_classes = self.declared_num_classes;
        copy.class_names = self.class_names.clone();
        copy
    }

    /// Prepend a transform to the source's pipeline under the configured
    /// transform field.
    ///
    /// Fails with [`Error::MissingTransformField`] when the source exposes
    /// no pipeline under that name.
    pub fn add_augmentation(&self, transform: Arc<dyn Transform>) -> Result<()> {
        self.add_augmentation_in_field(&self.transform_field, transform)
    }

    /// Like [`add_augmentation`], but targeting an explicitly named field.
    ///
    /// [`add_augmentation`]: VisionData::add_augmentation
    pub fn add_augmentation_in_field(
        &self,
        field: &str,
        transform: Arc<dyn Transform>,
    ) -> Result<()> {
        let slot = self
            .loader
            .source()
            .transforms(field)
            .ok_or_else(|| Error::MissingTransformField {
                field: field.to_string(),
            })?;
        slot.prepend(transform);
        Ok(())
    }
}

fn validate_first_batch(
    loader: &Loader,
    formatter: &LabelFormatter,
) -> std::result::Result<(), String> {
    if matches!(formatter, LabelFormatter::Unknown) {
        return Err("no label formatter configured".into());
    }
    let batch = match loader.iter_batches().next() {
        Some(b) => b,
        None => return Err("data source produced no batches".into()),
    };
    let labels = match &batch.labels {
        Some(ls) => ls,
        None => return Err("data source batches do not contain labels".into()),
    };
    formatter.validate_batch(labels)
}

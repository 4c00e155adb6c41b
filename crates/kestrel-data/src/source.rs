// Record sources — the uniform batch/label/image contract
//
// A `RecordSource` is the indexed (or streaming) collection a `Loader`
// pulls records from. Checks never touch sources directly; they consume
// `Batch`es through `VisionData`.

use std::sync::{Arc, Mutex};

use kestrel_core::RawLabel;

use crate::transform::Transform;

/// A single image, stored as flattened pixels with its shape.
///
/// Shape is `[C, H, W]` (channel-first, row-major).
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub pixels: Vec<f64>,
    pub shape: Vec<usize>,
}

/// One record: an image plus an optional raw label.
#[derive(Debug, Clone)]
pub struct Record {
    pub image: Image,
    pub label: Option<RawLabel>,
}

/// A batch of records, split into images and labels.
///
/// `labels` is `Some` only when every record in the batch carried a label.
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Vec<Image>,
    pub labels: Option<Vec<RawLabel>>,
}

impl Batch {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Assemble a batch from records.
    pub fn from_records(records: Vec<Record>) -> Self {
        let all_labeled = records.iter().all(|r| r.label.is_some());
        let mut images = Vec::with_capacity(records.len());
        let mut labels = if all_labeled {
            Some(Vec::with_capacity(records.len()))
        } else {
            None
        };
        for r in records {
            images.push(r.image);
            if let (Some(ls), Some(l)) = (labels.as_mut(), r.label) {
                ls.push(l);
            }
        }
        Batch { images, labels }
    }
}

// Transform slots

/// A named, mutable transform pipeline attached to a source.
///
/// Augmentation checks prepend transforms here; the source applies the
/// pipeline to each image at access time. Interior mutability lets
/// `VisionData::add_augmentation` modify a pipeline behind a shared source.
pub struct TransformSlot {
    inner: Mutex<Vec<Arc<dyn Transform>>>,
}

impl TransformSlot {
    pub fn new(transforms: Vec<Arc<dyn Transform>>) -> Self {
        Self {
            inner: Mutex::new(transforms),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Insert a transform at the start of the pipeline.
    pub fn prepend(&self, t: Arc<dyn Transform>) {
        self.inner.lock().expect("transform slot poisoned").insert(0, t);
    }

    /// Apply the whole pipeline to an image.
    pub fn apply(&self, mut image: Image) -> Image {
        let transforms = self.inner.lock().expect("transform slot poisoned");
        for t in transforms.iter() {
            image = t.apply(image);
        }
        image
    }

    /// Number of transforms currently in the pipeline.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("transform slot poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone the current pipeline contents (used by `clone_container`).
    pub fn snapshot(&self) -> Vec<Arc<dyn Transform>> {
        self.inner.lock().expect("transform slot poisoned").clone()
    }
}

// RecordSource trait

/// An indexed or streaming collection of records.
///
/// Implementations must be `Send + Sync` so a `Loader` can fetch from
/// multiple threads when workers are enabled.
pub trait RecordSource: Send + Sync {
    /// Total number of records, or `None` for a streaming (non-indexable)
    /// source. Sampling requires a known length.
    fn len(&self) -> Option<usize>;

    /// Whether the source is known to be empty.
    fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Retrieve the record at `index`.
    ///
    /// # Panics
    /// May panic if `index` is out of range or the source is streaming.
    fn get(&self, index: usize) -> Record;

    /// The transform pipeline registered under `field`, if any.
    fn transforms(&self, _field: &str) -> Option<&TransformSlot> {
        None
    }

    /// Shallow-copy the record container (not any stream state), so the
    /// copy can be mutated (e.g. augmented) without affecting the original.
    fn clone_container(&self) -> Box<dyn RecordSource>;

    /// Iterate all records in order. The default covers indexable sources;
    /// streaming sources must override.
    fn stream(&self) -> Box<dyn Iterator<Item = Record> + '_> {
        let n = self.len().unwrap_or(0);
        Box::new((0..n).map(move |i| self.get(i)))
    }
}

// VecSource — in-memory record container

/// A simple in-memory source backed by a `Vec<Record>`, with a single
/// transform pipeline under a configurable field name (default
/// `"transforms"`).
pub struct VecSource {
    records: Vec<Record>,
    transform_field: String,
    slot: TransformSlot,
}

impl VecSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            transform_field: "transforms".into(),
            slot: TransformSlot::empty(),
        }
    }

    /// Rename the transform pipeline field.
    pub fn with_transform_field(mut self, field: impl Into<String>) -> Self {
        self.transform_field = field.into();
        self
    }

    /// Seed the pipeline with transforms.
    pub fn with_transforms(self, transforms: Vec<Arc<dyn Transform>>) -> Self {
        Self {
            slot: TransformSlot::new(transforms),
            ..self
        }
    }
}

impl RecordSource for VecSource {
    fn len(&self) -> Option<usize> {
        Some(self.records.len())
    }

    fn get(&self, index: usize) -> Record {
        let record = self.records[index].clone();
        Record {
            image: self.slot.apply(record.image),
            label: record.label,
        }
    }

    fn transforms(&self, field: &str) -> Option<&TransformSlot> {
        (field == self.transform_field).then_some(&self.slot)
    }

    fn clone_container(&self) -> Box<dyn RecordSource> {
        Box::new(VecSource {
            records: self.records.clone(),
            transform_field: self.transform_field.clone(),
            slot: TransformSlot::new(self.slot.snapshot()),
        })
    }
}

// StreamSource — unbounded / non-indexable source

/// A streaming source with no known length.
///
/// Full scans still work through `stream()`, but index-based operations —
/// in particular deterministic sub-sampling — are unsupported.
pub struct StreamSource {
    records: Vec<Record>,
}

impl StreamSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl RecordSource for StreamSource {
    fn len(&self) -> Option<usize> {
        None
    }

    fn get(&self, _index: usize) -> Record {
        panic!("StreamSource is not indexable")
    }

    fn clone_container(&self) -> Box<dyn RecordSource> {
        Box::new(StreamSource {
            records: self.records.clone(),
        })
    }

    fn stream(&self) -> Box<dyn Iterator<Item = Record> + '_> {
        Box::new(self.records.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_core::RawLabel;

    fn record(v: f64, class: f64) -> Record {
        Record {
            image: Image {
                pixels: vec![v; 4],
                shape: vec![1, 2, 2],
            },
            label: Some(RawLabel::Scalar(class)),
        }
    }

    #[test]
    fn batch_from_records_keeps_labels() {
        let batch = Batch::from_records(vec![record(0.0, 1.0), record(1.0, 2.0)]);
        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch.labels.as_deref(),
            Some(&[RawLabel::Scalar(1.0), RawLabel::Scalar(2.0)][..])
        );
    }

    #[test]
    fn batch_drops_labels_when_any_missing() {
        let mut unlabeled = record(0.0, 0.0);
        unlabeled.label = None;
        let batch = Batch::from_records(vec![record(0.0, 1.0), unlabeled]);
        assert!(batch.labels.is_none());
    }

    #[test]
    fn vec_source_transform_field() {
        let src = VecSource::new(vec![record(1.0, 0.0)]).with_transform_field("augmentations");
        assert!(src.transforms("transforms").is_none());
        assert!(src.transforms("augmentations").is_some());
    }

    #[test]
    fn clone_container_is_independent() {
        use crate::transform::Normalize;
        let src = VecSource::new(vec![record(10.0, 0.0)]);
        let copy = src.clone_container();
        copy.transforms("transforms")
            .unwrap()
            .prepend(Arc::new(Normalize::new(10.0)));
        // Copy is normalized, original untouched.
        assert_eq!(copy.get(0).image.pixels[0], 1.0);
        assert_eq!(src.get(0).image.pixels[0], 10.0);
    }

    #[test]
    fn stream_source_has_no_len() {
        let src = StreamSource::new(vec![record(0.0, 0.0), record(1.0, 1.0)]);
        assert_eq!(src.len(), None);
        assert_eq!(src.stream().count(), 2);
    }
}

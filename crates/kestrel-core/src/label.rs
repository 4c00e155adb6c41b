// Labels — raw label representations and per-task canonical forms
//
// A data source hands back labels in whatever shape it stores them
// (`RawLabel`). A `LabelFormatter` converts a batch of raw labels into the
// canonical per-task form (`Label`) and validates that the raw labels are
// well-formed for the declared task type.
//
// Accepted raw formats are:
//   * Classification: one scalar (or single-element vector) per sample,
//     holding the integer class index.
//   * Object detection: one matrix per sample of shape (B, W), where B is
//     the number of bounding boxes and W >= 5. Each row is
//     (class_id, x, y, w, h, ...): x and y are the coordinates of the upper
//     left corner, w and h the width and height, all in pixels.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::task::TaskType;

/// A label exactly as produced by the underlying data source.
#[derive(Debug, Clone, PartialEq)]
pub enum RawLabel {
    /// A single value, e.g. a class index.
    Scalar(f64),
    /// A flat vector, e.g. a one-element class index or a mask row.
    Vector(Vec<f64>),
    /// A row-major matrix, e.g. per-box detection rows.
    Matrix {
        data: Vec<f64>,
        rows: usize,
        cols: usize,
    },
}

/// A single bounding box in detection labels.
///
/// Coordinates are in pixels; (x, y) is the upper-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub class_id: i64,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// The canonical per-task label for one sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    /// Classification: a single class id.
    Class(i64),
    /// Object detection: the sample's bounding boxes plus the per-box
    /// feature width observed in the raw data (>= 5).
    Boxes {
        boxes: Vec<BoundingBox>,
        box_width: usize,
    },
}

impl Label {
    /// Canonical shape of this label, excluding the batch dimension.
    ///
    /// Classification labels are scalars (empty shape); detection labels
    /// have shape `[num_boxes, box_width]`.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            Label::Class(_) => vec![],
            Label::Boxes { boxes, box_width } => vec![boxes.len(), *box_width],
        }
    }
}

// Formatters

/// Converts raw classification labels (scalar class indices) to [`Label::Class`].
#[derive(Debug, Clone, Default)]
pub struct ClassificationFormat;

/// Converts raw detection labels (per-box matrices) to [`Label::Boxes`].
#[derive(Debug, Clone)]
pub struct DetectionFormat {
    /// Minimum per-box feature width accepted. The first five columns are
    /// always (class_id, x, y, w, h).
    pub min_box_width: usize,
}

impl Default for DetectionFormat {
    fn default() -> Self {
        Self { min_box_width: 5 }
    }
}

/// The label formatter for a dataset, tagged by task type.
///
/// Dispatch is by structural matching on the variant. `Unknown` means no
/// formatter was configured; label-dependent operations fail with
/// [`Error::InvalidLabel`].
#[derive(Debug, Clone)]
pub enum LabelFormatter {
    Classification(ClassificationFormat),
    Detection(DetectionFormat),
    Unknown,
}

impl LabelFormatter {
    /// Shorthand for the default classification formatter.
    pub fn classification() -> Self {
        LabelFormatter::Classification(ClassificationFormat)
    }

    /// Shorthand for the default detection formatter.
    pub fn detection() -> Self {
        LabelFormatter::Detection(DetectionFormat::default())
    }

    /// The task type this formatter implies.
    pub fn task_type(&self) -> TaskType {
        match self {
            LabelFormatter::Classification(_) => TaskType::Classification,
            LabelFormatter::Detection(_) => TaskType::ObjectDetection,
            LabelFormatter::Unknown => TaskType::Unknown,
        }
    }

    /// Convert one raw label to its canonical form.
    pub fn format(&self, raw: &RawLabel) -> Result<Label> {
        match self {
            LabelFormatter::Classification(_) => format_classification(raw),
            LabelFormatter::Detection(fmt) => format_detection(raw, fmt.min_box_width),
            LabelFormatter::Unknown => Err(Error::InvalidLabel(
                "no label formatter configured".into(),
            )),
        }
    }

    /// Convert a whole batch of raw labels.
    pub fn format_batch(&self, raw: &[RawLabel]) -> Result<Vec<Label>> {
        raw.iter().map(|r| self.format(r)).collect()
    }

    /// Check that every label in a batch is well-formed for this task.
    ///
    /// Returns the failure reason as a message rather than an error so the
    /// caller can store it as a validity marker and raise it lazily.
    pub fn validate_batch(&self, raw: &[RawLabel]) -> std::result::Result<(), String> {
        for (i, r) in raw.iter().enumerate() {
            if let Err(e) = self.format(r) {
                return Err(format!("label {i} is invalid for {}: {e}", self.task_type()));
            }
        }
        Ok(())
    }

    /// Accumulate per-class sample counts from a batch of canonical labels.
    ///
    /// Classification counts one per sample; detection counts every box.
    pub fn count_classes_into(&self, labels: &[Label], counts: &mut BTreeMap<i64, u64>) {
        for label in labels {
            match label {
                Label::Class(c) => *counts.entry(*c).or_insert(0) += 1,
                Label::Boxes { boxes, .. } => {
                    for b in boxes {
                        *counts.entry(b.class_id).or_insert(0) += 1;
                    }
                }
            }
        }
    }
}

fn format_classification(raw: &RawLabel) -> Result<Label> {
    let value = match raw {
        RawLabel::Scalar(v) => *v,
        RawLabel::Vector(v) if v.len() == 1 => v[0],
        RawLabel::Vector(v) => {
            return Err(Error::InvalidLabel(format!(
                "classification label must be a single class index, got a vector of length {}",
                v.len()
            )))
        }
        RawLabel::Matrix { rows, cols, .. } => {
            return Err(Error::InvalidLabel(format!(
                "classification label must be a single class index, got a {rows}x{cols} matrix"
            )))
        }
    };
    if !value.is_finite() || value.fract() != 0.0 || value < 0.0 {
        return Err(Error::InvalidLabel(format!(
            "class index must be a non-negative integer, got {value}"
        )));
    }
    Ok(Label::Class(value as i64))
}

fn format_detection(raw: &RawLabel, min_box_width: usize) -> Result<Label> {
    let (data, rows, cols) = match raw {
        RawLabel::Matrix { data, rows, cols } => (data, *rows, *cols),
        RawLabel::Scalar(_) | RawLabel::Vector(_) => {
            return Err(Error::InvalidLabel(
                "detection label must be a (num_boxes, box_width) matrix".into(),
            ))
        }
    };
    if cols < min_box_width {
        return Err(Error::InvalidLabel(format!(
            "detection boxes need at least {min_box_width} values \
             (class_id, x, y, w, h), got width {cols}"
        )));
    }
    let mut boxes = Vec::with_capacity(rows);
    for r in 0..rows {
        let row = &data[r * cols..(r + 1) * cols];
        let class_id = row[0];
        if !class_id.is_finite() || class_id.fract() != 0.0 || class_id < 0.0 {
            return Err(Error::InvalidLabel(format!(
                "box {r}: class id must be a non-negative integer, got {class_id}"
            )));
        }
        boxes.push(BoundingBox {
            class_id: class_id as i64,
            x: row[1],
            y: row[2],
            w: row[3],
            h: row[4],
        });
    }
    Ok(Label::Boxes {
        boxes,
        box_width: cols,
    })
}

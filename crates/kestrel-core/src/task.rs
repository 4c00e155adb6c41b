// Task types — how labels are structured and interpreted

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Supported vision task types.
///
/// The task type declares how labels are structured: a single class id per
/// sample for classification, a set of bounding boxes per sample for object
/// detection, a per-pixel mask for semantic segmentation. `Unknown` means no
/// label formatter was configured; only structural checks can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Classification,
    ObjectDetection,
    SemanticSegmentation,
    Unknown,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskType::Classification => "classification",
            TaskType::ObjectDetection => "object_detection",
            TaskType::SemanticSegmentation => "semantic_segmentation",
            TaskType::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TaskType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "classification" => Ok(TaskType::Classification),
            "object_detection" => Ok(TaskType::ObjectDetection),
            "semantic_segmentation" => Ok(TaskType::SemanticSegmentation),
            "unknown" => Ok(TaskType::Unknown),
            other => Err(Error::Configuration(format!(
                "unknown task type: {other:?}"
            ))),
        }
    }
}

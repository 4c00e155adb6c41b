//! # kestrel-core
//!
//! Core types for the Kestrel vision model-validation toolkit.
//!
//! This crate provides:
//! - [`Error`] / [`Result`] — the single error taxonomy used workspace-wide
//! - [`TaskType`] — how a dataset's labels are structured and interpreted
//! - [`RawLabel`] / [`Label`] — source-native and canonical label forms
//! - [`LabelFormatter`] — per-task conversion and validation of labels

pub mod error;
pub mod label;
pub mod task;

pub use error::{Error, Result};
pub use label::{BoundingBox, ClassificationFormat, DetectionFormat, Label, LabelFormatter, RawLabel};
pub use task::TaskType;

use crate::task::TaskType;

/// All errors that can occur within Kestrel.
///
/// This enum captures every failure mode of the validation toolkit:
/// bad check configuration, unsupported task types, malformed labels,
/// structurally incompatible datasets, and non-indexable sources.
/// Using a single error type across the workspace simplifies propagation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A check was constructed with invalid parameters.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Unknown simple-model strategy name.
    #[error("unknown strategy: {got:?}, expected one of {allowed:?}")]
    InvalidStrategy {
        got: String,
        allowed: &'static [&'static str],
    },

    /// The dataset's task type is not supported by the running check.
    #[error("unsupported task type: check requires {expected}, dataset is {got}")]
    UnsupportedTaskType { expected: TaskType, got: TaskType },

    /// Label is missing, malformed, or could not be validated.
    #[error("invalid label: {0}")]
    InvalidLabel(String),

    /// Train/test structural validation failed.
    #[error("incompatible datasets: {0}")]
    IncompatibleDatasets(String),

    /// Sampling requested on a streaming (non-indexable) source.
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    /// The record source has no transform pipeline under the configured field.
    #[error(
        "record source does not expose a transform pipeline named {field:?}. \
         If your pipeline is named otherwise, set it with `transform_field`"
    )]
    MissingTransformField { field: String },

    /// A known gap: the operation is deliberately unimplemented.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }
}

/// Convenience Result type used throughout Kestrel.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}

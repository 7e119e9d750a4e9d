use std::path::PathBuf;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while loading, merging and preparing EMI data.
#[derive(Debug, Error)]
pub enum EmiError {
    /// The input path is missing or cannot be opened for reading.
    #[error("cannot open '{}': {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    /// The container does not have the group → dataset shape we expect.
    #[error("malformed store: {0}")]
    Format(String),

    /// The file extension names no store backend this build can read.
    #[error("unsupported store format: {0}")]
    UnsupportedFormat(String),

    /// Nothing was left to concatenate after reading.
    #[error("no data to merge: {matched} of {inspected} groups matched {}", describe_required(required))]
    EmptyResult {
        inspected: usize,
        matched: usize,
        required: Vec<String>,
    },

    /// A requested dataset (or the label vector) is absent from the merged data.
    #[error("dataset '{0}' is not present in the merged data")]
    MissingKey(String),

    /// A merged dataset no longer lines up row-for-row with the labels.
    #[error("dataset '{dataset}' is not aligned with the labels in group '{group}': {detail}")]
    Alignment {
        dataset: String,
        group: String,
        detail: String,
    },

    /// Arrays that must stack or concatenate disagree in shape.
    #[error("shape mismatch for '{name}': {detail}")]
    ShapeMismatch { name: String, detail: String },

    /// A caller-supplied parameter is out of range or inconsistent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

fn describe_required(required: &[String]) -> String {
    if required.is_empty() {
        "(any dataset)".to_string()
    } else {
        format!("[{}]", required.join(", "))
    }
}

pub type Result<T> = std::result::Result<T, EmiError>;

impl EmiError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        EmiError::Format(msg.into())
    }

    pub(crate) fn shape(name: &str, detail: impl Into<String>) -> Self {
        EmiError::ShapeMismatch {
            name: name.to_string(),
            detail: detail.into(),
        }
    }
}

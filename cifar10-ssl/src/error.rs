use std::path::PathBuf;

use dl_utils::LabelError;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    Shape { expected: usize, actual: usize },

    #[error("class {class} has no training examples")]
    MissingClass { class: usize },

    #[error("class {class} has {available} training examples, {requested} requested as labeled")]
    InsufficientClass {
        class: usize,
        available: usize,
        requested: usize,
    },

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error("malformed record batch `{}`: {reason}", path.display())]
    MalformedBatch { path: PathBuf, reason: String },

    #[error("no `{pattern}` files found in `{}`", dir.display())]
    NoTrainingBatches { dir: PathBuf, pattern: String },

    #[error("test batch `{}` does not exist", .0.display())]
    MissingTestBatch(PathBuf),

    #[error("reading `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unpickling `{}`", path.display())]
    Pickle {
        path: PathBuf,
        #[source]
        source: serde_pickle::Error,
    },
}

impl DataError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedBatch {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

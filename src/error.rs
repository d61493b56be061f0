use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while merging a recording pair.
///
/// Every variant is terminal for the current invocation; the binary translates
/// them into a message plus exit code 1, library callers get the typed value.
#[derive(Debug, Error)]
pub enum MergeError {
    /// A recording identifier is not exactly four ASCII digits.
    #[error("invalid recording identifier '{0}': expected exactly four digits")]
    InvalidIdentifier(String),

    /// A required input video or log file does not exist.
    #[error("missing input file: {}", .0.display())]
    MissingInput(PathBuf),

    /// The external stream-copy tool exited non-zero.
    #[error("{tool} exited with {status}")]
    ExternalTool { tool: String, status: std::process::ExitStatus },

    /// A TRF file contained no usable transform records.
    #[error("no usable transform data in {}", .0.display())]
    NoTransformData(PathBuf),

    /// Filesystem failure during copy/append or manifest handling.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MergeError>;

//! Error types for soundfeat-core.

use crate::format::{MAX_SAMPLING_RATE, MIN_SAMPLING_RATE};
use thiserror::Error;

/// Error type for soundfeat-core operations.
///
/// Every variant except `Io` is raised while a pipeline is being assembled;
/// once data flows, the only failures left are source shape checks and
/// format mismatches at the format-erased execution boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error(
        "Invalid sampling rate: {0}. Must be between {min} and {max} Hz",
        min = MIN_SAMPLING_RATE,
        max = MAX_SAMPLING_RATE
    )]
    InvalidSamplingRate(u32),

    #[error("Sampling rate of format '{0}' was read before it was set")]
    SamplingRateNotSet(String),

    #[error("Format mismatch: expected '{expected}', found '{found}'")]
    FormatMismatch { expected: String, found: String },

    #[error("Invalid format '{format}': {reason}")]
    InvalidFormat { format: String, reason: String },

    #[error("Buffers are already initialized")]
    AlreadyInitialized,

    #[error("Transform '{0}' executed before initialize")]
    NotInitialized(&'static str),

    #[error("Buffers[{index}] is invalid ({value}). Format is {format}")]
    InvalidBuffer {
        format: String,
        index: usize,
        value: String,
    },

    #[error("Buffer count mismatch: {expected} expected, {found} found")]
    BufferCountMismatch { expected: usize, found: usize },

    #[error("Unknown transform: {0}")]
    UnknownTransform(String),

    #[error("Unknown parameter '{parameter}' of transform '{transform}'")]
    UnknownParameter {
        transform: String,
        parameter: String,
    },

    #[error("Invalid value '{value}' of parameter '{parameter}' of transform '{transform}': {reason}")]
    InvalidParameter {
        transform: String,
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Unknown stage: {0}")]
    UnknownStage(usize),

    #[error("Duplicate feature: {0}")]
    DuplicateFeature(String),

    #[error("Allocation exhausted: layout needs {required} bytes, limit is {limit}")]
    AllocationExhausted { required: usize, limit: usize },

    #[error("Placement strategy '{0}' produced an invalid buffer layout")]
    InvalidLayout(&'static str),

    #[error("Malformed lifetime tree: {0}")]
    MalformedTree(&'static str),

    #[error("Unknown tree node: {0}")]
    UnknownNode(usize),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Self::FormatMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

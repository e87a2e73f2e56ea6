use thiserror::Error;

/// Failures raised by the windowing core.
///
/// Bounds errors, missing-label errors and construction errors are separate
/// variants so callers can tell "not configured" apart from "out of range".
#[derive(Debug, Error)]
pub enum WindowError {
    #[error("window index {index} out of bounds ({total} usable windows)")]
    IndexOutOfBounds { index: usize, total: usize },
    #[error("batch index {batch} out of bounds ({batches} full batches)")]
    BatchOutOfBounds { batch: usize, batches: usize },
    #[error("chunk index {chunk} out of bounds ({chunks} chunks)")]
    ChunkOutOfBounds { chunk: usize, chunks: usize },
    #[error("window offset {offset} out of bounds for chunk {chunk} ({usable} usable windows)")]
    WindowOutOfBounds {
        chunk: usize,
        offset: usize,
        usable: usize,
    },
    #[error("generator has no labels")]
    NoLabels,
    #[error("{what}: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("chunk {chunk} has {len} samples, shorter than window size {window_size}")]
    ChunkTooShort {
        chunk: usize,
        len: usize,
        window_size: usize,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("at least one signal collection is required")]
    EmptyGroup,
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl WindowError {
    /// True for every out-of-range variant.
    pub fn is_bounds(&self) -> bool {
        matches!(
            self,
            WindowError::IndexOutOfBounds { .. }
                | WindowError::BatchOutOfBounds { .. }
                | WindowError::ChunkOutOfBounds { .. }
                | WindowError::WindowOutOfBounds { .. }
        )
    }
}

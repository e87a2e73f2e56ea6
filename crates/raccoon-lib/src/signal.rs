use serde::{Deserialize, Serialize};

/// Basic typed time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Uniform sampling frequency in Hz
    pub fs: f64,
    /// Samples
    pub data: Vec<f64>,
}

impl TimeSeries {
    pub fn new(fs: f64, data: Vec<f64>) -> Self {
        Self { fs, data }
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.data.len() as f64 / self.fs
    }
}

/// Point events on a timeline (e.g., annotated or detected QRS locations)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
}

/// A named single-lead recording as consumed by detectors and the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub name: String,
    pub signal: TimeSeries,
}

impl Record {
    pub fn new(name: impl Into<String>, signal: TimeSeries) -> Self {
        Self {
            name: name.into(),
            signal,
        }
    }
}

/// First difference; one sample shorter than the input.
pub fn diff(data: &[f64]) -> Vec<f64> {
    data.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Mean over consecutive non-overlapping windows of `window_size` samples.
///
/// A trailing remainder shorter than `window_size` is discarded, so the result
/// has `data.len() / window_size` samples.
pub fn window_average(data: &[f64], window_size: usize) -> Vec<f64> {
    if window_size == 0 {
        return Vec::new();
    }
    data.chunks_exact(window_size)
        .map(|chunk| chunk.iter().sum::<f64>() / window_size as f64)
        .collect()
}

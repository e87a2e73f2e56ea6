use crate::trigger::points_to_signal;

use super::index::{IndexPair, WindowLayout};
use super::WindowError;

/// Derives one label per window from sparse trigger points.
///
/// The dense trigger signal of every chunk is synthesized once at
/// construction; a window's label is the value at its centre sample.
#[derive(Debug, Clone)]
pub struct LabelGenerator {
    trigger_signals: Vec<Vec<f64>>,
    batch_size: usize,
    layout: WindowLayout,
}

impl LabelGenerator {
    pub fn new(
        trigger_chunks: &[Vec<usize>],
        chunk_sizes: Vec<usize>,
        batch_size: usize,
        window_size: usize,
        detection_size: usize,
    ) -> Result<Self, WindowError> {
        if batch_size == 0 {
            return Err(WindowError::Zero("batch size"));
        }
        if window_size == 0 {
            return Err(WindowError::Zero("window size"));
        }
        if trigger_chunks.len() != chunk_sizes.len() {
            return Err(WindowError::LengthMismatch {
                what: "trigger chunks per signal chunk",
                expected: chunk_sizes.len(),
                actual: trigger_chunks.len(),
            });
        }
        let trigger_signals = trigger_chunks
            .iter()
            .zip(&chunk_sizes)
            .map(|(points, &length)| points_to_signal(points, length, detection_size))
            .collect();
        Ok(Self {
            trigger_signals,
            batch_size,
            layout: WindowLayout::new(window_size, chunk_sizes),
        })
    }

    pub fn window_size(&self) -> usize {
        self.layout.window_size()
    }

    pub fn trigger_signals(&self) -> &[Vec<f64>] {
        &self.trigger_signals
    }

    /// Number of full batches.
    pub fn len(&self) -> usize {
        self.layout.batch_count(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index_pair(&self, window_index: usize) -> Result<IndexPair, WindowError> {
        self.layout.index_pair(window_index)
    }

    pub fn index_pairs_for_batch(&self, batch_index: usize) -> Result<Vec<IndexPair>, WindowError> {
        self.layout.index_pairs_for_batch(batch_index, self.batch_size)
    }

    pub fn label(&self, chunk_index: usize, offset: usize) -> Result<f64, WindowError> {
        self.layout.check(chunk_index, offset)?;
        Ok(self.trigger_signals[chunk_index][offset + self.window_size() / 2])
    }

    pub fn labels(&self, index_pairs: &[IndexPair]) -> Result<Vec<f64>, WindowError> {
        index_pairs
            .iter()
            .map(|&(chunk_index, offset)| self.label(chunk_index, offset))
            .collect()
    }

    /// Labels of batch `batch_index`; errors past the last full batch.
    pub fn get(&self, batch_index: usize) -> Result<Vec<f64>, WindowError> {
        let batches = self.len();
        if batch_index >= batches {
            return Err(WindowError::BatchOutOfBounds {
                batch: batch_index,
                batches,
            });
        }
        self.labels(&self.index_pairs_for_batch(batch_index)?)
    }
}

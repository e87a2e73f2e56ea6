use ndarray::{Array2, ArrayD, Axis};

use super::index::{IndexPair, WindowLayout};
use super::WindowError;

/// Slices fixed-length windows out of a chunk collection.
#[derive(Debug, Clone)]
pub struct WindowGenerator {
    chunks: Vec<Vec<f64>>,
    batch_size: usize,
    wrap_samples: bool,
    layout: WindowLayout,
}

impl WindowGenerator {
    /// Build a generator over `chunks`.
    ///
    /// Every chunk must hold at least one window. With `wrap_samples` the
    /// array views gain a trailing singleton axis: `(batch, window, 1)`.
    pub fn new(
        chunks: Vec<Vec<f64>>,
        batch_size: usize,
        window_size: usize,
        wrap_samples: bool,
    ) -> Result<Self, WindowError> {
        if batch_size == 0 {
            return Err(WindowError::Zero("batch size"));
        }
        if window_size == 0 {
            return Err(WindowError::Zero("window size"));
        }
        if let Some((chunk, len)) = chunks
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|&(_, len)| len < window_size)
        {
            return Err(WindowError::ChunkTooShort {
                chunk,
                len,
                window_size,
            });
        }
        let layout = WindowLayout::new(window_size, chunks.iter().map(Vec::len).collect());
        Ok(Self {
            chunks,
            batch_size,
            wrap_samples,
            layout,
        })
    }

    pub fn window_size(&self) -> usize {
        self.layout.window_size()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn wrap_samples(&self) -> bool {
        self.wrap_samples
    }

    pub fn chunks(&self) -> &[Vec<f64>] {
        &self.chunks
    }

    pub fn chunk_sizes(&self) -> &[usize] {
        self.layout.chunk_sizes()
    }

    pub fn layout(&self) -> &WindowLayout {
        &self.layout
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

    /// Last valid offset of `chunk_index` when `offset` runs past it.
    pub fn clamp(&self, (chunk_index, offset): IndexPair) -> Result<IndexPair, WindowError> {
        let usable = self.layout.usable(chunk_index)?;
        Ok((chunk_index, offset.min(usable.saturating_sub(1))))
    }

    pub fn window(&self, chunk_index: usize, offset: usize) -> Result<&[f64], WindowError> {
        self.layout.check(chunk_index, offset)?;
        let chunk = &self.chunks[chunk_index];
        Ok(&chunk[offset..offset + self.window_size()])
    }

    pub fn windows(&self, index_pairs: &[IndexPair]) -> Result<Vec<&[f64]>, WindowError> {
        index_pairs
            .iter()
            .map(|&(chunk_index, offset)| self.window(chunk_index, offset))
            .collect()
    }

    pub fn batch(&self, batch_index: usize) -> Result<Vec<&[f64]>, WindowError> {
        self.windows(&self.index_pairs_for_batch(batch_index)?)
    }

    /// Windows as one numeric array, wrapped if configured.
    pub fn windows_array(&self, index_pairs: &[IndexPair]) -> Result<ArrayD<f64>, WindowError> {
        let window_size = self.window_size();
        let mut flat = Vec::with_capacity(index_pairs.len() * window_size);
        for window in self.windows(index_pairs)? {
            flat.extend_from_slice(window);
        }
        let array = Array2::from_shape_vec((index_pairs.len(), window_size), flat)?;
        if self.wrap_samples {
            Ok(array.insert_axis(Axis(2)).into_dyn())
        } else {
            Ok(array.into_dyn())
        }
    }

    /// Batch `batch_index` as an array; errors past the last full batch.
    pub fn batch_array(&self, batch_index: usize) -> Result<ArrayD<f64>, WindowError> {
        let batches = self.len();
        if batch_index >= batches {
            return Err(WindowError::BatchOutOfBounds {
                batch: batch_index,
                batches,
            });
        }
        self.windows_array(&self.index_pairs_for_batch(batch_index)?)
    }

    pub fn get(&self, batch_index: usize) -> Result<ArrayD<f64>, WindowError> {
        self.batch_array(batch_index)
    }
}

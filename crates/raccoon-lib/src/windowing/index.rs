//! Flat window index <-> `(chunk, offset)` arithmetic.
//!
//! A chunk of `n` samples holds `n - window_size + 1` windows; the last one
//! starts at offset `n - window_size`. Chunks shorter than the window hold
//! none and are skipped by the free functions.

use std::ops::Range;

use super::WindowError;

/// `(chunk_index, offset)` coordinates of one window.
pub type IndexPair = (usize, usize);

/// Number of windows of `window_size` samples that fit into a chunk.
pub fn usable_windows(chunk_size: usize, window_size: usize) -> usize {
    chunk_size
        .checked_sub(window_size)
        .map(|last_offset| last_offset + 1)
        .unwrap_or(0)
}

/// Total number of windows across all chunks.
pub fn total_windows(window_size: usize, chunk_sizes: &[usize]) -> usize {
    chunk_sizes
        .iter()
        .map(|&size| usable_windows(size, window_size))
        .sum()
}

/// Map a flat window index to its `(chunk, offset)` pair.
pub fn index_pair(
    window_index: usize,
    window_size: usize,
    chunk_sizes: &[usize],
) -> Result<IndexPair, WindowError> {
    let mut remaining = window_index;
    for (chunk_index, &chunk_size) in chunk_sizes.iter().enumerate() {
        let usable = usable_windows(chunk_size, window_size);
        if remaining < usable {
            return Ok((chunk_index, remaining));
        }
        remaining -= usable;
    }
    Err(WindowError::IndexOutOfBounds {
        index: window_index,
        total: total_windows(window_size, chunk_sizes),
    })
}

/// Inverse of [`index_pair`].
pub fn flat_index(
    pair: IndexPair,
    window_size: usize,
    chunk_sizes: &[usize],
) -> Result<usize, WindowError> {
    let (chunk_index, offset) = pair;
    let chunk_size = *chunk_sizes
        .get(chunk_index)
        .ok_or(WindowError::ChunkOutOfBounds {
            chunk: chunk_index,
            chunks: chunk_sizes.len(),
        })?;
    let usable = usable_windows(chunk_size, window_size);
    if offset >= usable {
        return Err(WindowError::WindowOutOfBounds {
            chunk: chunk_index,
            offset,
            usable,
        });
    }
    Ok(total_windows(window_size, &chunk_sizes[..chunk_index]) + offset)
}

/// Flat indices covered by batch `batch_index`. Not bounds checked; the
/// bounds saturate at `usize::MAX`.
pub fn indexes_for_batch(batch_index: usize, batch_size: usize) -> Range<usize> {
    let start = batch_index.saturating_mul(batch_size);
    start..start.saturating_add(batch_size)
}

/// Exact batch range, or `BatchOutOfBounds` when it does not fit in `usize`.
fn checked_batch_range(
    batch_index: usize,
    batch_size: usize,
    total: usize,
) -> Result<Range<usize>, WindowError> {
    batch_index
        .checked_mul(batch_size)
        .and_then(|start| Some(start..start.checked_add(batch_size)?))
        .ok_or(WindowError::BatchOutOfBounds {
            batch: batch_index,
            batches: total.checked_div(batch_size).unwrap_or(0),
        })
}

pub fn index_pairs_for_batch(
    batch_index: usize,
    batch_size: usize,
    window_size: usize,
    chunk_sizes: &[usize],
) -> Result<Vec<IndexPair>, WindowError> {
    let total = total_windows(window_size, chunk_sizes);
    checked_batch_range(batch_index, batch_size, total)?
        .map(|window_index| index_pair(window_index, window_size, chunk_sizes))
        .collect()
}

/// Rescale offsets from one window size to another, keeping the chunk index.
///
/// Offsets are floored, so the mapping is only exact when the window sizes
/// divide evenly; otherwise neighbouring offsets may collapse onto the same
/// rescaled offset.
pub fn rescale(
    index_pairs: &[IndexPair],
    old_window_size: usize,
    new_window_size: usize,
) -> Vec<IndexPair> {
    index_pairs
        .iter()
        .map(|&(chunk_index, offset)| (chunk_index, offset * new_window_size / old_window_size))
        .collect()
}

/// Precomputed index space for one window size over one set of chunks.
///
/// Resolves flat indices by binary search over cumulative window counts and
/// agrees exactly with [`index_pair`].
#[derive(Debug, Clone)]
pub struct WindowLayout {
    window_size: usize,
    chunk_sizes: Vec<usize>,
    starts: Vec<usize>,
}

impl WindowLayout {
    pub fn new(window_size: usize, chunk_sizes: Vec<usize>) -> Self {
        let mut starts = Vec::with_capacity(chunk_sizes.len() + 1);
        let mut acc = 0;
        starts.push(acc);
        for &size in &chunk_sizes {
            acc += usable_windows(size, window_size);
            starts.push(acc);
        }
        Self {
            window_size,
            chunk_sizes,
            starts,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn chunk_sizes(&self) -> &[usize] {
        &self.chunk_sizes
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_sizes.len()
    }

    /// Total number of windows.
    pub fn total(&self) -> usize {
        self.starts.last().copied().unwrap_or(0)
    }

    /// Windows available in one chunk.
    pub fn usable(&self, chunk_index: usize) -> Result<usize, WindowError> {
        self.chunk_sizes
            .get(chunk_index)
            .map(|&size| usable_windows(size, self.window_size))
            .ok_or(WindowError::ChunkOutOfBounds {
                chunk: chunk_index,
                chunks: self.chunk_sizes.len(),
            })
    }

    /// Number of full batches; a trailing partial batch is not counted.
    pub fn batch_count(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            return 0;
        }
        self.total() / batch_size
    }

    pub fn index_pair(&self, window_index: usize) -> Result<IndexPair, WindowError> {
        let total = self.total();
        if window_index >= total {
            return Err(WindowError::IndexOutOfBounds {
                index: window_index,
                total,
            });
        }
        let chunk_index = self.starts.partition_point(|&start| start <= window_index) - 1;
        Ok((chunk_index, window_index - self.starts[chunk_index]))
    }

    pub fn flat_index(&self, pair: IndexPair) -> Result<usize, WindowError> {
        let (chunk_index, offset) = pair;
        let usable = self.usable(chunk_index)?;
        if offset >= usable {
            return Err(WindowError::WindowOutOfBounds {
                chunk: chunk_index,
                offset,
                usable,
            });
        }
        Ok(self.starts[chunk_index] + offset)
    }

    /// Validate a raw `(chunk, offset)` pair against this layout.
    pub fn check(&self, chunk_index: usize, offset: usize) -> Result<(), WindowError> {
        self.flat_index((chunk_index, offset)).map(|_| ())
    }

    pub fn index_pairs_for_batch(
        &self,
        batch_index: usize,
        batch_size: usize,
    ) -> Result<Vec<IndexPair>, WindowError> {
        checked_batch_range(batch_index, batch_size, self.total())?
            .map(|window_index| self.index_pair(window_index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNK_SIZES: [usize; 3] = [10, 12, 11];

    #[test]
    fn rescale_keeps_chunk_and_floors_offset() {
        assert_eq!(
            rescale(&[(1, 3), (5, 2), (7, 1)], 4, 2),
            vec![(1, 1), (5, 1), (7, 0)]
        );
    }

    #[test]
    fn rescale_with_same_window_size_is_identity() {
        let pairs = vec![(0, 0), (0, 6), (1, 8), (2, 7)];
        assert_eq!(rescale(&pairs, 4, 4), pairs);
    }

    #[test]
    fn index_pair_walks_chunks() {
        assert_eq!(index_pair(0, 4, &CHUNK_SIZES).unwrap(), (0, 0));
        assert_eq!(index_pair(1, 4, &CHUNK_SIZES).unwrap(), (0, 1));
        assert_eq!(index_pair(6, 4, &CHUNK_SIZES).unwrap(), (0, 6));
        assert_eq!(index_pair(7, 4, &CHUNK_SIZES).unwrap(), (1, 0));
        assert_eq!(index_pair(15, 4, &CHUNK_SIZES).unwrap(), (1, 8));
        assert_eq!(index_pair(16, 4, &CHUNK_SIZES).unwrap(), (2, 0));
        assert_eq!(index_pair(23, 4, &CHUNK_SIZES).unwrap(), (2, 7));
        match index_pair(24, 4, &CHUNK_SIZES) {
            Err(WindowError::IndexOutOfBounds { index, total }) => {
                assert_eq!(index, 24);
                assert_eq!(total, 24);
            }
            other => panic!("expected bounds error, got {:?}", other),
        }
    }

    #[test]
    fn indexes_for_batch_is_half_open() {
        assert_eq!(indexes_for_batch(1, 4).collect::<Vec<_>>(), vec![4, 5, 6, 7]);
        assert_eq!(indexes_for_batch(2, 4).collect::<Vec<_>>(), vec![8, 9, 10, 11]);
        assert_eq!(indexes_for_batch(2, 2).collect::<Vec<_>>(), vec![4, 5]);
    }

    #[test]
    fn index_pairs_for_batch_cross_chunks() {
        assert_eq!(
            index_pairs_for_batch(1, 4, 2, &CHUNK_SIZES).unwrap(),
            vec![(0, 4), (0, 5), (0, 6), (0, 7)]
        );
        assert_eq!(
            index_pairs_for_batch(2, 4, 2, &CHUNK_SIZES).unwrap(),
            vec![(0, 8), (1, 0), (1, 1), (1, 2)]
        );
        assert_eq!(
            index_pairs_for_batch(3, 2, 4, &CHUNK_SIZES).unwrap(),
            vec![(0, 6), (1, 0)]
        );
        assert!(index_pairs_for_batch(12, 2, 4, &CHUNK_SIZES).is_err());
    }

    #[test]
    fn huge_batch_index_is_a_bounds_error() {
        assert!(matches!(
            index_pairs_for_batch(usize::MAX, 2, 4, &CHUNK_SIZES),
            Err(WindowError::BatchOutOfBounds { batch: usize::MAX, batches: 12 })
        ));
        assert!(index_pairs_for_batch(usize::MAX / 2, 2, 4, &CHUNK_SIZES)
            .unwrap_err()
            .is_bounds());

        let layout = WindowLayout::new(4, CHUNK_SIZES.to_vec());
        assert!(layout
            .index_pairs_for_batch(usize::MAX, 2)
            .unwrap_err()
            .is_bounds());
        assert!(layout
            .index_pairs_for_batch(1, usize::MAX)
            .unwrap_err()
            .is_bounds());

        assert_eq!(indexes_for_batch(usize::MAX, 2), usize::MAX..usize::MAX);
    }

    #[test]
    fn flat_index_round_trips() {
        let total = total_windows(4, &CHUNK_SIZES);
        for i in 0..total {
            let pair = index_pair(i, 4, &CHUNK_SIZES).unwrap();
            assert_eq!(flat_index(pair, 4, &CHUNK_SIZES).unwrap(), i);
        }
    }

    #[test]
    fn batches_enumerate_indices_without_gaps() {
        let layout = WindowLayout::new(3, vec![7, 5, 9, 3]);
        let batch_size = 4;
        let mut seen = Vec::new();
        for b in 0..layout.batch_count(batch_size) {
            for pair in layout.index_pairs_for_batch(b, batch_size).unwrap() {
                seen.push(layout.flat_index(pair).unwrap());
            }
        }
        let expected: Vec<usize> = (0..layout.batch_count(batch_size) * batch_size).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn layout_agrees_with_free_functions() {
        let sizes = vec![4, 2, 9, 4, 0, 6];
        let layout = WindowLayout::new(4, sizes.clone());
        assert_eq!(layout.total(), total_windows(4, &sizes));
        for i in 0..layout.total() {
            assert_eq!(layout.index_pair(i).unwrap(), index_pair(i, 4, &sizes).unwrap());
        }
        assert!(layout.index_pair(layout.total()).is_err());
    }

    #[test]
    fn chunk_of_window_size_has_one_window() {
        let layout = WindowLayout::new(5, vec![5]);
        assert_eq!(layout.total(), 1);
        assert_eq!(layout.index_pair(0).unwrap(), (0, 0));
        assert!(layout.check(0, 0).is_ok());
        assert!(matches!(
            layout.check(0, 1),
            Err(WindowError::WindowOutOfBounds { usable: 1, .. })
        ));
    }

    #[test]
    fn boundary_offset_is_last_full_window() {
        let layout = WindowLayout::new(4, CHUNK_SIZES.to_vec());
        assert!(layout.check(1, 12 - 4).is_ok());
        assert!(layout.check(1, 12 - 4 + 1).is_err());
        assert!(matches!(
            layout.check(3, 0),
            Err(WindowError::ChunkOutOfBounds { chunk: 3, chunks: 3 })
        ));
    }
}

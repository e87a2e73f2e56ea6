use log::trace;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::index::{rescale, IndexPair};
use super::{Batch, BatchSequence, LabelGenerator, WindowError, WindowGenerator};

/// What happens when a rescaled offset falls past the last window of a
/// non-reference collection.
///
/// Flooring during rescaling and auxiliary signals that are a few samples
/// shorter than the reference can both produce such offsets near the end of
/// a chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescalePolicy {
    /// Fail with a bounds error.
    #[default]
    Strict,
    /// Use the last window of the chunk instead.
    ClampToChunk,
}

/// Aligned batches over several parallel chunk collections.
///
/// Collection 0 is the reference: it defines the index space, the number of
/// batches and the labels. The other collections are addressed by rescaling
/// the reference offsets by the ratio of window sizes.
#[derive(Debug, Clone)]
pub struct MultiSignalWindowGenerator {
    window_generators: Vec<WindowGenerator>,
    labels: Option<LabelGenerator>,
    policy: RescalePolicy,
}

impl MultiSignalWindowGenerator {
    /// `detection_size` defaults to the reference window size.
    pub fn new(
        signals: Vec<Vec<Vec<f64>>>,
        batch_size: usize,
        window_sizes: &[usize],
        trigger_chunks: Option<&[Vec<usize>]>,
        detection_size: Option<usize>,
        wrap_samples: bool,
    ) -> Result<Self, WindowError> {
        if signals.is_empty() {
            return Err(WindowError::EmptyGroup);
        }
        if window_sizes.len() != signals.len() {
            return Err(WindowError::LengthMismatch {
                what: "window sizes per signal collection",
                expected: signals.len(),
                actual: window_sizes.len(),
            });
        }
        let chunk_count = signals[0].len();
        if let Some(mismatch) = signals.iter().find(|chunks| chunks.len() != chunk_count) {
            return Err(WindowError::LengthMismatch {
                what: "chunks per signal collection",
                expected: chunk_count,
                actual: mismatch.len(),
            });
        }
        let window_generators = signals
            .into_iter()
            .zip(window_sizes)
            .map(|(chunks, &window_size)| {
                WindowGenerator::new(chunks, batch_size, window_size, wrap_samples)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let reference = &window_generators[0];
        let labels = trigger_chunks
            .map(|triggers| {
                LabelGenerator::new(
                    triggers,
                    reference.chunk_sizes().to_vec(),
                    batch_size,
                    reference.window_size(),
                    detection_size.unwrap_or(reference.window_size()),
                )
            })
            .transpose()?;
        Ok(Self {
            window_generators,
            labels,
            policy: RescalePolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: RescalePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RescalePolicy {
        self.policy
    }

    pub fn reference(&self) -> &WindowGenerator {
        &self.window_generators[0]
    }

    pub fn window_generators(&self) -> &[WindowGenerator] {
        &self.window_generators
    }

    pub fn has_labels(&self) -> bool {
        self.labels.is_some()
    }

    /// Reference pairs of `batch_index` mapped into collection `signal_index`.
    pub fn index_pairs_for(
        &self,
        signal_index: usize,
        reference_pairs: &[IndexPair],
    ) -> Result<Vec<IndexPair>, WindowError> {
        let generator =
            self.window_generators
                .get(signal_index)
                .ok_or(WindowError::ChunkOutOfBounds {
                    chunk: signal_index,
                    chunks: self.window_generators.len(),
                })?;
        let pairs = rescale(
            reference_pairs,
            self.reference().window_size(),
            generator.window_size(),
        );
        match self.policy {
            RescalePolicy::Strict => Ok(pairs),
            RescalePolicy::ClampToChunk => pairs
                .into_iter()
                .map(|pair| generator.clamp(pair))
                .collect(),
        }
    }

    pub fn labels_for_batch(&self, batch_index: usize) -> Result<Vec<f64>, WindowError> {
        self.labels
            .as_ref()
            .ok_or(WindowError::NoLabels)?
            .get(batch_index)
    }
}

impl BatchSequence for MultiSignalWindowGenerator {
    fn len(&self) -> usize {
        self.reference().len()
    }

    fn batch(&self, index: usize) -> Result<Batch, WindowError> {
        let batches = self.len();
        if index >= batches {
            return Err(WindowError::BatchOutOfBounds {
                batch: index,
                batches,
            });
        }
        let reference_pairs = self.reference().index_pairs_for_batch(index)?;
        let inputs = self
            .window_generators
            .iter()
            .enumerate()
            .map(|(signal_index, generator)| {
                let pairs = self.index_pairs_for(signal_index, &reference_pairs)?;
                generator.windows_array(&pairs)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let labels = match &self.labels {
            Some(labels) => Some(Array1::from(labels.labels(&reference_pairs)?)),
            None => None,
        };
        trace!(
            "batch {} spans {:?}..={:?}",
            index,
            reference_pairs.first(),
            reference_pairs.last()
        );
        Ok(Batch { inputs, labels })
    }
}

use ndarray::Array1;

use super::{Batch, BatchSequence, LabelGenerator, WindowError, WindowGenerator};

/// Windows of one chunk collection, with labels when trigger points are known.
#[derive(Debug, Clone)]
pub struct SingleSignalWindowGenerator {
    windows: WindowGenerator,
    labels: Option<LabelGenerator>,
}

impl SingleSignalWindowGenerator {
    /// `detection_size` defaults to `window_size`.
    pub fn new(
        signal_chunks: Vec<Vec<f64>>,
        batch_size: usize,
        window_size: usize,
        trigger_chunks: Option<&[Vec<usize>]>,
        detection_size: Option<usize>,
        wrap_samples: bool,
    ) -> Result<Self, WindowError> {
        let windows = WindowGenerator::new(signal_chunks, batch_size, window_size, wrap_samples)?;
        let labels = trigger_chunks
            .map(|triggers| {
                LabelGenerator::new(
                    triggers,
                    windows.chunk_sizes().to_vec(),
                    batch_size,
                    window_size,
                    detection_size.unwrap_or(window_size),
                )
            })
            .transpose()?;
        Ok(Self { windows, labels })
    }

    pub fn windows(&self) -> &WindowGenerator {
        &self.windows
    }

    pub fn has_labels(&self) -> bool {
        self.labels.is_some()
    }

    pub fn labels_for_batch(&self, batch_index: usize) -> Result<Vec<f64>, WindowError> {
        self.labels
            .as_ref()
            .ok_or(WindowError::NoLabels)?
            .get(batch_index)
    }

    pub fn label(&self, chunk_index: usize, offset: usize) -> Result<f64, WindowError> {
        self.labels
            .as_ref()
            .ok_or(WindowError::NoLabels)?
            .label(chunk_index, offset)
    }
}

impl BatchSequence for SingleSignalWindowGenerator {
    fn len(&self) -> usize {
        self.windows.len()
    }

    fn batch(&self, index: usize) -> Result<Batch, WindowError> {
        let inputs = vec![self.windows.batch_array(index)?];
        let labels = match &self.labels {
            Some(labels) => Some(Array1::from(labels.get(index)?)),
            None => None,
        };
        Ok(Batch { inputs, labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windowing::label::tests::trigger_chunks;
    use crate::windowing::window::tests::signal_chunks;

    fn train(wrap: bool) -> SingleSignalWindowGenerator {
        SingleSignalWindowGenerator::new(
            signal_chunks(),
            2,
            4,
            Some(trigger_chunks().as_slice()),
            Some(1),
            wrap,
        )
        .unwrap()
    }

    fn inference(wrap: bool) -> SingleSignalWindowGenerator {
        SingleSignalWindowGenerator::new(signal_chunks(), 2, 4, None, None, wrap).unwrap()
    }

    #[test]
    fn training_batches_pair_windows_with_labels() {
        let windows = WindowGenerator::new(signal_chunks(), 2, 4, false).unwrap();
        let sizes = signal_chunks().iter().map(Vec::len).collect();
        let labels = LabelGenerator::new(&trigger_chunks(), sizes, 2, 4, 1).unwrap();
        let gen = train(false);
        assert_eq!(gen.len(), 12);
        for i in 0..gen.len() {
            let batch = gen.batch(i).unwrap();
            assert_eq!(batch.inputs.len(), 1);
            assert_eq!(batch.inputs[0], windows.batch_array(i).unwrap());
            assert_eq!(batch.labels.unwrap().to_vec(), labels.get(i).unwrap());
        }
        assert!(gen.batch(12).unwrap_err().is_bounds());
    }

    #[test]
    fn wrapped_batches_have_trailing_axis() {
        let gen = train(true);
        for i in 0..gen.len() {
            assert_eq!(gen.batch(i).unwrap().inputs[0].shape(), &[2, 4, 1]);
        }
        assert_eq!(inference(true).batch(0).unwrap().inputs[0].shape(), &[2, 4, 1]);
    }

    #[test]
    fn inference_batches_have_no_labels() {
        let gen = inference(false);
        assert_eq!(gen.len(), 12);
        assert!(gen.batch(5).unwrap().labels.is_none());
        assert!(matches!(gen.labels_for_batch(0), Err(WindowError::NoLabels)));
        assert!(matches!(gen.label(1, 1), Err(WindowError::NoLabels)));
        assert!(gen.batch(12).unwrap_err().is_bounds());
    }

    #[test]
    fn detection_size_defaults_to_window_size() {
        let gen =
            SingleSignalWindowGenerator::new(signal_chunks(), 2, 4, Some(trigger_chunks().as_slice()), None, false)
                .unwrap();
        // chunk 1 triggers at 2, 5, 7 widen to one run over [0, 9)
        assert_eq!(gen.label(1, 2).unwrap(), 1.0);
        assert_eq!(gen.label(1, 6).unwrap(), 1.0);
        assert_eq!(gen.label(1, 7).unwrap(), 0.0);
    }
}

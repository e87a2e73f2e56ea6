use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::model::{LogisticConfig, LogisticModel, TriggerModel};
use super::QrsDetector;
use crate::signal::{diff, window_average, Record};
use crate::trigger::{signal_to_points, DecoderConfig};
use crate::windowing::{BatchSequence, MultiSignalWindowGenerator, RescalePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiRateConfig {
    pub batch_size: usize,
    /// Window size on the full-rate signal.
    pub window_size: usize,
    pub detection_size: Option<usize>,
    /// Downsampling factor of the auxiliary signal.
    pub aux_ratio: usize,
    pub epochs: usize,
    pub decoder: DecoderConfig,
    pub model: LogisticConfig,
}

impl Default for MultiRateConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            window_size: 64,
            detection_size: Some(9),
            aux_ratio: 4,
            epochs: 3,
            decoder: DecoderConfig::default(),
            model: LogisticConfig::default(),
        }
    }
}

/// Classifies windows of the first difference of the lead together with the
/// matching windows of a downsampled difference signal.
#[derive(Debug, Clone)]
pub struct MultiRateDetector {
    name: String,
    config: MultiRateConfig,
    model: LogisticModel,
}

impl MultiRateDetector {
    pub fn new(name: impl Into<String>, config: MultiRateConfig) -> Result<Self> {
        if config.batch_size == 0 || config.aux_ratio == 0 {
            anyhow::bail!("batch size and aux ratio must be positive");
        }
        if config.window_size / config.aux_ratio == 0 {
            anyhow::bail!(
                "window size {} leaves no auxiliary window at ratio {}",
                config.window_size,
                config.aux_ratio
            );
        }
        if config.window_size % config.aux_ratio != 0 {
            anyhow::bail!(
                "window size {} is not a multiple of aux ratio {}",
                config.window_size,
                config.aux_ratio
            );
        }
        Ok(Self {
            name: name.into(),
            model: LogisticModel::new(config.model),
            config,
        })
    }

    pub fn config(&self) -> &MultiRateConfig {
        &self.config
    }

    fn window_sizes(&self) -> [usize; 2] {
        [
            self.config.window_size,
            self.config.window_size / self.config.aux_ratio,
        ]
    }

    /// Full-rate and auxiliary input signal of every record.
    ///
    /// Both are first differences, so trigger labels taken from raw sample
    /// positions sit half a sample early on these axes.
    fn inputs<'a>(&self, records: impl Iterator<Item = &'a Record>) -> Vec<Vec<Vec<f64>>> {
        let (full, aux) = records
            .map(|record| {
                let data = &record.signal.data;
                (
                    diff(data),
                    diff(&window_average(data, self.config.aux_ratio)),
                )
            })
            .unzip();
        vec![full, aux]
    }

    fn generator(
        &self,
        records: &[Record],
        batch_size: usize,
        triggers: Option<&[Vec<usize>]>,
    ) -> Result<MultiSignalWindowGenerator> {
        let generator = MultiSignalWindowGenerator::new(
            self.inputs(records.iter()),
            batch_size,
            &self.window_sizes(),
            triggers,
            self.config.detection_size,
            true,
        )?;
        Ok(generator.with_policy(RescalePolicy::ClampToChunk))
    }
}

impl QrsDetector for MultiRateDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "MultiRate"
    }

    fn describe(&self) -> String {
        let cfg = &self.config;
        format!(
            "Multi-Rate Detector ({})\n\tBatch Size: {}\n\tWindow Size: {}\n\tDetection Size: {:?}\n\tAux Ratio: {}\n\tThreshold: {}\n\tTolerance: {}\n\tTraining Epochs: {}",
            self.name,
            cfg.batch_size,
            cfg.window_size,
            cfg.detection_size,
            cfg.aux_ratio,
            cfg.decoder.threshold,
            cfg.decoder.tolerance,
            cfg.epochs
        )
    }

    fn train(&mut self, records: &[Record], triggers: &[Vec<usize>]) -> Result<()> {
        super::check_training_data(records, triggers)?;
        let data = self
            .generator(records, self.config.batch_size, Some(triggers))
            .context("failed to window training records")?;
        info!(
            "{}: training on {} records, {} batches",
            self.name,
            records.len(),
            data.len()
        );
        self.model.fit(&data, self.config.epochs)
    }

    fn trigger_signal(&self, record: &Record) -> Result<Vec<f64>> {
        let data = self
            .generator(std::slice::from_ref(record), 1, None)
            .with_context(|| format!("failed to window record {}", record.name))?;
        let predictions = self.model.predict(&data)?;
        let mut signal = vec![0.0; self.config.window_size / 2];
        signal.extend(predictions);
        Ok(signal)
    }

    fn trigger_and_signal(&self, record: &Record) -> Result<(Vec<f64>, Vec<usize>)> {
        let signal = self.trigger_signal(record)?;
        let points = signal_to_points(&signal, &self.config.decoder);
        Ok((signal, points))
    }

    fn reset(&mut self) {
        self.model.reset();
    }

    fn save_model(&self, path: &Path) -> Result<()> {
        self.model.save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::tests::impulse_record;
    use crate::metrics::trigger_metrics;

    fn config() -> MultiRateConfig {
        MultiRateConfig {
            batch_size: 16,
            window_size: 16,
            detection_size: Some(5),
            aux_ratio: 4,
            epochs: 100,
            model: LogisticConfig {
                learning_rate: 0.5,
                ..LogisticConfig::default()
            },
            ..MultiRateConfig::default()
        }
    }

    fn training_set() -> (Vec<Record>, Vec<Vec<usize>>) {
        let a = vec![30, 75, 130, 170, 220, 265, 310, 350];
        let b = vec![25, 60, 110, 160, 205, 250, 300, 340];
        (
            vec![impulse_record("a", 402, &a), impulse_record("b", 402, &b)],
            vec![a, b],
        )
    }

    #[test]
    fn trigger_signal_covers_every_reference_window() {
        let (records, triggers) = training_set();
        let mut detector = MultiRateDetector::new("xiang", config()).unwrap();
        detector.train(&records, &triggers).unwrap();
        let signal = detector.trigger_signal(&records[0]).unwrap();
        // 401 difference samples, 386 windows of 16, 8 leading zeros
        assert_eq!(signal.len(), 8 + 386);
        assert!(signal[..8].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn finds_most_trained_impulses() {
        let (records, triggers) = training_set();
        let mut detector = MultiRateDetector::new("xiang", config()).unwrap();
        detector.train(&records, &triggers).unwrap();
        let truth = vec![40, 90, 150, 200, 260, 330];
        let points = detector.trigger(&impulse_record("c", 402, &truth)).unwrap();
        let confusion = trigger_metrics(&truth, &points, 3);
        assert!(confusion.tp >= truth.len() - 1, "{:?}", points);
    }

    #[test]
    fn rejects_ratio_larger_than_window() {
        let cfg = MultiRateConfig {
            window_size: 4,
            aux_ratio: 8,
            ..MultiRateConfig::default()
        };
        assert!(MultiRateDetector::new("x", cfg).is_err());
        assert_eq!(
            MultiRateDetector::new("x", config()).unwrap().window_sizes(),
            [16, 4]
        );
    }

    #[test]
    fn rejects_ratio_not_dividing_window() {
        let cfg = MultiRateConfig {
            window_size: 10,
            aux_ratio: 4,
            ..config()
        };
        let err = MultiRateDetector::new("x", cfg).unwrap_err();
        assert!(err.to_string().contains("not a multiple"), "{err}");
        let cfg = MultiRateConfig {
            window_size: 12,
            aux_ratio: 4,
            ..config()
        };
        assert_eq!(
            MultiRateDetector::new("x", cfg).unwrap().window_sizes(),
            [12, 3]
        );
    }
}

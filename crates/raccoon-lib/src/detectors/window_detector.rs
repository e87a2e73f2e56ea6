use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::model::{LogisticConfig, LogisticModel, TriggerModel};
use super::QrsDetector;
use crate::signal::Record;
use crate::trigger::{signal_to_points, DecoderConfig};
use crate::windowing::{BatchSequence, SingleSignalWindowGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowDetectorConfig {
    pub batch_size: usize,
    pub window_size: usize,
    /// Width of the labeled run around each trigger point; the window size
    /// when unset.
    pub detection_size: Option<usize>,
    pub epochs: usize,
    pub decoder: DecoderConfig,
    pub model: LogisticConfig,
}

impl Default for WindowDetectorConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            window_size: 64,
            detection_size: Some(9),
            epochs: 3,
            decoder: DecoderConfig::default(),
            model: LogisticConfig::default(),
        }
    }
}

/// Classifies raw windows of the lead; the prediction for a window lands on
/// its centre sample.
#[derive(Debug, Clone)]
pub struct WindowDetector {
    name: String,
    config: WindowDetectorConfig,
    model: LogisticModel,
}

impl WindowDetector {
    pub fn new(name: impl Into<String>, config: WindowDetectorConfig) -> Result<Self> {
        if config.window_size == 0 || config.batch_size == 0 {
            anyhow::bail!("window size and batch size must be positive");
        }
        Ok(Self {
            name: name.into(),
            model: LogisticModel::new(config.model),
            config,
        })
    }

    pub fn config(&self) -> &WindowDetectorConfig {
        &self.config
    }
}

impl QrsDetector for WindowDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "Window"
    }

    fn describe(&self) -> String {
        let cfg = &self.config;
        format!(
            "Window Detector ({})\n\tBatch Size: {}\n\tWindow Size: {}\n\tDetection Size: {:?}\n\tThreshold: {}\n\tTolerance: {}\n\tTraining Epochs: {}",
            self.name,
            cfg.batch_size,
            cfg.window_size,
            cfg.detection_size,
            cfg.decoder.threshold,
            cfg.decoder.tolerance,
            cfg.epochs
        )
    }

    fn train(&mut self, records: &[Record], triggers: &[Vec<usize>]) -> Result<()> {
        super::check_training_data(records, triggers)?;
        let chunks = records.iter().map(|r| r.signal.data.clone()).collect();
        let data = SingleSignalWindowGenerator::new(
            chunks,
            self.config.batch_size,
            self.config.window_size,
            Some(triggers),
            self.config.detection_size,
            false,
        )
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
        let w = self.config.window_size;
        let data = SingleSignalWindowGenerator::new(
            vec![record.signal.data.clone()],
            1,
            w,
            None,
            None,
            false,
        )
        .with_context(|| format!("failed to window record {}", record.name))?;
        let predictions = self.model.predict(&data)?;
        let mut signal = vec![0.0; w / 2];
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

    fn config() -> WindowDetectorConfig {
        WindowDetectorConfig {
            batch_size: 32,
            window_size: 16,
            detection_size: Some(5),
            epochs: 100,
            model: LogisticConfig {
                learning_rate: 0.5,
                ..LogisticConfig::default()
            },
            ..WindowDetectorConfig::default()
        }
    }

    fn training_set() -> (Vec<Record>, Vec<Vec<usize>>) {
        let a = vec![30, 75, 130, 170, 220, 265, 310, 350];
        let b = vec![25, 60, 110, 160, 205, 250, 300, 340];
        (
            vec![impulse_record("a", 400, &a), impulse_record("b", 400, &b)],
            vec![a, b],
        )
    }

    #[test]
    fn trigger_signal_is_offset_by_half_a_window() {
        let (records, triggers) = training_set();
        let mut detector = WindowDetector::new("gb", config()).unwrap();
        detector.train(&records, &triggers).unwrap();
        let signal = detector.trigger_signal(&records[0]).unwrap();
        assert_eq!(signal.len(), 8 + 400 - 16 + 1);
        assert!(signal[..8].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn finds_trained_impulses() {
        let (records, triggers) = training_set();
        let mut detector = WindowDetector::new("gb", config()).unwrap();
        detector.train(&records, &triggers).unwrap();
        let truth = vec![40, 90, 150, 200, 260, 330];
        let unseen = impulse_record("c", 400, &truth);
        let points = detector.trigger(&unseen).unwrap();
        let confusion = trigger_metrics(&truth, &points, 2);
        assert_eq!(confusion.tp, truth.len(), "{:?}", points);
        assert_eq!(confusion.fp, 0, "{:?}", points);
    }

    #[test]
    fn reset_forgets_training() {
        let (records, triggers) = training_set();
        let mut detector = WindowDetector::new("gb", config()).unwrap();
        assert!(detector.trigger(&records[0]).is_err());
        detector.train(&records, &triggers).unwrap();
        assert!(detector.trigger(&records[0]).is_ok());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0_gb_Window.json");
        detector.save_model(&path).unwrap();
        assert!(path.exists());

        detector.reset();
        assert!(detector.trigger(&records[0]).is_err());
        assert!(detector.train(&records, &triggers[..1]).is_err());
    }

    #[test]
    fn rejects_zero_window() {
        let cfg = WindowDetectorConfig {
            window_size: 0,
            ..WindowDetectorConfig::default()
        };
        assert!(WindowDetector::new("x", cfg).is_err());
    }
}

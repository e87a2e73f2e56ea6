//! QRS detectors behind one capability trait.

pub mod model;
pub mod multi_rate;
pub mod pan_tompkins;
pub mod window_detector;

use anyhow::Result;
use std::path::Path;

use crate::signal::Record;

pub use model::{LogisticConfig, LogisticModel, TriggerModel};
pub use multi_rate::{MultiRateConfig, MultiRateDetector};
pub use pan_tompkins::{PanTompkinsConfig, PanTompkinsDetector};
pub use window_detector::{WindowDetector, WindowDetectorConfig};

/// Something that finds QRS complexes in a single-lead record.
///
/// Detectors produce an intermediate trigger signal (one value per sample,
/// high near a QRS) and decode it into trigger points.
pub trait QrsDetector: Send {
    /// Instance name, unique within an evaluation.
    fn name(&self) -> &str;

    /// Detector family, used in artifact file names.
    fn kind(&self) -> &'static str;

    /// Multi-line description of the configuration.
    fn describe(&self) -> String;

    fn train(&mut self, records: &[Record], triggers: &[Vec<usize>]) -> Result<()>;

    fn trigger_signal(&self, record: &Record) -> Result<Vec<f64>>;

    /// Trigger signal and the points decoded from it, computed once.
    fn trigger_and_signal(&self, record: &Record) -> Result<(Vec<f64>, Vec<usize>)>;

    fn trigger(&self, record: &Record) -> Result<Vec<usize>> {
        Ok(self.trigger_and_signal(record)?.1)
    }

    /// Forget everything learned by `train`.
    fn reset(&mut self);

    fn save_model(&self, path: &Path) -> Result<()>;
}

/// Every record needs exactly one trigger list.
pub fn check_training_data(records: &[Record], triggers: &[Vec<usize>]) -> Result<()> {
    if records.len() != triggers.len() {
        anyhow::bail!(
            "training data have different length: {} records, {} trigger lists",
            records.len(),
            triggers.len()
        );
    }
    Ok(())
}

use anyhow::{Context, Result};
use log::debug;
use raccoon_lib::detectors::{
    MultiRateConfig, MultiRateDetector, PanTompkinsConfig, PanTompkinsDetector, QrsDetector,
    WindowDetector, WindowDetectorConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::names::NameBuilder;
use crate::split::{KFold, LeaveOneOut, PredefinedSplit, Splitter};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("insufficient configuration: {0}")]
    InsufficientConfiguration(String),
}

fn insufficient(message: impl Into<String>) -> ConfigError {
    ConfigError::InsufficientConfiguration(message.into())
}

/// Cross-validation method of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CvMethod {
    Loocv,
    K2,
    K10,
    /// k-fold with `k` from the configuration.
    Kfold,
    /// Test on the configured `test_records`.
    Defined,
}

/// One detector entry, tagged by `type`. A missing `name` is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DetectorConfig {
    PanTompkins {
        #[serde(default)]
        name: Option<String>,
        #[serde(flatten)]
        config: PanTompkinsConfig,
    },
    Window {
        #[serde(default)]
        name: Option<String>,
        #[serde(flatten)]
        config: WindowDetectorConfig,
    },
    MultiRate {
        #[serde(default)]
        name: Option<String>,
        #[serde(flatten)]
        config: MultiRateConfig,
    },
}

impl DetectorConfig {
    pub fn name(&self) -> Option<&str> {
        match self {
            DetectorConfig::PanTompkins { name, .. }
            | DetectorConfig::Window { name, .. }
            | DetectorConfig::MultiRate { name, .. } => name.as_deref(),
        }
    }

    pub fn build(&self, names: &mut NameBuilder) -> Result<Box<dyn QrsDetector>> {
        let name = match self.name() {
            Some(name) => name.to_string(),
            None => names.name(),
        };
        debug!("building detector {name}");
        Ok(match self {
            DetectorConfig::PanTompkins { config, .. } => {
                Box::new(PanTompkinsDetector::new(name, *config))
            }
            DetectorConfig::Window { config, .. } => Box::new(WindowDetector::new(name, *config)?),
            DetectorConfig::MultiRate { config, .. } => {
                Box::new(MultiRateDetector::new(name, *config)?)
            }
        })
    }
}

fn default_distance() -> usize {
    5
}

fn default_plot_xlim() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    0
}

/// An evaluation as described in a TOML or JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default)]
    pub input_dir: Option<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Record names; every record in `input_dir` when unset.
    #[serde(default)]
    pub records: Option<Vec<String>>,
    /// Only the first `sampto` samples of each record are used.
    #[serde(default)]
    pub sampto: Option<usize>,
    #[serde(default)]
    pub generate_plots: bool,
    #[serde(default)]
    pub save_annotations: bool,
    #[serde(default)]
    pub save_model: bool,
    /// Largest distance in samples between a true and a detected point that
    /// still counts as a match.
    #[serde(default = "default_distance")]
    pub actual_detected_distance: usize,
    #[serde(default = "default_plot_xlim")]
    pub plot_xlim: usize,
    pub cv_method: Option<CvMethod>,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default)]
    pub test_records: Vec<String>,
    #[serde(default = "default_true")]
    pub verbose: bool,
    /// Seed of the detector name generator.
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub detectors: Vec<DetectorConfig>,
}

impl EvaluatorConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing TOML configuration")
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("parsing JSON configuration")
    }

    /// Read a configuration file (JSON when the extension is `.json`, TOML
    /// otherwise), resolve relative directories against the file's own
    /// directory and fill in the record list.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration {}", path.display()))?;
        let mut config = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
        .with_context(|| format!("in {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;
        if config.records.is_none() {
            config.records = Some(config.discover_records()?);
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        for dir in [&mut self.input_dir, &mut self.output_dir].into_iter().flatten() {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_dir.is_none() {
            return Err(insufficient("no input directory specified"));
        }
        if self.output_dir.is_none() {
            return Err(insufficient("no output directory specified"));
        }
        if self.detectors.is_empty() {
            return Err(insufficient("no detectors specified"));
        }
        match self.cv_method {
            None => return Err(insufficient("no cross-validation method specified")),
            Some(CvMethod::Kfold) if self.k.is_none() => {
                return Err(insufficient("cv_method kfold needs k"))
            }
            Some(CvMethod::Defined) if self.test_records.is_empty() => {
                return Err(insufficient("cv_method defined needs test_records"))
            }
            _ => {}
        }
        Ok(())
    }

    pub fn input_dir(&self) -> Result<&Path, ConfigError> {
        self.input_dir
            .as_deref()
            .ok_or_else(|| insufficient("no input directory specified"))
    }

    pub fn output_dir(&self) -> Result<&Path, ConfigError> {
        self.output_dir
            .as_deref()
            .ok_or_else(|| insufficient("no output directory specified"))
    }

    /// Names of all records in `input_dir` with a WFDB header, sorted.
    pub fn discover_records(&self) -> Result<Vec<String>> {
        let dir = self.input_dir()?;
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to list records in {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "hea") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        if names.is_empty() {
            return Err(insufficient(format!("no records found in {}", dir.display())).into());
        }
        Ok(names)
    }

    pub fn records(&self) -> &[String] {
        self.records.as_deref().unwrap_or(&[])
    }

    pub fn splitter(&self, records: &[String]) -> Result<Box<dyn Splitter>, ConfigError> {
        let method = self
            .cv_method
            .ok_or_else(|| insufficient("no cross-validation method specified"))?;
        Ok(match method {
            CvMethod::Loocv => Box::new(LeaveOneOut),
            CvMethod::K2 => Box::new(KFold { k: 2 }),
            CvMethod::K10 => Box::new(KFold { k: 10 }),
            CvMethod::Kfold => Box::new(KFold {
                k: self.k.ok_or_else(|| insufficient("cv_method kfold needs k"))?,
            }),
            CvMethod::Defined => Box::new(PredefinedSplit::from_test_records(
                records,
                &self.test_records,
            )),
        })
    }

    pub fn build_detectors(&self, names: &mut NameBuilder) -> Result<Vec<Box<dyn QrsDetector>>> {
        for name in self.detectors.iter().filter_map(DetectorConfig::name) {
            names.reserve(name);
        }
        self.detectors.iter().map(|d| d.build(names)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML: &str = r#"
input_dir = "records"
output_dir = "out"
cv_method = "kfold"
k = 3
save_annotations = true

[[detectors]]
type = "PanTompkins"
name = "pt"
min_rr_s = 0.25

[[detectors]]
type = "Window"
window_size = 32
detection_size = 5

[detectors.decoder]
threshold = 0.7
"#;

    #[test]
    fn parses_toml_with_tagged_detectors() {
        let config = EvaluatorConfig::from_toml_str(TOML).unwrap();
        assert_eq!(config.cv_method, Some(CvMethod::Kfold));
        assert_eq!(config.actual_detected_distance, 5);
        assert!(config.verbose);
        assert!(config.save_annotations && !config.generate_plots);
        match &config.detectors[0] {
            DetectorConfig::PanTompkins { name, config } => {
                assert_eq!(name.as_deref(), Some("pt"));
                assert_eq!(config.min_rr_s, 0.25);
                assert_eq!(config.lowcut_hz, PanTompkinsConfig::default().lowcut_hz);
            }
            other => panic!("unexpected detector {other:?}"),
        }
        match &config.detectors[1] {
            DetectorConfig::Window { name, config } => {
                assert!(name.is_none());
                assert_eq!(config.window_size, 32);
                assert_eq!(config.detection_size, Some(5));
                assert_eq!(config.decoder.threshold, 0.7);
                assert_eq!(config.decoder.tolerance, 3);
            }
            other => panic!("unexpected detector {other:?}"),
        }
    }

    #[test]
    fn parses_json() {
        let json = r#"{
            "input_dir": "/data/mitdb",
            "output_dir": "/tmp/out",
            "cv_method": "loocv",
            "verbose": false,
            "detectors": [{"type": "MultiRate", "aux_ratio": 2, "window_size": 16}]
        }"#;
        let config = EvaluatorConfig::from_json_str(json).unwrap();
        assert!(!config.verbose);
        assert!(matches!(
            config.detectors[0],
            DetectorConfig::MultiRate { config: MultiRateConfig { aux_ratio: 2, .. }, .. }
        ));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_pieces_are_insufficient() {
        let mut config = EvaluatorConfig::from_toml_str(TOML).unwrap();
        config.k = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InsufficientConfiguration(_))
        ));
        config.k = Some(2);
        config.detectors.clear();
        assert!(config.validate().is_err());
        let bare = EvaluatorConfig::from_toml_str("cv_method = \"k2\"").unwrap();
        let err = bare.validate().unwrap_err();
        assert!(err.to_string().contains("input directory"));
    }

    #[test]
    fn load_resolves_relative_dirs_and_discovers_records() {
        let dir = tempfile::tempdir().unwrap();
        let records = dir.path().join("records");
        fs::create_dir(&records).unwrap();
        for name in ["101", "100"] {
            fs::write(records.join(format!("{name}.hea")), "").unwrap();
            fs::write(records.join(format!("{name}.atr")), "").unwrap();
        }
        let path = dir.path().join("eval.toml");
        fs::write(&path, TOML).unwrap();

        let config = EvaluatorConfig::load(&path).unwrap();
        assert_eq!(config.input_dir().unwrap(), records.as_path());
        assert_eq!(config.output_dir().unwrap(), dir.path().join("out").as_path());
        assert_eq!(config.records(), &["100".to_string(), "101".to_string()]);
    }

    #[test]
    fn builds_detectors_with_generated_names() {
        let config = EvaluatorConfig::from_toml_str(TOML).unwrap();
        let mut names = NameBuilder::new(1);
        let detectors = config.build_detectors(&mut names).unwrap();
        assert_eq!(detectors.len(), 2);
        assert_eq!(detectors[0].name(), "pt");
        assert_eq!(detectors[0].kind(), "PanTompkins");
        assert!(detectors[1].name().contains('_'));
        assert_eq!(detectors[1].kind(), "Window");
    }

    #[test]
    fn splitter_follows_cv_method() {
        let mut config = EvaluatorConfig::from_toml_str(TOML).unwrap();
        let records: Vec<String> = ["a", "b", "c"].map(String::from).to_vec();
        assert_eq!(config.splitter(&records).unwrap().splits(3).unwrap().len(), 3);
        config.cv_method = Some(CvMethod::Defined);
        config.test_records = vec!["b".into()];
        let splits = config.splitter(&records).unwrap().splits(3).unwrap();
        assert_eq!(splits[0].test, vec![1]);
    }
}

//! Cross-validated evaluation of QRS detectors: configuration, detector
//! registry, splits, and the report and artifact writers.

pub mod config;
pub mod evaluation;
pub mod evaluator;
pub mod names;
pub mod split;

pub use config::{ConfigError, CvMethod, DetectorConfig, EvaluatorConfig};
pub use evaluation::{Dataset, Evaluation, ReportRow, REPORT_HEADER};
pub use evaluator::{format_report, write_report, Evaluator, EvaluatorSettings};
pub use names::NameBuilder;
pub use split::{KFold, LeaveOneOut, PredefinedSplit, Split, Splitter};

use anyhow::{ensure, Context, Result};
use log::{debug, info};
use raccoon_lib::detectors::QrsDetector;
use raccoon_lib::io::wfdb::write_wfdb_annotations;
use raccoon_lib::metrics::{trigger_metrics, Confusion};
use raccoon_lib::plot::{figure_from_detection, PlotBackend};
use raccoon_lib::signal::Record;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Records with their true trigger points, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub triggers: Vec<Vec<usize>>,
}

impl Dataset {
    pub fn new(records: Vec<Record>, triggers: Vec<Vec<usize>>) -> Result<Self> {
        ensure!(
            records.len() == triggers.len(),
            "data have different length: {} records, {} trigger lists",
            records.len(),
            triggers.len()
        );
        Ok(Self { records, triggers })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: Record, triggers: Vec<usize>) {
        self.records.push(record);
        self.triggers.push(triggers);
    }

    pub fn select(&self, indices: &[usize]) -> Dataset {
        Dataset {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            triggers: indices.iter().map(|&i| self.triggers[i].clone()).collect(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }
}

/// One line of `report.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub id: usize,
    pub detector: String,
    pub train_records: Vec<String>,
    pub test_record: String,
    #[serde(flatten)]
    pub confusion: Confusion,
    pub sensitivity: f64,
    pub ppv: f64,
    pub f1: f64,
    /// Seconds spent in `trigger_and_signal`.
    pub runtime: f64,
}

pub const REPORT_HEADER: [&str; 12] = [
    "ID",
    "Detector",
    "Train Records",
    "Test Record",
    "TP",
    "TN",
    "FP",
    "FN",
    "Sensitivity",
    "PPV",
    "F1",
    "Detection Runtime",
];

impl ReportRow {
    pub fn to_record(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.detector.clone(),
            format!("[{}]", self.train_records.join(", ")),
            self.test_record.clone(),
            self.confusion.tp.to_string(),
            self.confusion.tn.to_string(),
            self.confusion.fp.to_string(),
            self.confusion.fn_.to_string(),
            self.sensitivity.to_string(),
            self.ppv.to_string(),
            self.f1.to_string(),
            self.runtime.to_string(),
        ]
    }
}

/// Detection output for one test record.
#[derive(Debug, Clone)]
struct Detection {
    signal: Vec<f64>,
    points: Vec<usize>,
    runtime: f64,
    confusion: Confusion,
}

/// A single detector trained on one split and tested on the rest.
pub struct Evaluation<'d> {
    pub id: usize,
    output_dir: PathBuf,
    detector: &'d mut dyn QrsDetector,
    train: Dataset,
    test: Dataset,
    trigger_distance: usize,
    detections: Vec<Detection>,
}

impl<'d> Evaluation<'d> {
    pub fn new(
        id: usize,
        output_dir: impl Into<PathBuf>,
        detector: &'d mut dyn QrsDetector,
        train: Dataset,
        test: Dataset,
        trigger_distance: usize,
    ) -> Result<Self> {
        ensure!(
            train.records.len() == train.triggers.len(),
            "training data have different length"
        );
        ensure!(
            test.records.len() == test.triggers.len(),
            "test data have different length"
        );
        Ok(Self {
            id,
            output_dir: output_dir.into(),
            detector,
            train,
            test,
            trigger_distance,
            detections: Vec::new(),
        })
    }

    /// Reset and train the detector, then detect on every test record.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "evaluation {}: {} on {:?}",
            self.id,
            self.detector.name(),
            self.test.names()
        );
        self.detector.reset();
        self.detector
            .train(&self.train.records, &self.train.triggers)
            .with_context(|| format!("training {} failed", self.detector.name()))?;
        self.detections.clear();
        for (record, truth) in self.test.records.iter().zip(&self.test.triggers) {
            let start = Instant::now();
            let (signal, points) = self
                .detector
                .trigger_and_signal(record)
                .with_context(|| format!("detection on record {} failed", record.name))?;
            let runtime = start.elapsed().as_secs_f64();
            let confusion = trigger_metrics(truth, &points, self.trigger_distance);
            debug!(
                "{} on {}: {:?} in {:.3}s",
                self.detector.name(),
                record.name,
                confusion,
                runtime
            );
            self.detections.push(Detection {
                signal,
                points,
                runtime,
                confusion,
            });
        }
        Ok(())
    }

    pub fn has_run(&self) -> bool {
        self.detections.len() == self.test.len() && !self.test.is_empty()
    }

    pub fn detected(&self) -> Vec<&[usize]> {
        self.detections.iter().map(|d| d.points.as_slice()).collect()
    }

    pub fn report(&self) -> Vec<ReportRow> {
        let train_records: Vec<String> =
            self.train.records.iter().map(|r| r.name.clone()).collect();
        self.test
            .records
            .iter()
            .zip(&self.detections)
            .map(|(record, detection)| {
                let c = detection.confusion;
                ReportRow {
                    id: self.id,
                    detector: self.detector.name().to_string(),
                    train_records: train_records.clone(),
                    test_record: record.name.clone(),
                    confusion: c,
                    sensitivity: c.sensitivity(),
                    ppv: c.ppv(),
                    f1: c.f1(),
                    runtime: detection.runtime,
                }
            })
            .collect()
    }

    fn file_name(&self) -> String {
        format!("{}_{}_{}", self.id, self.detector.name(), self.detector.kind())
    }

    fn file_name_for(&self, record: &Record) -> String {
        format!("{}_{}", self.file_name(), record.name)
    }

    pub fn annotation_path(&self, record: &Record) -> PathBuf {
        self.output_dir
            .join(format!("{}.atr", self.file_name_for(record)))
    }

    pub fn model_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.json", self.file_name()))
    }

    /// Write detected points of every test record; records without any
    /// detection are skipped.
    pub fn save_annotations(&self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for (record, detection) in self.test.records.iter().zip(&self.detections) {
            if detection.points.is_empty() {
                continue;
            }
            let path = self.annotation_path(record);
            write_wfdb_annotations(&path, &detection.points)?;
            written.push(path);
        }
        Ok(written)
    }

    pub fn save_model(&self) -> Result<PathBuf> {
        let path = self.model_path();
        self.detector
            .save_model(&path)
            .with_context(|| format!("saving model of {}", self.detector.name()))?;
        Ok(path)
    }

    pub fn plot_detections(&self, backend: &mut dyn PlotBackend, xlim: usize) -> Result<()> {
        for ((record, truth), detection) in self
            .test
            .records
            .iter()
            .zip(&self.test.triggers)
            .zip(&self.detections)
        {
            let fig = figure_from_detection(
                record,
                &detection.signal,
                truth,
                &detection.points,
                xlim,
            );
            let path = self
                .output_dir
                .join(format!("{}.svg", self.file_name_for(record)));
            backend
                .draw(&fig, &path)
                .with_context(|| format!("plotting {}", path.display()))?;
        }
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use raccoon_lib::detectors::{PanTompkinsConfig, PanTompkinsDetector};
    use raccoon_lib::io::wfdb::load_trigger_points;
    use raccoon_lib::plot::Figure;
    use raccoon_lib::signal::TimeSeries;

    /// Narrow Gaussian beats every `rr` samples at 360 Hz.
    pub(crate) fn beat_record(name: &str, seconds: f64, rr: usize) -> (Record, Vec<usize>) {
        let fs = 360.0;
        let len = (seconds * fs) as usize;
        let beats: Vec<usize> = (rr / 2..len.saturating_sub(rr / 2)).step_by(rr).collect();
        let width = 0.02 * fs;
        let mut data = vec![0.0; len];
        for &b in &beats {
            for (i, v) in data.iter_mut().enumerate() {
                let d = (i as f64 - b as f64) / width;
                *v += (-0.5 * d * d).exp();
            }
        }
        (Record::new(name, TimeSeries::new(fs, data)), beats)
    }

    pub(crate) fn dataset(names: &[&str]) -> Dataset {
        let mut data = Dataset::default();
        for (i, name) in names.iter().enumerate() {
            let (record, beats) = beat_record(name, 8.0, 280 + 20 * i);
            data.push(record, beats);
        }
        data
    }

    #[derive(Default)]
    struct Recorder {
        paths: Vec<PathBuf>,
        series: Vec<usize>,
    }

    impl PlotBackend for Recorder {
        fn draw(&mut self, fig: &Figure, path: &Path) -> Result<()> {
            self.paths.push(path.to_path_buf());
            self.series.push(fig.series.len());
            Ok(())
        }
    }

    #[test]
    fn runs_and_reports_per_test_record() {
        let data = dataset(&["100", "101", "102"]);
        let mut detector = PanTompkinsDetector::new("pt", PanTompkinsConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let mut evaluation = Evaluation::new(
            4,
            dir.path(),
            &mut detector,
            data.select(&[0]),
            data.select(&[1, 2]),
            15,
        )
        .unwrap();
        assert!(!evaluation.has_run());
        evaluation.run().unwrap();
        assert!(evaluation.has_run());

        let rows = evaluation.report();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 4);
        assert_eq!(rows[0].train_records, vec!["100".to_string()]);
        assert_eq!(rows[1].test_record, "102");
        assert_eq!(rows[0].confusion.tn, 0);
        assert!(rows.iter().all(|r| r.sensitivity > 0.8 && r.runtime >= 0.0));
        assert_eq!(rows[0].to_record().len(), REPORT_HEADER.len());
        assert_eq!(rows[0].to_record()[2], "[100]");
    }

    #[test]
    fn writes_artifacts_with_evaluation_names() {
        let data = dataset(&["100", "101"]);
        let mut detector = PanTompkinsDetector::new("pt", PanTompkinsConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let mut evaluation = Evaluation::new(
            0,
            dir.path(),
            &mut detector,
            data.select(&[1]),
            data.select(&[0]),
            15,
        )
        .unwrap();
        evaluation.run().unwrap();

        let written = evaluation.save_annotations().unwrap();
        assert_eq!(written, vec![dir.path().join("0_pt_PanTompkins_100.atr")]);
        let points = load_trigger_points(&written[0], None).unwrap();
        assert_eq!(points.as_slice(), evaluation.detected()[0]);

        let model = evaluation.save_model().unwrap();
        assert_eq!(model, dir.path().join("0_pt_PanTompkins.json"));

        let mut recorder = Recorder::default();
        evaluation.plot_detections(&mut recorder, 2000).unwrap();
        assert_eq!(
            recorder.paths,
            vec![dir.path().join("0_pt_PanTompkins_100.svg")]
        );
        assert_eq!(recorder.series, vec![4]);
    }

    #[test]
    fn mismatched_data_is_rejected() {
        let (record, _) = beat_record("a", 2.0, 300);
        assert!(Dataset::new(vec![record], vec![]).is_err());
        let mut detector = PanTompkinsDetector::new("pt", PanTompkinsConfig::default());
        let broken = Dataset {
            records: vec![],
            triggers: vec![vec![1]],
        };
        assert!(Evaluation::new(0, ".", &mut detector, broken, Dataset::default(), 5).is_err());
    }
}

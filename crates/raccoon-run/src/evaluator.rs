use anyhow::{Context, Result};
use csv::WriterBuilder;
use log::{info, warn};
use raccoon_lib::detectors::QrsDetector;
use raccoon_lib::io::wfdb::{load_record, load_trigger_points};
use raccoon_lib::plot::PlotBackend;
use raccoon_lib::signal::Record;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::EvaluatorConfig;
use crate::evaluation::{Dataset, Evaluation, ReportRow, REPORT_HEADER};
use crate::names::NameBuilder;
use crate::split::Splitter;

/// Artifact and matching settings shared by every evaluation.
#[derive(Debug, Clone)]
pub struct EvaluatorSettings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub sampto: Option<usize>,
    pub generate_plots: bool,
    pub save_annotations: bool,
    pub save_model: bool,
    pub actual_detected_distance: usize,
    pub plot_xlim: usize,
}

impl EvaluatorSettings {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            sampto: None,
            generate_plots: false,
            save_annotations: false,
            save_model: false,
            actual_detected_distance: 5,
            plot_xlim: 10_000,
        }
    }
}

/// Runs every detector on every cross-validation split of the loaded records.
pub struct Evaluator {
    settings: EvaluatorSettings,
    detectors: Vec<Box<dyn QrsDetector>>,
    data: Dataset,
}

impl Evaluator {
    pub fn new(settings: EvaluatorSettings) -> Self {
        Self {
            settings,
            detectors: Vec::new(),
            data: Dataset::default(),
        }
    }

    /// Build detectors and load the configured records.
    pub fn from_config(config: &EvaluatorConfig) -> Result<Self> {
        config.validate()?;
        let settings = EvaluatorSettings {
            input_dir: config.input_dir()?.to_path_buf(),
            output_dir: config.output_dir()?.to_path_buf(),
            sampto: config.sampto,
            generate_plots: config.generate_plots,
            save_annotations: config.save_annotations,
            save_model: config.save_model,
            actual_detected_distance: config.actual_detected_distance,
            plot_xlim: config.plot_xlim,
        };
        let mut evaluator = Self::new(settings);
        let mut names = NameBuilder::new(config.seed);
        for detector in config.build_detectors(&mut names)? {
            evaluator.add_detector(detector);
        }
        let records = match &config.records {
            Some(records) => records.clone(),
            None => config.discover_records()?,
        };
        for name in &records {
            evaluator.add_record(name)?;
        }
        Ok(evaluator)
    }

    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    pub fn add_detector(&mut self, detector: Box<dyn QrsDetector>) {
        self.detectors.push(detector);
    }

    pub fn detectors(&self) -> &[Box<dyn QrsDetector>] {
        &self.detectors
    }

    /// Load lead 0 of `name` and the beats of its `.atr` annotation.
    pub fn add_record(&mut self, name: &str) -> Result<()> {
        let dir = &self.settings.input_dir;
        let record = load_record(dir, name, self.settings.sampto)?;
        let triggers = load_trigger_points(&dir.join(format!("{name}.atr")), self.settings.sampto)
            .with_context(|| format!("reading annotations of record {name}"))?;
        info!(
            "loaded record {name}: {} samples, {} beats",
            record.signal.len(),
            triggers.len()
        );
        self.add_loaded_record(record, triggers);
        Ok(())
    }

    pub fn add_loaded_record(&mut self, record: Record, triggers: Vec<usize>) {
        self.data.push(record, triggers);
    }

    pub fn record_names(&self) -> Vec<String> {
        self.data.records.iter().map(|r| r.name.clone()).collect()
    }

    pub fn describe(&self, splitter: &dyn Splitter) -> String {
        let s = &self.settings;
        let sampto = s
            .sampto
            .map_or_else(|| "all".to_string(), |n| n.to_string());
        [
            "Evaluator".to_string(),
            format!("\tReading from: {}", s.input_dir.display()),
            format!("\tWriting to: {}", s.output_dir.display()),
            format!("\tReading {sampto} samples per signal."),
            format!(
                "\tMaximum allowed distance between actual and detected trigger points: {} samples",
                s.actual_detected_distance
            ),
            format!("\tCross Validation Method: {}", splitter.describe()),
        ]
        .join("\n")
    }

    fn header(&self, splitter: &dyn Splitter) -> String {
        let detectors: Vec<String> = self.detectors.iter().map(|d| d.describe()).collect();
        format!(
            "{}\n\n\nDETECTORS:\n\n{}\n\n\nRECORDS:\n\n{}\n",
            self.describe(splitter),
            detectors.join("\n"),
            self.record_names().join(", ")
        )
    }

    /// Evaluate every detector on every split, write `header.txt` and
    /// `report.csv` to the output directory and return the report rows.
    pub fn evaluate(
        &mut self,
        splitter: &dyn Splitter,
        mut plotter: Option<&mut dyn PlotBackend>,
    ) -> Result<Vec<ReportRow>> {
        let splits = splitter.splits(self.data.len())?;
        let out = self.settings.output_dir.clone();
        fs::create_dir_all(&out)
            .with_context(|| format!("failed to create output directory {}", out.display()))?;
        if self.settings.generate_plots && plotter.is_none() {
            warn!("plots requested but no plot backend available; skipping plots");
        }
        info!(
            "evaluating {} detectors on {} splits",
            self.detectors.len(),
            splits.len()
        );

        let mut rows = Vec::new();
        let mut id = 0;
        for detector in self.detectors.iter_mut() {
            for split in &splits {
                let mut evaluation = Evaluation::new(
                    id,
                    &out,
                    detector.as_mut(),
                    self.data.select(&split.train),
                    self.data.select(&split.test),
                    self.settings.actual_detected_distance,
                )?;
                evaluation.run()?;
                if self.settings.save_annotations {
                    evaluation.save_annotations()?;
                }
                if self.settings.save_model {
                    evaluation.save_model()?;
                }
                if self.settings.generate_plots {
                    if let Some(backend) = plotter.as_deref_mut() {
                        evaluation.plot_detections(backend, self.settings.plot_xlim)?;
                    }
                }
                rows.extend(evaluation.report());
                id += 1;
            }
        }

        fs::write(out.join("header.txt"), self.header(splitter))
            .with_context(|| format!("writing header to {}", out.display()))?;
        write_report(&out.join("report.csv"), &rows)?;
        Ok(rows)
    }
}

pub fn write_report(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating report {}", path.display()))?;
    writer.write_record(REPORT_HEADER)?;
    for row in rows {
        writer.write_record(row.to_record())?;
    }
    writer.flush()?;
    Ok(())
}

/// Plain-text table of report rows for terminal output.
pub fn format_report(rows: &[ReportRow]) -> String {
    let table: Vec<Vec<String>> = std::iter::once(REPORT_HEADER.map(String::from).to_vec())
        .chain(rows.iter().map(ReportRow::to_record))
        .collect();
    let widths: Vec<usize> = (0..REPORT_HEADER.len())
        .map(|col| table.iter().map(|r| r[col].len()).max().unwrap_or(0))
        .collect();
    let mut out = String::new();
    for (i, row) in table.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
        if i == 0 {
            let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
            out.push_str(&rule.join("  "));
            out.push('\n');
        }
    }
    out
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use plotters::prelude::*;
use raccoon_lib::{
    detectors::{PanTompkinsConfig, PanTompkinsDetector, QrsDetector},
    io::{text as text_io, wfdb as wfdb_io},
    metrics::{merge, trigger_metrics, Confusion, Match},
    noise::apply_noise_db,
    plot::{self, figure_from_detection, Figure, PlotBackend},
    signal::{Record, TimeSeries},
    trigger::{points_to_signal, signal_to_points_with_certainty, DecoderConfig},
};
use raccoon_run::{format_report, Evaluator, EvaluatorConfig};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "raccoon",
    version,
    about = "raccoon: QRS detector evaluation tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cross-validate the detectors of a TOML or JSON evaluation file
    Evaluate {
        config: PathBuf,
        /// Skip SVG plots even when the configuration asks for them
        #[arg(long)]
        no_plots: bool,
        /// Print report rows as JSON lines instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Decode a trigger signal (one value per line) into trigger points
    SignalToPoints {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 0.5)]
        threshold: f64,
        #[arg(long, default_value_t = 3)]
        tolerance: usize,
        #[arg(long, default_value_t = 0)]
        min_width: usize,
        #[arg(long)]
        normalize: bool,
        /// Also report the mean signal value of every spike
        #[arg(long)]
        certainty: bool,
    },
    /// Synthesize a 0/1 trigger signal from trigger points
    PointsToSignal {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        length: usize,
        #[arg(long, default_value_t = 9)]
        window_size: usize,
    },
    /// Find QRS complexes with the Pan-Tompkins detector
    FindQrs {
        #[arg(long, default_value_t = 360.0)]
        fs: f64,
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        wfdb_header: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        wfdb_lead: usize,
        #[arg(long)]
        sampto: Option<usize>,
        #[arg(long, default_value_t = 0.2)]
        min_rr_s: f64,
        /// Write the detections as an MIT annotation file
        #[arg(long)]
        annotations: Option<PathBuf>,
        /// Render signal, trigger signal and detections to an SVG
        #[arg(long)]
        plot: Option<PathBuf>,
        #[arg(long, default_value_t = 10_000)]
        plot_xlim: usize,
    },
    /// Compare detected trigger points against true ones
    MatchTriggers {
        /// Index list, or `.atr` annotations
        #[arg(long)]
        actual: PathBuf,
        #[arg(long)]
        detected: PathBuf,
        #[arg(long, default_value_t = 5)]
        tolerance: usize,
        /// Print the per-point classification
        #[arg(long)]
        matches: bool,
    },
    /// Add a noise template to a signal at a target SNR
    AddNoise {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        noise: PathBuf,
        #[arg(long)]
        snr_db: f64,
    },
}

fn init_logging(default_level: &str) {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Evaluate {
            config,
            no_plots,
            json,
        } => cmd_evaluate(&config, no_plots, json)?,
        Commands::SignalToPoints {
            input,
            threshold,
            tolerance,
            min_width,
            normalize,
            certainty,
        } => {
            init_logging("warn");
            let cfg = DecoderConfig {
                threshold,
                tolerance,
                min_width,
                normalize,
            };
            cmd_signal_to_points(input.as_deref(), &cfg, certainty)?
        }
        Commands::PointsToSignal {
            input,
            length,
            window_size,
        } => {
            init_logging("warn");
            cmd_points_to_signal(input.as_deref(), length, window_size)?
        }
        Commands::FindQrs {
            fs,
            input,
            wfdb_header,
            wfdb_lead,
            sampto,
            min_rr_s,
            annotations,
            plot,
            plot_xlim,
        } => {
            init_logging("warn");
            let record = load_record(fs, input.as_deref(), wfdb_header.as_deref(), wfdb_lead, sampto)?;
            let config = PanTompkinsConfig {
                min_rr_s,
                ..PanTompkinsConfig::default()
            };
            cmd_find_qrs(
                &record,
                config,
                annotations.as_deref(),
                plot.as_deref(),
                plot_xlim,
            )?
        }
        Commands::MatchTriggers {
            actual,
            detected,
            tolerance,
            matches,
        } => {
            init_logging("warn");
            cmd_match_triggers(&actual, &detected, tolerance, matches)?
        }
        Commands::AddNoise {
            input,
            noise,
            snr_db,
        } => {
            init_logging("warn");
            cmd_add_noise(input.as_deref(), &noise, snr_db)?
        }
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => text_io::parse_f64_series(&read_stdin()?),
    }
}

fn read_indices(input: Option<&Path>) -> Result<Vec<usize>> {
    match input {
        Some(path) => text_io::read_event_indices(path),
        None => text_io::parse_event_indices(&read_stdin()?),
    }
}

/// Trigger points from an `.atr` file or a newline-delimited index list.
fn read_trigger_file(path: &Path) -> Result<Vec<usize>> {
    let is_atr = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("atr"));
    if is_atr {
        wfdb_io::load_trigger_points(path, None)
    } else {
        text_io::read_event_indices(path)
    }
}

fn load_record(
    fs: f64,
    input: Option<&Path>,
    wfdb_header: Option<&Path>,
    wfdb_lead: usize,
    sampto: Option<usize>,
) -> Result<Record> {
    let stem = |path: &Path| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "record".into())
    };
    if let Some(header) = wfdb_header {
        let signal = wfdb_io::load_wfdb_lead(header, wfdb_lead, sampto)?;
        return Ok(Record::new(stem(header), signal));
    }
    let mut data = read_samples(input)?;
    if let Some(limit) = sampto {
        data.truncate(limit);
    }
    let name = input.map(stem).unwrap_or_else(|| "stdin".into());
    Ok(Record::new(name, TimeSeries::new(fs, data)))
}

fn cmd_evaluate(path: &Path, no_plots: bool, json: bool) -> Result<()> {
    let mut config = EvaluatorConfig::load(path)?;
    init_logging(if config.verbose { "info" } else { "warn" });
    if no_plots {
        config.generate_plots = false;
    }
    let mut evaluator = Evaluator::from_config(&config)?;
    let splitter = config.splitter(&evaluator.record_names())?;
    info!("{}", evaluator.describe(splitter.as_ref()));
    let mut plotter = SvgPlotter;
    let rows = evaluator.evaluate(splitter.as_ref(), Some(&mut plotter as &mut dyn PlotBackend))?;
    if json {
        for row in &rows {
            println!("{}", serde_json::to_string(row)?);
        }
    } else {
        print!("{}", format_report(&rows));
    }
    Ok(())
}

#[derive(Serialize)]
struct DecodedPoints {
    points: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    certainties: Option<Vec<f64>>,
}

fn cmd_signal_to_points(input: Option<&Path>, cfg: &DecoderConfig, certainty: bool) -> Result<()> {
    let signal = read_samples(input)?;
    let (points, certainties) = signal_to_points_with_certainty(&signal, cfg);
    let decoded = DecodedPoints {
        points,
        certainties: certainty.then_some(certainties),
    };
    println!("{}", serde_json::to_string(&decoded)?);
    Ok(())
}

fn cmd_points_to_signal(input: Option<&Path>, length: usize, window_size: usize) -> Result<()> {
    let points = read_indices(input)?;
    print!(
        "{}",
        text_io::format_lines(&points_to_signal(&points, length, window_size))
    );
    Ok(())
}

fn cmd_find_qrs(
    record: &Record,
    config: PanTompkinsConfig,
    annotations: Option<&Path>,
    plot_path: Option<&Path>,
    plot_xlim: usize,
) -> Result<()> {
    let detector = PanTompkinsDetector::new("cli", config);
    let (signal, points) = detector.trigger_and_signal(record)?;
    if let Some(path) = annotations {
        wfdb_io::write_wfdb_annotations(path, &points)?;
    }
    if let Some(path) = plot_path {
        let fig = figure_from_detection(record, &signal, &[], &points, plot_xlim);
        SvgPlotter.draw(&fig, path)?;
    }
    println!("{}", serde_json::to_string(&points)?);
    Ok(())
}

#[derive(Serialize)]
struct MatchSummary {
    #[serde(flatten)]
    confusion: Confusion,
    sensitivity: f64,
    ppv: f64,
    f1: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    matches: Option<Vec<Match>>,
}

fn cmd_match_triggers(
    actual: &Path,
    detected: &Path,
    tolerance: usize,
    with_matches: bool,
) -> Result<()> {
    let actual = read_trigger_file(actual)?;
    let detected = read_trigger_file(detected)?;
    let confusion = trigger_metrics(&actual, &detected, tolerance);
    let summary = MatchSummary {
        confusion,
        sensitivity: confusion.sensitivity(),
        ppv: confusion.ppv(),
        f1: confusion.f1(),
        matches: with_matches.then(|| merge(&actual, &detected, tolerance)),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_add_noise(input: Option<&Path>, noise: &Path, snr_db: f64) -> Result<()> {
    let signal = read_samples(input)?;
    let noise = text_io::read_f64_series(noise)
        .with_context(|| format!("reading noise template {}", noise.display()))?;
    let noisy = apply_noise_db(&signal, &noise, snr_db)?;
    print!("{}", text_io::format_lines(&noisy));
    Ok(())
}

/// Renders figures to SVG files with plotters.
struct SvgPlotter;

fn rgb(color: plot::Color) -> RGBColor {
    let (r, g, b) = color.rgb();
    RGBColor(r, g, b)
}

impl PlotBackend for SvgPlotter {
    fn draw(&mut self, fig: &Figure, path: &Path) -> Result<()> {
        let root = SVGBackend::new(path, (fig.width, fig.height)).into_drawing_area();
        root.fill(&WHITE)?;
        let ((x_min, x_max), (y_min, y_max)) = fig.bounds();
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 24),
            )
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        let mut mesh = chart.configure_mesh();
        if let Some(label) = &fig.x.label {
            mesh.x_desc(label.as_str());
        }
        if let Some(label) = &fig.y.label {
            mesh.y_desc(label.as_str());
        }
        mesh.draw()?;
        let in_range = |p: &&[f64; 2]| p[0] >= x_min && p[0] <= x_max;
        for series in &fig.series {
            match series {
                plot::Series::Line(line) => {
                    let style = rgb(line.style.color)
                        .stroke_width(line.style.width.round().max(1.0) as u32);
                    chart.draw_series(LineSeries::new(
                        line.points.iter().filter(in_range).map(|p| (p[0], p[1])),
                        style,
                    ))?;
                }
                plot::Series::Points(points) => {
                    let color = rgb(points.style.color);
                    let radius = points.style.width.round().max(1.0) as u32;
                    chart.draw_series(
                        points
                            .points
                            .iter()
                            .filter(in_range)
                            .map(|p| Circle::new((p[0], p[1]), radius, color.filled())),
                    )?;
                }
            }
        }
        root.present()
            .with_context(|| format!("writing plot {}", path.display()))?;
        Ok(())
    }
}

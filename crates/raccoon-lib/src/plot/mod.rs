//! Backend-independent figure description.
//!
//! Figures are plain data; rendering lives behind [`PlotBackend`] so the
//! library does not depend on a drawing crate.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::signal::Record;

pub const ECG_COLOR: Color = Color(0x1F77B4);
pub const TRIGGER_COLOR: Color = Color(0xFF7F0E);
pub const ACTUAL_COLOR: Color = Color(0x2CA02C);
pub const DETECTED_COLOR: Color = Color(0xD62728);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
    /// Visible range; derived from the data when unset.
    pub range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
        ((self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Unconnected markers; `style.width` is the marker radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Points(PointSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) => &line.points,
            Series::Points(points) => &points.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub width: u32,
    pub height: u32,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            width: 1200,
            height: 500,
            x: Axis::default(),
            y: Axis::default(),
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// Bounds of all series inside the configured ranges, padded when flat.
    pub fn bounds(&self) -> ((f64, f64), (f64, f64)) {
        let mut x = (f64::INFINITY, f64::NEG_INFINITY);
        let mut y = (f64::INFINITY, f64::NEG_INFINITY);
        for [px, py] in self.series.iter().flat_map(|s| s.points().iter().copied()) {
            if let Some((lo, hi)) = self.x.range {
                if px < lo || px > hi {
                    continue;
                }
            }
            x = (x.0.min(px), x.1.max(px));
            y = (y.0.min(py), y.1.max(py));
        }
        let x = self.x.range.unwrap_or(x);
        let y = self.y.range.unwrap_or(y);
        (padded(x), padded(y))
    }
}

fn padded((lo, hi): (f64, f64)) -> (f64, f64) {
    if !lo.is_finite() || !hi.is_finite() {
        (0.0, 1.0)
    } else if lo == hi {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}

/// Renders figures to files.
pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure, path: &Path) -> anyhow::Result<()>;
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

fn indexed(samples: &[f64], xlim: usize) -> Vec<[f64; 2]> {
    samples
        .iter()
        .take(xlim)
        .enumerate()
        .map(|(i, &v)| [i as f64, v])
        .collect()
}

fn markers(points: &[usize], xlim: usize) -> Vec<[f64; 2]> {
    points
        .iter()
        .filter(|&&p| p < xlim)
        .map(|&p| [p as f64, 1.0])
        .collect()
}

/// ECG lead, trigger signal, and true (green) and detected (red) points of
/// one record over the first `xlim` samples.
pub fn figure_from_detection(
    record: &Record,
    trigger_signal: &[f64],
    actual: &[usize],
    detected: &[usize],
    xlim: usize,
) -> Figure {
    let mut fig = Figure::new(Some(record.name.clone()));
    fig.width = (xlim as u32 / 100 * 100).clamp(400, 4000);
    fig.x = Axis {
        label: Some("sample".into()),
        range: Some((0.0, xlim as f64)),
    };
    fig.add_series(Series::Line(LineSeries {
        name: "ECG".into(),
        points: indexed(&record.signal.data, xlim),
        style: Style {
            width: 1.0,
            color: ECG_COLOR,
        },
    }));
    fig.add_series(Series::Line(LineSeries {
        name: "trigger signal".into(),
        points: indexed(trigger_signal, xlim),
        style: Style {
            width: 1.0,
            color: TRIGGER_COLOR,
        },
    }));
    if !actual.is_empty() {
        fig.add_series(Series::Points(PointSeries {
            name: "actual".into(),
            points: markers(actual, xlim),
            style: Style {
                width: 3.0,
                color: ACTUAL_COLOR,
            },
        }));
    }
    if !detected.is_empty() {
        fig.add_series(Series::Points(PointSeries {
            name: "detected".into(),
            points: markers(detected, xlim),
            style: Style {
                width: 3.0,
                color: DETECTED_COLOR,
            },
        }));
    }
    fig
}

/// A single sample series against its index.
pub fn figure_from_samples(title: &str, samples: &[f64], max_points: usize, color: Color) -> Figure {
    let points = indexed(samples, samples.len());
    let mut fig = Figure::new(Some(title.into()));
    fig.add_series(Series::Line(LineSeries {
        name: title.into(),
        points: decimate_points(&points, max_points),
        style: Style { width: 1.4, color },
    }));
    fig
}

use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

use super::QrsDetector;
use crate::signal::{diff, Record};

/// Parameters of the Pan-Tompkins filter chain and peak picker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanTompkinsConfig {
    /// Lower cutoff for the single-pole high-pass filter (Hz).
    pub lowcut_hz: f64,
    /// Upper cutoff for the single-pole low-pass filter (Hz).
    pub highcut_hz: f64,
    /// Moving window integration length (seconds).
    pub integration_window_s: f64,
    /// Refractory period between two detections (seconds).
    pub min_rr_s: f64,
    /// Scale between noise and signal envelopes for the adaptive threshold.
    pub threshold_scale: f64,
    /// How far back to search (seconds) for the precise R-peak after a detection.
    pub search_back_s: f64,
}

impl Default for PanTompkinsConfig {
    fn default() -> Self {
        Self {
            lowcut_hz: 5.0,
            highcut_hz: 15.0,
            integration_window_s: 0.150,
            min_rr_s: 0.200,
            threshold_scale: 0.6,
            search_back_s: 0.150,
        }
    }
}

/// Classical detector: nothing to train, the trigger signal is the integrated
/// energy envelope of the band-passed derivative.
#[derive(Debug, Clone)]
pub struct PanTompkinsDetector {
    name: String,
    config: PanTompkinsConfig,
}

impl PanTompkinsDetector {
    pub fn new(name: impl Into<String>, config: PanTompkinsConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    pub fn config(&self) -> &PanTompkinsConfig {
        &self.config
    }

    fn envelope(&self, record: &Record) -> (Vec<f64>, Vec<f64>) {
        let cfg = &self.config;
        let fs = record.signal.fs.max(1.0);
        let bandpassed = bandpass(&record.signal.data, fs, cfg.lowcut_hz, cfg.highcut_hz);
        let energy: Vec<f64> = derivative(&bandpassed).iter().map(|d| d * d).collect();
        let envelope = moving_average(&energy, samples(cfg.integration_window_s, fs));
        (bandpassed, envelope)
    }

    fn points(&self, record: &Record, bandpassed: &[f64], envelope: &[f64]) -> Vec<usize> {
        let fs = record.signal.fs.max(1.0);
        let peaks = pick_peaks(bandpassed, envelope, fs, &self.config);
        if peaks.len() < 2 && !record.signal.is_empty() {
            debug!(
                "{}: adaptive threshold found {} peaks in {}, using fallback",
                self.name,
                peaks.len(),
                record.name
            );
            return fallback_peak_picker(&record.signal.data, fs, &self.config);
        }
        peaks
    }
}

impl QrsDetector for PanTompkinsDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "PanTompkins"
    }

    fn describe(&self) -> String {
        let cfg = &self.config;
        format!(
            "Pan-Tompkins Detector ({})\n\tBand: {}-{} Hz\n\tIntegration Window: {} s\n\tRefractory Period: {} s",
            self.name, cfg.lowcut_hz, cfg.highcut_hz, cfg.integration_window_s, cfg.min_rr_s
        )
    }

    fn train(&mut self, records: &[Record], triggers: &[Vec<usize>]) -> Result<()> {
        super::check_training_data(records, triggers)
    }

    fn trigger_signal(&self, record: &Record) -> Result<Vec<f64>> {
        Ok(self.envelope(record).1)
    }

    fn trigger_and_signal(&self, record: &Record) -> Result<(Vec<f64>, Vec<usize>)> {
        let (bandpassed, envelope) = self.envelope(record);
        let points = self.points(record, &bandpassed, &envelope);
        Ok((envelope, points))
    }

    fn reset(&mut self) {}

    fn save_model(&self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Seconds to a whole, non-zero sample count.
fn samples(seconds: f64, fs: f64) -> usize {
    ((seconds * fs).round() as usize).max(1)
}

#[derive(Debug, Clone, Copy)]
enum Pole {
    High,
    Low,
}

/// First-order RC filter, seeded with the first sample.
fn one_pole(data: &[f64], fs: f64, cutoff: f64, pole: Pole) -> Vec<f64> {
    let Some(&first) = data.first() else {
        return Vec::new();
    };
    let dt = fs.recip();
    let rc = (2.0 * PI * cutoff.max(0.01)).recip();
    match pole {
        Pole::High => {
            let alpha = rc / (rc + dt);
            data.iter()
                .scan((first, first), |(y, x_prev), &x| {
                    *y = alpha * (*y + x - *x_prev);
                    *x_prev = x;
                    Some(*y)
                })
                .collect()
        }
        Pole::Low => {
            let alpha = dt / (rc + dt);
            data.iter()
                .scan(first, |y, &x| {
                    *y += alpha * (x - *y);
                    Some(*y)
                })
                .collect()
        }
    }
}

/// High-pass at `low`, then low-pass at `high` when it is below Nyquist.
fn bandpass(data: &[f64], fs: f64, low: f64, high: f64) -> Vec<f64> {
    let hp = if low > 0.0 {
        one_pole(data, fs, low, Pole::High)
    } else {
        data.to_vec()
    };
    if high > 0.0 && high < fs * 0.5 {
        one_pole(&hp, fs, high, Pole::Low)
    } else {
        hp
    }
}

/// [`diff`] padded with a leading 0 to keep the input length.
fn derivative(data: &[f64]) -> Vec<f64> {
    std::iter::once(0.0)
        .chain(diff(data))
        .take(data.len())
        .collect()
}

/// Causal mean over the last `win` samples; the warm-up divides by `win` too.
fn moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if win <= 1 {
        return data.to_vec();
    }
    let scale = win as f64;
    data.iter()
        .enumerate()
        .scan(0.0, |acc, (i, &x)| {
            *acc += x;
            if let Some(old) = i.checked_sub(win) {
                *acc -= data[old];
            }
            Some(*acc / scale)
        })
        .collect()
}

/// Running signal and noise levels of the integrated energy.
#[derive(Debug, Clone, Copy)]
struct AdaptiveThreshold {
    signal: f64,
    noise: f64,
    scale: f64,
}

impl AdaptiveThreshold {
    fn new(initial: f64, scale: f64) -> Self {
        Self {
            signal: initial,
            noise: initial * 0.5,
            scale,
        }
    }

    fn level(&self) -> f64 {
        self.noise + self.scale * (self.signal - self.noise).max(0.0)
    }

    fn push_signal(&mut self, sample: f64) {
        self.signal = 0.125 * sample + 0.875 * self.signal;
    }

    fn push_noise(&mut self, sample: f64) {
        self.noise = 0.125 * sample + 0.875 * self.noise;
    }
}

/// Index of the first maximum of `data[start..=end]`.
fn first_argmax(data: &[f64], start: usize, end: usize) -> usize {
    data[start..=end]
        .iter()
        .enumerate()
        .fold((start, f64::MIN), |best, (j, &value)| {
            if value > best.1 {
                (start + j, value)
            } else {
                best
            }
        })
        .0
}

fn pick_peaks(bandpassed: &[f64], envelope: &[f64], fs: f64, cfg: &PanTompkinsConfig) -> Vec<usize> {
    if bandpassed.is_empty() || envelope.is_empty() {
        return Vec::new();
    }
    let refractory = samples(cfg.min_rr_s, fs);
    let search = samples(cfg.search_back_s, fs);

    // Levels start from the mean of the first second.
    let init = envelope.len().min((fs as usize).max(1));
    let mean = envelope[..init].iter().sum::<f64>() / init as f64;
    let mut threshold = AdaptiveThreshold::new(mean, cfg.threshold_scale);
    let mut last_detection: Option<usize> = None;
    let mut peaks = Vec::new();

    for (i, &sample) in envelope.iter().enumerate() {
        let clear = last_detection.map_or(true, |last| i - last >= refractory);
        if clear && sample >= threshold.level() {
            let end = i.min(bandpassed.len() - 1);
            peaks.push(first_argmax(bandpassed, i.saturating_sub(search).min(end), end));
            last_detection = Some(i);
            threshold.push_signal(sample);
        } else {
            threshold.push_noise(sample);
        }
    }

    peaks.sort_unstable();
    peaks.dedup();
    peaks
}

/// Positive local maxima of the detrended lead, one per refractory period.
///
/// The trend is the moving average over the integration window.
fn fallback_peak_picker(data: &[f64], fs: f64, cfg: &PanTompkinsConfig) -> Vec<usize> {
    if data.len() < 3 {
        return Vec::new();
    }
    let min_gap = samples(cfg.min_rr_s, fs);
    let trend = moving_average(data, samples(cfg.integration_window_s, fs));
    let detrended: Vec<f64> = data.iter().zip(&trend).map(|(x, m)| x - m).collect();

    let mut peaks: Vec<usize> = Vec::new();
    for (offset, w) in detrended.windows(3).enumerate() {
        let i = offset + 1;
        let is_peak = w[1] > 0.0 && w[1] > w[0] && w[1] > w[2];
        if is_peak && peaks.last().map_or(true, |&last| i - last >= min_gap) {
            peaks.push(i);
        }
    }
    peaks
}

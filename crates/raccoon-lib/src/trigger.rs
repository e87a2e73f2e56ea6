//! Conversions between trigger points and trigger signals.
//!
//! A trigger signal carries one value per sample; high values mark QRS
//! regions. Decoding thresholds it, closes short gaps ("ripple"), and reports
//! the centre of every remaining spike.

use std::borrow::Cow;

use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Half-open `(begin, end)` range of a run of high samples.
pub type Spike = (usize, usize);

/// Parameters for turning a trigger signal into trigger points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Samples `>= threshold` count as high.
    pub threshold: f64,
    /// Longest run of low samples between two spikes that still merges them.
    pub tolerance: usize,
    /// Spikes narrower than this are dropped.
    pub min_width: usize,
    /// Min-max normalize before thresholding.
    pub normalize: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            tolerance: 3,
            min_width: 0,
            normalize: false,
        }
    }
}

/// Min-max scale to `[0, 1]`. A constant signal maps to all zeros.
pub fn normalize<T: Float>(signal: &[T]) -> Vec<T> {
    let (min, max) = signal
        .iter()
        .fold((T::infinity(), T::neg_infinity()), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });
    let range = max - min;
    if signal.is_empty() || !(range > T::zero()) {
        return vec![T::zero(); signal.len()];
    }
    signal.iter().map(|&x| (x - min) / range).collect()
}

pub fn discretize<T: Float>(signal: &[T], threshold: T) -> Vec<bool> {
    signal.iter().map(|&x| x >= threshold).collect()
}

/// Single-pass ripple removal over a discretized signal.
///
/// Whenever sample `i` and sample `i + tolerance + 1` are both high, the
/// samples in between are raised before they are yielded. Gaps of up to
/// `tolerance` low samples disappear.
#[derive(Debug, Clone)]
pub struct RemoveRipple {
    signal: Vec<bool>,
    span: usize,
    idx: usize,
}

pub fn remove_ripple(signal: Vec<bool>, tolerance: usize) -> RemoveRipple {
    RemoveRipple {
        signal,
        span: tolerance + 1,
        idx: 0,
    }
}

impl Iterator for RemoveRipple {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        let idx = self.idx;
        let high = *self.signal.get(idx)?;
        self.idx += 1;
        let ahead = idx + self.span;
        if high && ahead < self.signal.len() && self.signal[ahead] {
            self.signal[idx..ahead].fill(true);
        }
        Some(high)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.signal.len() - self.idx;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RemoveRipple {}

/// Maximal runs of high samples.
///
/// Equivalent to the rising (+1) and falling (-1) edges of the first
/// difference of the signal padded with a low sample on each side.
pub fn signal_to_spikes<I>(signal: I) -> Vec<Spike>
where
    I: IntoIterator<Item = bool>,
{
    let mut spikes = Vec::new();
    let mut begin = None;
    let mut len = 0;
    for (idx, high) in signal.into_iter().enumerate() {
        match (high, begin) {
            (true, None) => begin = Some(idx),
            (false, Some(start)) => {
                spikes.push((start, idx));
                begin = None;
            }
            _ => {}
        }
        len = idx + 1;
    }
    if let Some(start) = begin {
        spikes.push((start, len));
    }
    spikes
}

/// Spike centres, rounded down.
pub fn spikes_to_points(spikes: &[Spike]) -> Vec<usize> {
    spikes.iter().map(|&(begin, end)| (begin + end) / 2).collect()
}

/// Mean of `signal` over the spike range.
pub fn spike_certainty<T: Float>(spike: Spike, signal: &[T]) -> T {
    let (begin, end) = spike;
    let end = end.min(signal.len());
    if end <= begin {
        return T::zero();
    }
    let sum = signal[begin..end].iter().fold(T::zero(), |acc, &x| acc + x);
    sum / T::from(end - begin).unwrap_or_else(T::one)
}

pub fn spikes_to_certainties<T: Float>(spikes: &[Spike], signal: &[T]) -> Vec<T> {
    spikes
        .iter()
        .map(|&spike| spike_certainty(spike, signal))
        .collect()
}

fn decode<'a, T: Float>(signal: &'a [T], cfg: &DecoderConfig) -> (Vec<Spike>, Cow<'a, [T]>) {
    let reference: Cow<'a, [T]> = if cfg.normalize {
        Cow::Owned(normalize(signal))
    } else {
        Cow::Borrowed(signal)
    };
    let threshold = T::from(cfg.threshold).unwrap_or_else(T::zero);
    let discretized = discretize(&reference, threshold);
    let spikes = signal_to_spikes(remove_ripple(discretized, cfg.tolerance))
        .into_iter()
        .filter(|&(begin, end)| end - begin >= cfg.min_width)
        .collect();
    (spikes, reference)
}

/// Trigger points of a trigger signal.
pub fn signal_to_points<T: Float>(signal: &[T], cfg: &DecoderConfig) -> Vec<usize> {
    let (spikes, _) = decode(signal, cfg);
    spikes_to_points(&spikes)
}

/// Trigger points plus, per point, the mean signal value over its spike.
///
/// Certainties are measured on the normalized signal when `cfg.normalize` is
/// set and on the raw signal otherwise.
pub fn signal_to_points_with_certainty<T: Float>(
    signal: &[T],
    cfg: &DecoderConfig,
) -> (Vec<usize>, Vec<T>) {
    let (spikes, reference) = decode(signal, cfg);
    let certainties = spikes_to_certainties(&spikes, &reference);
    (spikes_to_points(&spikes), certainties)
}

/// Synthesize a 0/1 trigger signal with a run of `window_size` ones around
/// every point.
///
/// A run starts `window_size / 2` samples before its point, clipped at zero,
/// and is cut at the end of the signal.
pub fn points_to_signal(points: &[usize], signal_length: usize, window_size: usize) -> Vec<f64> {
    let mut signal = vec![0.0; signal_length];
    for &point in points {
        let start = point.saturating_sub(window_size / 2);
        let end = (start + window_size).min(signal_length);
        if start < end {
            signal[start..end].fill(1.0);
        }
    }
    signal
}

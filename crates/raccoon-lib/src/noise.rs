//! Contaminating clean signals with noise templates at a target SNR.

use anyhow::{ensure, Result};

/// Mean power of a signal.
pub fn power(signal: &[f64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    signal.iter().map(|x| x * x).sum::<f64>() / signal.len() as f64
}

/// Signal-to-noise ratio.
pub fn snr(signal: &[f64], noise: &[f64]) -> f64 {
    power(signal) / power(noise)
}

/// Signal-to-noise ratio in decibel.
pub fn snrdb(signal: &[f64], noise: &[f64]) -> f64 {
    snr_to_snrdb(snr(signal, noise))
}

pub fn snr_to_snrdb(snr: f64) -> f64 {
    10.0 * snr.log10()
}

pub fn snrdb_to_snr(snrdb: f64) -> f64 {
    10f64.powf(snrdb / 10.0)
}

pub fn scale(signal: &[f64], ratio: f64) -> Vec<f64> {
    signal.iter().map(|x| x * ratio).collect()
}

/// Repeats `signal` until it is `length` samples long.
pub fn repeat_until(signal: &[f64], length: usize) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    signal.iter().copied().cycle().take(length).collect()
}

/// Brings all signals to the longest length by repeating the shorter ones,
/// then adds them sample by sample.
pub fn add_repeating(signals: &[&[f64]]) -> Vec<f64> {
    let length = signals.iter().map(|s| s.len()).max().unwrap_or(0);
    let mut sum = vec![0.0; length];
    for signal in signals {
        for (acc, x) in sum.iter_mut().zip(repeat_until(signal, length)) {
            *acc += x;
        }
    }
    sum
}

/// Adds `noise` to `signal`, scaled so the result has `target_snr`.
///
/// A noise template longer than the signal is truncated first; a shorter one
/// is repeated.
pub fn apply_noise(signal: &[f64], noise: &[f64], target_snr: f64) -> Result<Vec<f64>> {
    ensure!(!signal.is_empty(), "signal is empty");
    ensure!(target_snr > 0.0, "target SNR must be positive, got {target_snr}");
    let noise = &noise[..noise.len().min(signal.len())];
    let noise_power = power(noise);
    ensure!(noise_power > 0.0, "noise template has zero power");
    let ratio = (power(signal) / noise_power / target_snr).sqrt();
    let scaled = scale(noise, ratio);
    Ok(add_repeating(&[signal, &scaled]))
}

/// Like [`apply_noise`], with the target given in decibel.
pub fn apply_noise_db(signal: &[f64], noise: &[f64], target_snrdb: f64) -> Result<Vec<f64>> {
    apply_noise(signal, noise, snrdb_to_snr(target_snrdb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn power_and_snr() {
        assert_eq!(power(&[-1.0, 3.0, 2.0, -2.0]), 4.5);
        let ratio = snr(&[1.0, 2.0, 3.0, 2.0, 1.0], &[1.0, 2.0, 1.0]);
        assert!((ratio - 1.9).abs() < 1e-12);
        assert!((snr_to_snrdb(100.0) - 20.0).abs() < 1e-12);
        assert!((snrdb_to_snr(20.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn repeating_and_adding() {
        assert_eq!(scale(&[1.0, 2.0, 3.0], 2.0), vec![2.0, 4.0, 6.0]);
        assert_eq!(
            repeat_until(&[1.0, 2.0, 3.0], 7),
            vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]
        );
        assert_eq!(
            add_repeating(&[
                &[1.0, 2.0, 3.0, 4.0],
                &[5.0, 6.0, 7.0],
                &[8.0, 9.0, 10.0, 11.0]
            ]),
            vec![14.0, 17.0, 20.0, 20.0]
        );
    }

    #[test]
    fn applied_noise_hits_target_snr() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let signal: Vec<f64> = (0..100).map(|_| rng.gen_range(0..100) as f64).collect();
            let noise: Vec<f64> = (0..20).map(|_| rng.gen_range(1..100) as f64).collect();
            let target = rng.gen_range(1..=10) as f64;
            let noisy = apply_noise(&signal, &noise, target).unwrap();
            assert_eq!(noisy.len(), signal.len());
            let added: Vec<f64> = noisy.iter().zip(&signal).map(|(n, s)| n - s).collect();
            assert!((snr(&signal, &added) - target).abs() < 1e-6);
        }
    }

    #[test]
    fn long_noise_is_truncated() {
        let signal = vec![1.0, -1.0, 2.0, -2.0];
        let noise = vec![0.5; 10];
        let noisy = apply_noise_db(&signal, &noise, 6.0).unwrap();
        assert_eq!(noisy.len(), 4);
        let added: Vec<f64> = noisy.iter().zip(&signal).map(|(n, s)| n - s).collect();
        assert!((snrdb(&signal, &added) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_silent_noise() {
        assert!(apply_noise(&[1.0, 2.0], &[0.0, 0.0], 2.0).is_err());
        assert!(apply_noise(&[1.0, 2.0], &[1.0], 0.0).is_err());
        assert!(apply_noise(&[], &[1.0], 1.0).is_err());
    }
}

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Detection counts for one or more records.
///
/// `tn` is always zero for point detection; it is kept so reports carry the
/// full confusion matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl Confusion {
    pub fn sensitivity(&self) -> f64 {
        sensitivity(self.tp, self.fn_)
    }

    pub fn ppv(&self) -> f64 {
        ppv(self.tp, self.fp)
    }

    pub fn f1(&self) -> f64 {
        f1(self.tp, self.fp, self.fn_)
    }
}

impl Add for Confusion {
    type Output = Confusion;

    fn add(self, rhs: Confusion) -> Confusion {
        Confusion {
            tp: self.tp + rhs.tp,
            tn: self.tn + rhs.tn,
            fp: self.fp + rhs.fp,
            fn_: self.fn_ + rhs.fn_,
        }
    }
}

impl AddAssign for Confusion {
    fn add_assign(&mut self, rhs: Confusion) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Confusion {
    fn sum<I: Iterator<Item = Confusion>>(iter: I) -> Confusion {
        iter.fold(Confusion::default(), Add::add)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchKind {
    Tp,
    Fp,
    Fn,
}

/// One entry of [`merge`]: a true point, a detected point, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub actual: Option<usize>,
    pub detected: Option<usize>,
    pub kind: MatchKind,
}

fn within(a: usize, b: usize, tolerance: usize) -> bool {
    a.abs_diff(b) <= tolerance
}

/// Compares detected trigger points against the true ones.
///
/// A true point with at least one detection within `tolerance` samples is a
/// true positive and every further detection near it a false positive. True
/// points without a detection are false negatives, and detections near no
/// true point are false positives.
pub fn trigger_metrics(actual: &[usize], detected: &[usize], tolerance: usize) -> Confusion {
    let mut confusion = Confusion::default();
    for &point in actual {
        let matches = detected
            .iter()
            .filter(|&&d| within(point, d, tolerance))
            .count();
        if matches == 0 {
            confusion.fn_ += 1;
        } else {
            confusion.tp += 1;
            confusion.fp += matches - 1;
        }
    }
    confusion.fp += detected
        .iter()
        .filter(|&&d| !actual.iter().any(|&a| within(a, d, tolerance)))
        .count();
    confusion
}

/// Sums [`trigger_metrics`] over paired records.
pub fn triggers_metrics(
    actual: &[Vec<usize>],
    detected: &[Vec<usize>],
    tolerance: usize,
) -> Confusion {
    actual
        .iter()
        .zip(detected)
        .map(|(a, d)| trigger_metrics(a, d, tolerance))
        .sum()
}

/// Per-point version of [`trigger_metrics`]: the nearest detection of every
/// true point is its match, the remaining nearby detections are false
/// positives attributed to it.
pub fn merge(actual: &[usize], detected: &[usize], tolerance: usize) -> Vec<Match> {
    let mut merged = Vec::new();
    for &point in actual {
        let mut matches: Vec<usize> = detected
            .iter()
            .copied()
            .filter(|&d| within(point, d, tolerance))
            .collect();
        if matches.is_empty() {
            merged.push(Match {
                actual: Some(point),
                detected: None,
                kind: MatchKind::Fn,
            });
            continue;
        }
        matches.sort_by_key(|&d| d.abs_diff(point));
        merged.extend(matches.iter().enumerate().map(|(rank, &d)| Match {
            actual: Some(point),
            detected: Some(d),
            kind: if rank == 0 { MatchKind::Tp } else { MatchKind::Fp },
        }));
    }
    merged.extend(
        detected
            .iter()
            .filter(|&&d| !actual.iter().any(|&a| within(a, d, tolerance)))
            .map(|&d| Match {
                actual: None,
                detected: Some(d),
                kind: MatchKind::Fp,
            }),
    );
    merged
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        f64::NAN
    } else {
        numerator as f64 / denominator as f64
    }
}

pub fn sensitivity(tp: usize, fn_: usize) -> f64 {
    ratio(tp, tp + fn_)
}

/// Positive predictive value.
pub fn ppv(tp: usize, fp: usize) -> f64 {
    ratio(tp, tp + fp)
}

pub fn f1(tp: usize, fp: usize, fn_: usize) -> f64 {
    ratio(2 * tp, 2 * tp + fp + fn_)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_over_records() {
        let actual = vec![vec![10, 55, 80, 100], vec![25, 70, 92], vec![11, 36, 49, 78, 99]];
        let detected = vec![vec![10, 11, 85, 95, 106], vec![11, 26, 65], vec![11, 30, 33, 36, 40]];
        let confusion = triggers_metrics(&actual, &detected, 5);
        assert_eq!(
            confusion,
            Confusion {
                tp: 7,
                tn: 0,
                fp: 6,
                fn_: 5
            }
        );
        assert_eq!(
            trigger_metrics(&actual[0], &detected[0], 5),
            Confusion {
                tp: 3,
                tn: 0,
                fp: 2,
                fn_: 1
            }
        );
    }

    #[test]
    fn tolerance_changes_matches() {
        let confusion = trigger_metrics(&[100], &[106], 5);
        assert_eq!((confusion.tp, confusion.fp, confusion.fn_), (0, 1, 1));
        let confusion = trigger_metrics(&[100], &[106], 6);
        assert_eq!((confusion.tp, confusion.fp, confusion.fn_), (1, 0, 0));
    }

    #[test]
    fn merge_classifies_each_point() {
        let merged = merge(&[10, 55, 100], &[12, 11, 95, 106], 5);
        assert_eq!(
            merged,
            vec![
                Match { actual: Some(10), detected: Some(11), kind: MatchKind::Tp },
                Match { actual: Some(10), detected: Some(12), kind: MatchKind::Fp },
                Match { actual: Some(55), detected: None, kind: MatchKind::Fn },
                Match { actual: Some(100), detected: Some(95), kind: MatchKind::Tp },
                Match { actual: None, detected: Some(106), kind: MatchKind::Fp },
            ]
        );
        let counts = merged.iter().fold(Confusion::default(), |mut c, m| {
            match m.kind {
                MatchKind::Tp => c.tp += 1,
                MatchKind::Fp => c.fp += 1,
                MatchKind::Fn => c.fn_ += 1,
            }
            c
        });
        assert_eq!(counts, trigger_metrics(&[10, 55, 100], &[12, 11, 95, 106], 5));
    }

    #[test]
    fn ratios() {
        assert!((sensitivity(3, 7) - 0.3).abs() < 1e-12);
        assert!((ppv(3, 7) - 0.3).abs() < 1e-12);
        assert!((f1(3, 7, 7) - 0.3).abs() < 1e-12);
        assert!(sensitivity(0, 0).is_nan());
        assert!(ppv(0, 0).is_nan());
        assert!(f1(0, 0, 0).is_nan());
        let c = Confusion { tp: 3, tn: 0, fp: 7, fn_: 7 };
        assert!((c.f1() - 0.3).abs() < 1e-12);
    }
}

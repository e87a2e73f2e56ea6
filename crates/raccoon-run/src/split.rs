//! Cross-validation splits over record indices.

use anyhow::{ensure, Result};
use std::collections::BTreeSet;

/// Record indices used for training and for testing in one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

pub trait Splitter {
    fn splits(&self, n_records: usize) -> Result<Vec<Split>>;

    fn describe(&self) -> String;
}

fn complement(n: usize, test: &[usize]) -> Vec<usize> {
    (0..n).filter(|i| !test.contains(i)).collect()
}

/// `k` contiguous folds in record order; the first `n % k` folds hold one
/// extra record.
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    pub k: usize,
}

impl Splitter for KFold {
    fn splits(&self, n: usize) -> Result<Vec<Split>> {
        ensure!(self.k >= 2, "k-fold needs at least 2 folds, got {}", self.k);
        ensure!(
            self.k <= n,
            "cannot split {} records into {} folds",
            n,
            self.k
        );
        let (base, extra) = (n / self.k, n % self.k);
        let mut start = 0;
        let mut splits = Vec::with_capacity(self.k);
        for fold in 0..self.k {
            let size = base + usize::from(fold < extra);
            let test: Vec<usize> = (start..start + size).collect();
            splits.push(Split {
                train: complement(n, &test),
                test,
            });
            start += size;
        }
        Ok(splits)
    }

    fn describe(&self) -> String {
        format!("KFold(k={})", self.k)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeaveOneOut;

impl Splitter for LeaveOneOut {
    fn splits(&self, n: usize) -> Result<Vec<Split>> {
        ensure!(n >= 2, "leave-one-out needs at least 2 records, got {}", n);
        Ok((0..n)
            .map(|i| Split {
                train: complement(n, &[i]),
                test: vec![i],
            })
            .collect())
    }

    fn describe(&self) -> String {
        "LeaveOneOut".into()
    }
}

/// Explicit fold per record; `None` keeps a record in every training set.
#[derive(Debug, Clone)]
pub struct PredefinedSplit {
    pub test_fold: Vec<Option<usize>>,
}

impl PredefinedSplit {
    /// One split testing on the records whose names are in `test_records`.
    pub fn from_test_records(records: &[String], test_records: &[String]) -> Self {
        Self {
            test_fold: records
                .iter()
                .map(|r| test_records.contains(r).then_some(0))
                .collect(),
        }
    }
}

impl Splitter for PredefinedSplit {
    fn splits(&self, n: usize) -> Result<Vec<Split>> {
        ensure!(
            self.test_fold.len() == n,
            "predefined split covers {} records, but {} are loaded",
            self.test_fold.len(),
            n
        );
        let folds: BTreeSet<usize> = self.test_fold.iter().flatten().copied().collect();
        ensure!(!folds.is_empty(), "predefined split has no test records");
        Ok(folds
            .into_iter()
            .map(|fold| {
                let test: Vec<usize> = (0..n)
                    .filter(|&i| self.test_fold[i] == Some(fold))
                    .collect();
                Split {
                    train: complement(n, &test),
                    test,
                }
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!("PredefinedSplit(test_fold={:?})", self.test_fold)
    }
}

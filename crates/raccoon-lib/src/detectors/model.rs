use anyhow::{Context, Result};
use log::debug;
use ndarray::{ArrayD, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::windowing::{Batch, BatchSequence};

/// A trainable window classifier: one probability per example.
pub trait TriggerModel: Send {
    fn fit(&mut self, data: &dyn BatchSequence, epochs: usize) -> Result<()>;

    /// One prediction per example, batches in order.
    fn predict(&self, data: &dyn BatchSequence) -> Result<Vec<f64>>;

    fn save(&self, path: &Path) -> Result<()>;

    /// Drop all learned parameters.
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticConfig {
    pub learning_rate: f64,
    /// L2 penalty on the weights.
    pub l2: f64,
    /// Weight positive examples by the negative/positive ratio of the
    /// training labels.
    pub balance_classes: bool,
    pub seed: u64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            l2: 1e-4,
            balance_classes: true,
            seed: 0,
        }
    }
}

/// Logistic regression over the concatenated, flattened inputs of each
/// example, trained with shuffled mini-batch SGD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    config: LogisticConfig,
    weights: Vec<f64>,
    bias: f64,
}

fn features(inputs: &[ArrayD<f64>], example: usize) -> Vec<f64> {
    inputs
        .iter()
        .flat_map(|input| input.index_axis(Axis(0), example).iter().copied().collect::<Vec<_>>())
        .collect()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticModel {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            bias: 0.0,
        }
    }

    pub fn is_trained(&self) -> bool {
        !self.weights.is_empty()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid model in {}", path.display()))
    }

    fn score(&self, x: &[f64]) -> Result<f64> {
        if x.len() != self.weights.len() {
            anyhow::bail!(
                "model expects {} features per example, got {}",
                self.weights.len(),
                x.len()
            );
        }
        let z = self.bias + self.weights.iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
        Ok(sigmoid(z))
    }

    fn positive_weight(&self, data: &dyn BatchSequence) -> Result<f64> {
        if !self.config.balance_classes {
            return Ok(1.0);
        }
        let (mut positives, mut total) = (0usize, 0usize);
        for index in 0..data.len() {
            if let Some(labels) = data.batch(index)?.labels {
                positives += labels.iter().filter(|&&l| l >= 0.5).count();
                total += labels.len();
            }
        }
        if positives == 0 {
            return Ok(1.0);
        }
        Ok((total - positives).max(1) as f64 / positives as f64)
    }

    fn step(&mut self, batch: &Batch, positive_weight: f64) -> Result<()> {
        let labels = batch
            .labels
            .as_ref()
            .context("training batch has no labels")?;
        let n = batch.size();
        if n == 0 {
            return Ok(());
        }
        let mut grad_w = vec![0.0; self.weights.len()];
        let mut grad_b = 0.0;
        for (example, &label) in labels.iter().enumerate().take(n) {
            let x = features(&batch.inputs, example);
            let weight = if label >= 0.5 { positive_weight } else { 1.0 };
            let error = weight * (self.score(&x)? - label);
            for (g, v) in grad_w.iter_mut().zip(&x) {
                *g += error * v;
            }
            grad_b += error;
        }
        let rate = self.config.learning_rate / n as f64;
        for (w, g) in self.weights.iter_mut().zip(&grad_w) {
            *w -= rate * g + self.config.learning_rate * self.config.l2 * *w;
        }
        self.bias -= rate * grad_b;
        Ok(())
    }
}

impl TriggerModel for LogisticModel {
    fn fit(&mut self, data: &dyn BatchSequence, epochs: usize) -> Result<()> {
        if data.is_empty() {
            anyhow::bail!("no complete training batch");
        }
        if !self.is_trained() {
            let first = data.batch(0)?;
            self.weights = vec![0.0; features(&first.inputs, 0).len()];
            self.bias = 0.0;
        }
        let positive_weight = self.positive_weight(data)?;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut order: Vec<usize> = (0..data.len()).collect();
        for epoch in 0..epochs {
            order.shuffle(&mut rng);
            for &index in &order {
                self.step(&data.batch(index)?, positive_weight)?;
            }
            debug!("epoch {}/{} done over {} batches", epoch + 1, epochs, order.len());
        }
        Ok(())
    }

    fn predict(&self, data: &dyn BatchSequence) -> Result<Vec<f64>> {
        if !self.is_trained() {
            anyhow::bail!("model has not been trained");
        }
        let mut out = Vec::new();
        for index in 0..data.len() {
            let batch = data.batch(index)?;
            for example in 0..batch.size() {
                out.push(self.score(&features(&batch.inputs, example))?);
            }
        }
        Ok(out)
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    fn reset(&mut self) {
        self.weights.clear();
        self.bias = 0.0;
    }
}

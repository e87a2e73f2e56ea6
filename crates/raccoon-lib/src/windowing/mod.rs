//! Windowed views over chunked signals.
//!
//! A chunk collection is addressed through a flat window index that runs over
//! every usable window of every chunk in order. The generators in this module
//! translate that index into `(chunk, offset)` pairs, slice the windows, and
//! derive labels from trigger points.

pub mod error;
pub mod index;
pub mod label;
pub mod multi;
pub mod single;
pub mod window;

use ndarray::{Array1, ArrayD};

pub use error::WindowError;
pub use index::{IndexPair, WindowLayout};
pub use label::LabelGenerator;
pub use multi::{MultiSignalWindowGenerator, RescalePolicy};
pub use single::SingleSignalWindowGenerator;
pub use window::WindowGenerator;

/// One model-ready batch: one input array per signal collection and, in
/// training mode, one label per example.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub inputs: Vec<ArrayD<f64>>,
    pub labels: Option<Array1<f64>>,
}

impl Batch {
    /// Number of examples in the batch.
    pub fn size(&self) -> usize {
        self.inputs
            .first()
            .map(|input| input.shape().first().copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

/// Indexed, finite source of batches.
///
/// Implementations are read-only after construction, so disjoint batches can
/// be requested from several threads at once.
pub trait BatchSequence: Send + Sync {
    /// Number of full batches.
    fn len(&self) -> usize;

    /// Returns batch `index`, failing with a bounds error for `index >= len()`.
    fn batch(&self, index: usize) -> Result<Batch, WindowError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub mod detectors;
pub mod io;
pub mod metrics;
pub mod noise;
pub mod plot;
pub mod signal;
pub mod trigger;
pub mod windowing;

pub use detectors::*;
pub use metrics::*;
pub use signal::*;
pub use windowing::*;

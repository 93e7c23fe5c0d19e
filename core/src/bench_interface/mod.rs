pub mod instruments;
pub mod sweep;
pub mod verdict;
pub mod waveform;

pub use instruments::{NetworkAnalyzer, Oscilloscope, RelayTransport, SweepRequest};
pub use sweep::{
    ImpedancePoint, ImpedanceSweep, ReflectionPoint, SParameter, SParameterSweep, SweepScale,
};
pub use verdict::{ElementCondition, Measurement, Verdict};
pub use waveform::{Spectrum, Waveform};

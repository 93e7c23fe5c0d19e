pub mod capacitance;
pub mod impedance;
pub mod pulse_echo;
pub mod routing;
pub mod spectral;
pub mod verdict;
pub mod window;

pub use capacitance::{CapacitanceReading, CapacitanceSettings, CapacitanceStage};
pub use impedance::{classify_capacitance, ExcludedPoint, ImpedanceConverter};
pub use pulse_echo::{PulseEchoFeatures, PulseEchoStage};
pub use routing::{ChannelClass, ChannelRouter, RelaySelector};
pub use spectral::{Band, Smoothing, SpectralFeatureExtractor};
pub use verdict::VerdictEngine;
pub use window::WaveformWindow;

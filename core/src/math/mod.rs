pub mod fft;
pub mod filter;
pub mod stats;

pub use fft::FftHelper;
pub use filter::ZeroPhaseLowpass;
pub use stats::StatsHelper;

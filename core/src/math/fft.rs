use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Helper that wraps the `rustfft` planner for real-valued input.
pub struct FftHelper {
    fft: Arc<dyn Fft<f64>>,
    size: usize,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self { fft, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Full complex transform; input is zero-padded or truncated to the plan size.
    pub fn forward(&self, input: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = input
            .iter()
            .take(self.size)
            .map(|&value| Complex64::new(value, 0.0))
            .collect();
        buffer.resize(self.size, Complex64::zero());

        self.fft.process(&mut buffer);
        buffer
    }

    /// Magnitudes of the non-negative frequency bins, `size / 2 + 1` of them.
    pub fn real_magnitudes(&self, input: &[f64]) -> Vec<f64> {
        let transformed = self.forward(input);
        transformed
            .iter()
            .take(self.size / 2 + 1)
            .map(|c| c.norm())
            .collect()
    }

    /// Bin centre frequencies matching `real_magnitudes`, spaced `1 / (n·dt)`.
    pub fn real_frequencies(size: usize, sample_interval: f64) -> Vec<f64> {
        let spacing = 1.0 / (size as f64 * sample_interval);
        (0..=size / 2).map(|k| k as f64 * spacing).collect()
    }
}

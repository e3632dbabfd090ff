use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Reusable forward FFT of a fixed size.
pub struct FftHelper {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex32>,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size.max(1));
        let buffer = vec![Complex32::zero(); size.max(1)];
        Self { fft, buffer }
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Transforms a real signal, zero-padding or truncating it to the plan size.
    pub fn forward(&mut self, input: &[f32]) -> &[Complex32] {
        for (slot, value) in self.buffer.iter_mut().enumerate() {
            *value = Complex32::new(input.get(slot).copied().unwrap_or(0.0), 0.0);
        }
        self.fft.process(&mut self.buffer);
        &self.buffer
    }

    /// Magnitudes of the first `bins` outputs, scaled by the plan size.
    pub fn magnitudes(&mut self, input: &[f32], bins: usize) -> Vec<f32> {
        let scale = 1.0 / self.size() as f32;
        self.forward(input)
            .iter()
            .take(bins)
            .map(|c| c.norm() * scale)
            .collect()
    }
}

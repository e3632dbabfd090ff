use std::f32::consts::PI;

/// `length` samples of a sine completing `cycles` periods, starting at `phase`.
pub fn sine_wave(length: usize, cycles: f32, phase: f32) -> Vec<f32> {
    (0..length)
        .map(|i| ((i as f32 * cycles) / length as f32 * 2.0 * PI + phase).sin())
        .collect()
}

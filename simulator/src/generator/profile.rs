use crate::generator::template::sine_wave;
use handoffcore::envelope::{ChannelTag, SampleEnvelope};
use handoffcore::math::{FftHelper, StatsHelper};
use handoffcore::prelude::{ChannelLayout, ProducerResult};
use handoffcore::transport::{Producer, ProducerContext};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::time::Duration;

/// Configuration for the synthetic sensing process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Frame cadence of the producer.
    pub frame_interval_ms: u64,
    /// Range bin holding the simulated reflector.
    pub target_bin: usize,
    /// Vibration frequency of the reflector.
    pub vibration_hz: f32,
    /// Peak displacement, in radians of phase.
    pub amplitude: f32,
    pub noise: f32,
    pub seed: u64,
    /// Stop after this many frames; runs until told to stop when absent.
    pub frames: Option<u64>,
    /// Emit a truncated range spectrum every N frames.
    pub fault_every: Option<u64>,
    pub description: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 20,
            target_bin: 8,
            vibration_hz: 2.0,
            amplitude: 0.3,
            noise: 0.03,
            seed: 0,
            frames: None,
            fault_every: None,
            description: None,
        }
    }
}

impl GeneratorConfig {
    fn frame_seconds(&self) -> f32 {
        self.frame_interval_ms.max(1) as f32 / 1000.0
    }
}

/// Emulates the radar front end: one range spectrum, one phase sample, one
/// vibration spectrum and one MRF value per frame, shaped by the agreed layout.
pub struct SyntheticProducer {
    config: GeneratorConfig,
    layout: ChannelLayout,
    rng: StdRng,
    range_fft: Option<FftHelper>,
    phase_fft: Option<FftHelper>,
    phase_history: VecDeque<f32>,
}

impl SyntheticProducer {
    pub fn new(config: GeneratorConfig, layout: ChannelLayout) -> Self {
        let range_fft = layout
            .spec(ChannelTag::Fft)
            .map(|spec| FftHelper::new(spec.len * 2));
        let history_len = layout.spec(ChannelTag::Freq).map_or(0, |spec| spec.len * 2);
        let phase_fft = layout
            .spec(ChannelTag::Freq)
            .map(|_| FftHelper::new(history_len));

        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            layout,
            range_fft,
            phase_fft,
            phase_history: std::iter::repeat(0.0).take(history_len).collect(),
        }
    }

    fn jitter(&mut self) -> f32 {
        if self.config.noise > 0.0 {
            self.rng.gen_range(-self.config.noise..self.config.noise)
        } else {
            0.0
        }
    }

    /// Computes every envelope for one frame, in emission order.
    pub fn build_frame(&mut self, frame: u64) -> Vec<SampleEnvelope> {
        let mut envelopes = Vec::with_capacity(4);
        let t = frame as f32 * self.config.frame_seconds();
        let displacement = self.config.amplitude * (2.0 * PI * self.config.vibration_hz * t).sin();

        let mut range_peak = None;
        if let Some(spec) = self.layout.spec(ChannelTag::Fft).copied() {
            let mut beat = sine_wave(spec.len * 2, self.config.target_bin as f32, displacement);
            for sample in beat.iter_mut() {
                *sample += self.jitter();
            }
            if let Some(fft) = self.range_fft.as_mut() {
                let mut spectrum = fft.magnitudes(&beat, spec.len);
                range_peak = StatsHelper::peak(&spectrum, 0);
                if let Some(every) = self.config.fault_every.filter(|every| *every > 0) {
                    if frame % every == every - 1 {
                        spectrum.truncate(spec.len / 2);
                    }
                }
                envelopes.push(SampleEnvelope::new(ChannelTag::Fft, spectrum));
            }
        }

        let phase = displacement + self.jitter();
        if self.layout.contains(ChannelTag::Phase) {
            envelopes.push(SampleEnvelope::scalar(ChannelTag::Phase, phase));
        }

        if let Some(spec) = self.layout.spec(ChannelTag::Freq).copied() {
            self.phase_history.pop_front();
            self.phase_history.push_back(phase);
            let mean = self.phase_history.iter().sum::<f32>() / self.phase_history.len() as f32;
            let centred: Vec<f32> = self.phase_history.iter().map(|v| v - mean).collect();
            if let Some(fft) = self.phase_fft.as_mut() {
                let spectrum = fft.magnitudes(&centred, spec.len);
                envelopes.push(SampleEnvelope::new(ChannelTag::Freq, spectrum));
            }
        }

        if self.layout.contains(ChannelTag::Mrf) {
            let mrf = match range_peak {
                Some((bin, amplitude)) => amplitude * bin as f32 / 8.0,
                None => displacement.abs(),
            };
            envelopes.push(SampleEnvelope::scalar(ChannelTag::Mrf, mrf));
        }

        envelopes
    }
}

impl Producer for SyntheticProducer {
    fn name(&self) -> &str {
        "synthetic-sensor"
    }

    fn run(&mut self, ctx: &ProducerContext) -> ProducerResult<()> {
        self.rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(ctx.id() as u64));
        let period = Duration::from_millis(self.config.frame_interval_ms);
        let mut frame = 0u64;

        while !ctx.should_stop() {
            if self.config.frames.map_or(false, |limit| frame >= limit) {
                break;
            }
            for envelope in self.build_frame(frame) {
                ctx.emit(envelope)?;
            }
            frame += 1;
            if ctx.pace(period) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoffcore::prelude::ChannelSpec;

    fn layout() -> ChannelLayout {
        ChannelLayout::new(vec![
            ChannelSpec::new(ChannelTag::Fft, 32),
            ChannelSpec::new(ChannelTag::Freq, 16),
            ChannelSpec::new(ChannelTag::Phase, 64),
            ChannelSpec::new(ChannelTag::Mrf, 64),
        ])
        .unwrap()
    }

    #[test]
    fn generator_frames_match_layout() {
        let layout = layout();
        let mut producer = SyntheticProducer::new(GeneratorConfig::default(), layout.clone());
        let frame = producer.build_frame(0);
        let tags: Vec<ChannelTag> = frame.iter().map(|env| env.tag()).collect();
        assert_eq!(
            tags,
            vec![ChannelTag::Fft, ChannelTag::Phase, ChannelTag::Freq, ChannelTag::Mrf]
        );
        for envelope in &frame {
            assert!(layout.check(envelope).is_ok());
        }
    }

    #[test]
    fn range_spectrum_peaks_at_target_bin() {
        let config = GeneratorConfig {
            target_bin: 5,
            noise: 0.0,
            ..Default::default()
        };
        let mut producer = SyntheticProducer::new(config, layout());
        let frame = producer.build_frame(3);
        let fft = frame
            .iter()
            .find(|env| env.tag() == ChannelTag::Fft)
            .unwrap();
        assert_eq!(StatsHelper::peak(fft.values(), 0).map(|(bin, _)| bin), Some(5));
    }

    #[test]
    fn fault_injection_truncates_range_spectrum() {
        let config = GeneratorConfig {
            fault_every: Some(2),
            ..Default::default()
        };
        let layout = layout();
        let mut producer = SyntheticProducer::new(config, layout.clone());
        let healthy = producer.build_frame(0);
        let faulty = producer.build_frame(1);
        assert!(layout.check(&healthy[0]).is_ok());
        assert!(layout.check(&faulty[0]).is_err());
        assert_eq!(faulty[0].len(), 16);
    }

    #[test]
    fn layout_without_range_channel_still_emits_mrf() {
        let layout = ChannelLayout::new(vec![ChannelSpec::new(ChannelTag::Mrf, 4)]).unwrap();
        let mut producer = SyntheticProducer::new(GeneratorConfig::default(), layout);
        let frame = producer.build_frame(1);
        assert_eq!(frame.len(), 1);
        assert_eq!(frame[0].tag(), ChannelTag::Mrf);
    }
}

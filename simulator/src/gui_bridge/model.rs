use handoffcore::envelope::ChannelTag;
use handoffcore::math::StatsHelper;
use handoffcore::telemetry::DrainSnapshot;
use serde::{Deserialize, Serialize};

/// Leading vibration-spectrum bins ignored when picking the dominant frequency.
///
/// The reported bin is an index into the whole spectrum, not into the
/// slice after the skipped bins, so a peak at bin 25 is labelled `25`
/// rather than `5`.
pub const FREQ_PEAK_SKIP: usize = 20;
/// Leading bins ignored when scaling the vibration-spectrum axis.
pub const FREQ_SCALE_SKIP: usize = 18;

/// What a plot of one channel would show.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelView {
    pub tag: ChannelTag,
    pub generation: u64,
    pub values: Vec<f32>,
    pub y_range: (f32, f32),
    pub peak_bin: Option<usize>,
    pub label: String,
}

impl ChannelView {
    pub fn from_snapshot(tag: ChannelTag, generation: u64, values: Vec<f32>) -> Self {
        let (lo, hi) = StatsHelper::bounds(&values).unwrap_or((0.0, 0.0));
        let newest = values.last().copied().unwrap_or(0.0);

        let (y_range, peak_bin, label) = match tag {
            ChannelTag::Fft => {
                let peak = StatsHelper::peak(&values, 0).map(|(bin, _)| bin);
                let label = peak.map_or_else(|| "no data".to_string(), |bin| format!("max bin {}", bin));
                ((lo - 1.0, hi + 1.0), peak, label)
            }
            ChannelTag::Freq => {
                let peak = StatsHelper::peak(&values, FREQ_PEAK_SKIP).map(|(bin, _)| bin);
                let ceiling = values
                    .iter()
                    .skip(FREQ_SCALE_SKIP)
                    .copied()
                    .fold(1e-5_f32, f32::max);
                let label = peak.map_or_else(|| "Nothing".to_string(), |bin| bin.to_string());
                ((0.0, ceiling), peak, label)
            }
            ChannelTag::Phase => ((lo - 0.1, hi + 0.1), None, format!("phase {:.3}", newest)),
            ChannelTag::Mrf => ((lo - 1.0, hi + 1.0), None, format!("MRF: {:.2}", newest)),
        };

        Self {
            tag,
            generation,
            values,
            y_range,
            peak_bin,
            label,
        }
    }
}

/// Latest render state, served to external viewers.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VisualizationModel {
    /// Free-form run description from the generator config.
    pub description: Option<String>,
    pub tick: u64,
    pub channels: Vec<ChannelView>,
    pub drained: usize,
    pub rejected: usize,
    pub tick_failures: usize,
}

impl VisualizationModel {
    pub fn channel(&self, tag: ChannelTag) -> Option<&ChannelView> {
        self.channels.iter().find(|view| view.tag == tag)
    }

    pub fn upsert(&mut self, view: ChannelView) {
        match self.channels.iter_mut().find(|existing| existing.tag == view.tag) {
            Some(existing) => *existing = view,
            None => self.channels.push(view),
        }
    }

    pub fn record_drain(&mut self, tick: u64, metrics: DrainSnapshot) {
        self.tick = tick;
        self.drained = metrics.applied;
        self.rejected = metrics.rejected;
        self.tick_failures = metrics.tick_failures;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_view_brackets_values() {
        let view = ChannelView::from_snapshot(ChannelTag::Fft, 1, vec![0.5, 3.0, 1.0]);
        assert_eq!(view.peak_bin, Some(1));
        assert_eq!(view.y_range, (-0.5, 4.0));
        assert_eq!(view.label, "max bin 1");
    }

    #[test]
    fn freq_view_ignores_low_bins() {
        let mut values = vec![0.0; 32];
        values[2] = 100.0;
        values[19] = 2.0;
        values[25] = 1.0;
        let view = ChannelView::from_snapshot(ChannelTag::Freq, 4, values);
        assert_eq!(view.peak_bin, Some(25));
        assert_eq!(view.y_range, (0.0, 2.0));
        assert_eq!(view.label, "25");
    }

    #[test]
    fn silent_freq_view_keeps_floor() {
        let view = ChannelView::from_snapshot(ChannelTag::Freq, 0, vec![0.0; 24]);
        assert_eq!(view.y_range, (0.0, 1e-5));
    }

    #[test]
    fn mrf_view_labels_newest_value() {
        let view = ChannelView::from_snapshot(ChannelTag::Mrf, 2, vec![0.0, 1.0, 2.5]);
        assert_eq!(view.label, "MRF: 2.50");
        assert_eq!(view.peak_bin, None);
    }

    #[test]
    fn upsert_replaces_existing_channel() {
        let mut model = VisualizationModel::default();
        model.upsert(ChannelView::from_snapshot(ChannelTag::Mrf, 1, vec![1.0]));
        model.upsert(ChannelView::from_snapshot(ChannelTag::Mrf, 2, vec![2.0]));
        assert_eq!(model.channels.len(), 1);
        assert_eq!(model.channel(ChannelTag::Mrf).unwrap().generation, 2);
    }
}

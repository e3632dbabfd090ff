use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use handoffcore::envelope::ChannelTag;
use handoffcore::prelude::{ChannelLayout, ChannelSpec, DEFAULT_QUEUE_CAPACITY};
use handoffcore::scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub queue_capacity: usize,
    pub producers: usize,
    /// Minimum tick period of the consumer loop; 0 runs unpaced.
    pub tick_interval_ms: u64,
    pub max_ticks: Option<u64>,
    /// Ticks between status log lines.
    pub status_every: u64,
    pub channels: ChannelLayout,
    pub generator: GeneratorConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            producers: 1,
            tick_interval_ms: 16,
            max_ticks: None,
            status_every: 60,
            channels: ChannelLayout::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

/// Channel lengths as given on the command line.
#[derive(Clone, Copy, Debug)]
pub struct ChannelArgs {
    pub fft_len: usize,
    pub freq_len: usize,
    pub phase_window: usize,
    pub mrf_window: usize,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        queue_capacity: usize,
        channels: ChannelArgs,
        tick_interval_ms: u64,
        max_ticks: Option<u64>,
    ) -> anyhow::Result<Self> {
        let layout = ChannelLayout::new(vec![
            ChannelSpec::new(ChannelTag::Fft, channels.fft_len),
            ChannelSpec::new(ChannelTag::Freq, channels.freq_len),
            ChannelSpec::new(ChannelTag::Phase, channels.phase_window),
            ChannelSpec::new(ChannelTag::Mrf, channels.mrf_window),
        ])
        .context("building channel layout from arguments")?;
        let config = Self {
            queue_capacity,
            tick_interval_ms,
            max_ticks,
            channels: layout,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be at least 1");
        }
        if self.producers == 0 {
            anyhow::bail!("at least one producer is required");
        }
        self.channels.validate()?;
        Ok(())
    }

    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: (self.tick_interval_ms > 0)
                .then(|| Duration::from_millis(self.tick_interval_ms)),
            max_ticks: self.max_ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args() -> ChannelArgs {
        ChannelArgs {
            fft_len: 64,
            freq_len: 128,
            phase_window: 128,
            mrf_window: 64,
        }
    }

    #[test]
    fn config_from_args_produces_scheduler_config() {
        let cfg = WorkflowConfig::from_args(10_000, args(), 16, Some(5)).unwrap();
        let sched = cfg.to_scheduler_config();
        assert_eq!(sched.tick_interval, Some(Duration::from_millis(16)));
        assert_eq!(sched.max_ticks, Some(5));
        assert_eq!(cfg.channels.spec(ChannelTag::Mrf).unwrap().len, 64);
    }

    #[test]
    fn zero_tick_interval_runs_unpaced() {
        let cfg = WorkflowConfig::from_args(8, args(), 0, None).unwrap();
        assert_eq!(cfg.to_scheduler_config().tick_interval, None);
    }

    #[test]
    fn config_rejects_zero_length_channel() {
        let bad = ChannelArgs {
            mrf_window: 0,
            ..args()
        };
        assert!(WorkflowConfig::from_args(8, bad, 16, None).is_err());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"queue_capacity: 3\nchannels:\n  - tag: range\n    len: 2\n  - tag: freq\n    len: 1\ngenerator:\n  seed: 7\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.queue_capacity, 3);
        assert_eq!(cfg.channels.spec(ChannelTag::Fft).unwrap().len, 2);
        assert_eq!(cfg.generator.seed, 7);
        assert_eq!(cfg.producers, 1);
    }

    #[test]
    fn config_load_rejects_duplicate_tags() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"channels:\n  - tag: mrf\n    len: 4\n  - tag: mrf\n    len: 8\n")
            .unwrap();
        let path = temp.into_temp_path();
        assert!(WorkflowConfig::load(&path).is_err());
    }
}

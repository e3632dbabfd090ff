use crate::gui_bridge::bridge::{write_model, SharedModel};
use crate::gui_bridge::model::ChannelView;
use handoffcore::envelope::ChannelTag;
use handoffcore::scheduler::{SchedulerTask, TickContext};
use handoffcore::telemetry::{DrainMetrics, LogManager};
use std::sync::Arc;

/// Headless stand-in for a plot: turns one channel's snapshot into a view.
///
/// Skips ticks where the channel has not changed since the last render.
pub struct ChannelRenderTask {
    name: String,
    tag: ChannelTag,
    model: SharedModel,
    last_generation: Option<u64>,
    logger: LogManager,
}

impl ChannelRenderTask {
    pub fn new(tag: ChannelTag, model: SharedModel) -> Self {
        Self {
            name: format!("render-{}", tag),
            tag,
            model,
            last_generation: None,
            logger: LogManager::new("render"),
        }
    }
}

impl SchedulerTask for ChannelRenderTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, ctx: &mut TickContext<'_>) {
        let store = ctx.store();
        let Some(generation) = store.generation(self.tag) else {
            return;
        };
        if self.last_generation == Some(generation) {
            return;
        }
        let Some(values) = store.read(self.tag) else {
            return;
        };

        let view = ChannelView::from_snapshot(self.tag, generation, values);
        self.logger
            .detail(&format!("{} tick {}: {}", self.name, ctx.tick(), view.label));
        write_model(&self.model, |model| model.upsert(view));
        self.last_generation = Some(generation);
    }
}

/// Publishes drain counters and logs a status line every `report_every` ticks.
pub struct StatusTask {
    model: SharedModel,
    metrics: Arc<DrainMetrics>,
    report_every: u64,
    logger: LogManager,
}

impl StatusTask {
    pub fn new(model: SharedModel, metrics: Arc<DrainMetrics>, report_every: u64) -> Self {
        Self {
            model,
            metrics,
            report_every: report_every.max(1),
            logger: LogManager::new("status"),
        }
    }
}

impl SchedulerTask for StatusTask {
    fn name(&self) -> &str {
        "status"
    }

    fn run(&mut self, ctx: &mut TickContext<'_>) {
        let snapshot = self.metrics.snapshot();
        write_model(&self.model, |model| model.record_drain(ctx.tick(), snapshot));
        if ctx.tick() % self.report_every == 0 {
            self.logger.record(&format!(
                "tick {}: drained {} rejected {} failed ticks {}",
                ctx.tick(),
                snapshot.applied,
                snapshot.rejected,
                snapshot.tick_failures
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gui_bridge::bridge::GuiBridge;
    use handoffcore::envelope::SampleEnvelope;
    use handoffcore::prelude::{ChannelLayout, ChannelSpec};
    use handoffcore::processing::Demultiplexer;
    use handoffcore::scheduler::{Scheduler, SchedulerConfig};
    use handoffcore::transport::channel;

    #[test]
    fn render_tasks_publish_latest_views() {
        let layout = ChannelLayout::new(vec![
            ChannelSpec::new(ChannelTag::Fft, 2),
            ChannelSpec::new(ChannelTag::Freq, 1),
        ])
        .unwrap();
        let (tx, rx) = channel(3).unwrap();
        let gui = GuiBridge::new();
        let demux = Demultiplexer::new(rx, layout.clone());
        let metrics = demux.metrics();

        let mut scheduler = Scheduler::new(&layout, SchedulerConfig::default());
        scheduler.register(demux).unwrap();
        scheduler
            .register(ChannelRenderTask::new(ChannelTag::Fft, gui.shared()))
            .unwrap();
        scheduler
            .register(ChannelRenderTask::new(ChannelTag::Freq, gui.shared()))
            .unwrap();
        scheduler
            .register(StatusTask::new(gui.shared(), metrics, 100))
            .unwrap();

        tx.enqueue(SampleEnvelope::new(ChannelTag::Fft, vec![1.0, 2.0])).unwrap();
        tx.enqueue(SampleEnvelope::new(ChannelTag::Freq, vec![0.4])).unwrap();
        tx.enqueue(SampleEnvelope::new(ChannelTag::Fft, vec![3.0, 4.0])).unwrap();
        scheduler.run_tick().unwrap();

        let model = gui.snapshot();
        assert_eq!(model.channel(ChannelTag::Fft).unwrap().values, vec![3.0, 4.0]);
        assert_eq!(model.channel(ChannelTag::Freq).unwrap().values, vec![0.4]);
        assert_eq!(model.drained, 3);
        assert_eq!(
            scheduler.task_names(),
            vec!["drain", "render-fft", "render-freq", "status"]
        );
    }
}

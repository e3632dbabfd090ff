use crate::generator::profile::SyntheticProducer;
use crate::gui_bridge::bridge::{write_model, GuiBridge};
use crate::gui_bridge::render::{ChannelRenderTask, StatusTask};
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use handoffcore::prelude::ProducerError;
use handoffcore::processing::Demultiplexer;
use handoffcore::scheduler::{
    orderly_shutdown, stop_consumer, stop_producers, ExitReason, Scheduler, StopHandle,
};
use handoffcore::telemetry::{DrainMetrics, DrainSnapshot};
use handoffcore::transport::{self, ProducerHandle};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Producer errors collected by whichever shutdown joined the producer.
type ErrorLog = Arc<Mutex<Vec<ProducerError>>>;

fn record_errors(log: &ErrorLog, errors: Vec<ProducerError>) {
    match log.lock() {
        Ok(mut guard) => guard.extend(errors),
        Err(poisoned) => poisoned.into_inner().extend(errors),
    }
}

fn take_errors(log: &ErrorLog) -> Vec<ProducerError> {
    match log.lock() {
        Ok(mut guard) => std::mem::take(&mut *guard),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub ticks: u64,
    pub exit: ExitReason,
    pub drain: DrainSnapshot,
    pub producer_errors: Vec<String>,
}

/// Everything needed to stop a running pipeline from another thread.
#[derive(Clone)]
pub struct ShutdownHook {
    producers: Vec<Arc<ProducerHandle>>,
    consumer: StopHandle,
    errors: ErrorLog,
}

impl ShutdownHook {
    /// Stops producers, then the consumer. Producer errors end up in the
    /// pipeline's [`RunReport`].
    pub fn trigger(&self) {
        let errors = stop_producers(&self.producers);
        record_errors(&self.errors, errors);
        stop_consumer(&self.consumer);
    }
}

/// A wired pipeline whose producers are already running.
pub struct Pipeline {
    scheduler: Scheduler,
    producers: Vec<Arc<ProducerHandle>>,
    metrics: Arc<DrainMetrics>,
    errors: ErrorLog,
}

impl Pipeline {
    fn new(
        scheduler: Scheduler,
        producers: Vec<Arc<ProducerHandle>>,
        metrics: Arc<DrainMetrics>,
    ) -> Self {
        Self {
            scheduler,
            producers,
            metrics,
            errors: ErrorLog::default(),
        }
    }

    pub fn shutdown_hook(&self) -> ShutdownHook {
        ShutdownHook {
            producers: self.producers.clone(),
            consumer: self.scheduler.stop_handle(),
            errors: Arc::clone(&self.errors),
        }
    }

    /// Runs the consumer loop on the calling thread, then joins producers.
    pub fn run(mut self) -> anyhow::Result<RunReport> {
        let summary = self.scheduler.run().context("running consumer loop")?;
        let late = orderly_shutdown(&self.producers, &self.scheduler.stop_handle());
        record_errors(&self.errors, late);
        let errors = take_errors(&self.errors);

        Ok(RunReport {
            ticks: summary.ticks,
            exit: summary.exit,
            drain: self.metrics.snapshot(),
            producer_errors: errors.iter().map(|err| err.to_string()).collect(),
        })
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Builds the consumer loop and starts the producers.
    ///
    /// Tasks run in the order drain, one render task per channel, status.
    pub fn prepare(&self, bridge: &GuiBridge) -> anyhow::Result<Pipeline> {
        self.config.validate()?;
        let layout = &self.config.channels;

        let (sender, receiver) =
            transport::channel(self.config.queue_capacity).context("creating transport queue")?;
        let demux = Demultiplexer::new(receiver, layout.clone());
        let metrics = demux.metrics();

        let mut scheduler = Scheduler::new(layout, self.config.to_scheduler_config());
        scheduler.register(demux).context("registering drain task")?;
        for spec in &layout.channels {
            scheduler
                .register(ChannelRenderTask::new(spec.tag, bridge.shared()))
                .with_context(|| format!("registering render task for {}", spec.tag))?;
        }
        scheduler
            .register(StatusTask::new(
                bridge.shared(),
                Arc::clone(&metrics),
                self.config.status_every,
            ))
            .context("registering status task")?;

        let description = self.config.generator.description.clone();
        write_model(&bridge.shared(), |model| model.description = description);

        let mut producers = Vec::with_capacity(self.config.producers);
        for id in 0..self.config.producers {
            let producer = SyntheticProducer::new(self.config.generator.clone(), layout.clone());
            match ProducerHandle::spawn(producer, sender.clone(), id) {
                Ok(handle) => producers.push(Arc::new(handle)),
                Err(err) => {
                    orderly_shutdown(&producers, &scheduler.stop_handle());
                    return Err(err).with_context(|| format!("starting producer {}", id));
                }
            }
        }

        Ok(Pipeline::new(scheduler, producers, metrics))
    }
}

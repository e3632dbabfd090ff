use crate::envelope::SampleEnvelope;
use crate::prelude::{ChannelLayout, DrainError, EnvelopeError};
use crate::processing::store::ChannelStore;
use crate::scheduler::{SchedulerTask, TickContext};
use crate::telemetry::{DrainMetrics, LogManager};
use crate::transport::EnvelopeReceiver;
use std::sync::Arc;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Queue length observed at entry; upper bound on dequeues this tick.
    pub budget: usize,
    pub applied: usize,
    pub rejected: Vec<EnvelopeError>,
    /// Set when the pass ended early.
    pub failure: Option<DrainError>,
}

enum Fault {
    Rejected(EnvelopeError),
    Tick(DrainError),
}

/// Drain task: routes queued envelopes into the channel store by tag.
pub struct Demultiplexer {
    queue: EnvelopeReceiver,
    layout: ChannelLayout,
    metrics: Arc<DrainMetrics>,
    logger: LogManager,
    /// Set once a tick has seen every producer gone.
    disconnected: bool,
}

impl Demultiplexer {
    pub fn new(queue: EnvelopeReceiver, layout: ChannelLayout) -> Self {
        Self {
            queue,
            layout,
            metrics: Arc::new(DrainMetrics::new()),
            logger: LogManager::new("drain"),
            disconnected: false,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<DrainMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<DrainMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Applies at most as many envelopes as were queued on entry.
    ///
    /// Rejected envelopes are logged and skipped. A tick failure stops the
    /// pass; whatever is still queued waits for the next tick. An empty
    /// queue with no producers left reports `DrainError::Disconnected`; it
    /// is logged and counted only the first time.
    pub fn drain_into(&mut self, store: &mut ChannelStore) -> DrainReport {
        let mut report = DrainReport {
            budget: self.queue.len(),
            ..Default::default()
        };

        let mut pending = None;
        if report.budget == 0 {
            match self.queue.poll() {
                Ok(None) => {}
                // Arrived after the length was sampled.
                Ok(Some(envelope)) => {
                    report.budget = 1;
                    pending = Some(envelope);
                }
                Err(err) => {
                    report.failure = Some(err);
                    let first = !self.disconnected;
                    if first {
                        self.disconnected = true;
                        self.logger.warn("queue is empty and every producer has exited");
                    }
                    self.metrics.record_tick(first);
                    return report;
                }
            }
        }

        for _ in 0..report.budget {
            let polled = match pending.take() {
                Some(envelope) => Ok(Some(envelope)),
                None => self.queue.poll(),
            };
            let envelope = match polled {
                Ok(Some(envelope)) => envelope,
                Ok(None) => break,
                Err(err) => {
                    report.failure = Some(err);
                    break;
                }
            };

            match self.apply(store, envelope) {
                Ok(()) => report.applied += 1,
                Err(Fault::Rejected(err)) => {
                    self.logger.warn(&format!("discarding envelope: {}", err));
                    self.metrics.record_rejected();
                    report.rejected.push(err);
                }
                Err(Fault::Tick(err)) => {
                    report.failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = &report.failure {
            self.logger.warn(&format!(
                "drain tick ended early after {} of {} envelopes: {}",
                report.applied + report.rejected.len(),
                report.budget,
                err
            ));
        }
        self.metrics.record_applied(report.applied);
        self.metrics.record_tick(report.failure.is_some());
        report
    }

    fn apply(&self, store: &mut ChannelStore, envelope: SampleEnvelope) -> Result<(), Fault> {
        self.layout.check(&envelope).map_err(Fault::Rejected)?;
        store
            .write(envelope.tag(), envelope.values())
            .map_err(|err| Fault::Tick(err.into()))
    }
}

impl SchedulerTask for Demultiplexer {
    fn name(&self) -> &str {
        "drain"
    }

    fn run(&mut self, ctx: &mut TickContext<'_>) {
        let tick = ctx.tick();
        let report = self.drain_into(ctx.store_mut());
        if report.budget > 0 {
            self.logger.detail(&format!(
                "tick {}: applied {} rejected {} of {}",
                tick,
                report.applied,
                report.rejected.len(),
                report.budget
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::ChannelTag;
    use crate::prelude::{ChannelSpec, StoreError};
    use crate::transport::{channel, EnvelopeSender};

    fn setup(
        capacity: usize,
        specs: Vec<ChannelSpec>,
    ) -> (EnvelopeSender, Demultiplexer, ChannelStore) {
        let layout = ChannelLayout::new(specs).unwrap();
        let (tx, rx) = channel(capacity).unwrap();
        let store = ChannelStore::from_layout(&layout);
        (tx, Demultiplexer::new(rx, layout), store)
    }

    #[test]
    fn mixed_batch_applies_latest_values() {
        let (tx, mut demux, mut store) = setup(
            3,
            vec![
                ChannelSpec::new(ChannelTag::Fft, 2),
                ChannelSpec::new(ChannelTag::Freq, 1),
            ],
        );
        tx.enqueue(SampleEnvelope::new(ChannelTag::Fft, vec![1.0, 2.0]))
            .unwrap();
        tx.enqueue(SampleEnvelope::new(ChannelTag::Freq, vec![0.4]))
            .unwrap();
        tx.enqueue(SampleEnvelope::new(ChannelTag::Fft, vec![3.0, 4.0]))
            .unwrap();

        let report = demux.drain_into(&mut store);

        assert_eq!(report.applied, 3);
        assert_eq!(store.read(ChannelTag::Fft), Some(vec![3.0, 4.0]));
        assert_eq!(store.read(ChannelTag::Freq), Some(vec![0.4]));
        assert!(tx.is_empty());
    }

    #[test]
    fn window_advances_one_scalar_per_tick() {
        let (tx, mut demux, mut store) = setup(4, vec![ChannelSpec::new(ChannelTag::Mrf, 4)]);

        tx.enqueue(SampleEnvelope::scalar(ChannelTag::Mrf, 5.0))
            .unwrap();
        demux.drain_into(&mut store);
        assert_eq!(store.read(ChannelTag::Mrf), Some(vec![0.0, 0.0, 0.0, 5.0]));

        tx.enqueue(SampleEnvelope::scalar(ChannelTag::Mrf, 6.0))
            .unwrap();
        demux.drain_into(&mut store);
        assert_eq!(store.read(ChannelTag::Mrf), Some(vec![0.0, 0.0, 5.0, 6.0]));
    }

    #[test]
    fn per_tag_order_is_preserved_across_interleaving() {
        let (tx, mut demux, mut store) = setup(
            32,
            vec![
                ChannelSpec::new(ChannelTag::Phase, 5),
                ChannelSpec::new(ChannelTag::Freq, 1),
            ],
        );
        for step in 0..8 {
            tx.enqueue(SampleEnvelope::scalar(ChannelTag::Phase, step as f32))
                .unwrap();
            tx.enqueue(SampleEnvelope::new(ChannelTag::Freq, vec![step as f32 * 10.0]))
                .unwrap();
        }
        demux.drain_into(&mut store);
        assert_eq!(
            store.read(ChannelTag::Phase),
            Some(vec![3.0, 4.0, 5.0, 6.0, 7.0])
        );
        assert_eq!(store.read(ChannelTag::Freq), Some(vec![70.0]));
    }

    #[test]
    fn malformed_envelope_is_isolated() {
        let (tx, mut demux, mut store) = setup(
            8,
            vec![
                ChannelSpec::new(ChannelTag::Fft, 2),
                ChannelSpec::new(ChannelTag::Mrf, 3),
            ],
        );
        tx.enqueue(SampleEnvelope::new(ChannelTag::Fft, vec![1.0, 1.0]))
            .unwrap();
        tx.enqueue(SampleEnvelope::new(ChannelTag::Fft, vec![9.0, 9.0, 9.0]))
            .unwrap();
        tx.enqueue(SampleEnvelope::new(ChannelTag::Mrf, vec![1.0, 2.0]))
            .unwrap();
        tx.enqueue(SampleEnvelope::new(ChannelTag::Freq, vec![0.5]))
            .unwrap();
        tx.enqueue(SampleEnvelope::scalar(ChannelTag::Mrf, 4.0))
            .unwrap();

        let report = demux.drain_into(&mut store);

        assert_eq!(report.applied, 2);
        assert_eq!(
            report.rejected,
            vec![
                EnvelopeError::PayloadShapeMismatch {
                    tag: ChannelTag::Fft,
                    observed: 3,
                    expected: 2,
                },
                EnvelopeError::PayloadShapeMismatch {
                    tag: ChannelTag::Mrf,
                    observed: 2,
                    expected: 1,
                },
                EnvelopeError::UnknownTag("freq".into()),
            ]
        );
        assert!(report.failure.is_none());
        assert_eq!(store.read(ChannelTag::Fft), Some(vec![1.0, 1.0]));
        assert_eq!(store.read(ChannelTag::Mrf), Some(vec![0.0, 0.0, 4.0]));
        assert_eq!(demux.metrics().snapshot().rejected, 3);
    }

    #[test]
    fn drain_is_bounded_by_entry_length() {
        let (tx, mut demux, mut store) = setup(8, vec![ChannelSpec::new(ChannelTag::Mrf, 8)]);
        tx.enqueue(SampleEnvelope::scalar(ChannelTag::Mrf, 1.0))
            .unwrap();
        tx.enqueue(SampleEnvelope::scalar(ChannelTag::Mrf, 2.0))
            .unwrap();

        let first = demux.drain_into(&mut store);
        tx.enqueue(SampleEnvelope::scalar(ChannelTag::Mrf, 3.0))
            .unwrap();

        assert_eq!(first.budget, 2);
        assert_eq!(first.applied, 2);
        assert_eq!(tx.len(), 1);
        assert_eq!(store.newest(ChannelTag::Mrf), Some(2.0));
    }

    #[test]
    fn empty_queue_is_a_no_op() {
        let (_tx, mut demux, mut store) = setup(2, vec![ChannelSpec::new(ChannelTag::Fft, 2)]);
        let report = demux.drain_into(&mut store);
        assert_eq!(report, DrainReport::default());
        assert_eq!(store.generation(ChannelTag::Fft), Some(0));
    }

    #[test]
    fn exhausted_producers_surface_as_tick_failure() {
        let (tx, mut demux, mut store) = setup(4, vec![ChannelSpec::new(ChannelTag::Mrf, 4)]);
        tx.enqueue(SampleEnvelope::scalar(ChannelTag::Mrf, 1.0))
            .unwrap();
        drop(tx);

        // Queued data is still delivered after the producer is gone.
        let last = demux.drain_into(&mut store);
        assert_eq!(last.applied, 1);
        assert!(last.failure.is_none());

        let first = demux.drain_into(&mut store);
        let second = demux.drain_into(&mut store);
        assert_eq!(first.failure, Some(DrainError::Disconnected));
        assert_eq!(second.failure, Some(DrainError::Disconnected));
        assert_eq!(store.newest(ChannelTag::Mrf), Some(1.0));

        let metrics = demux.metrics().snapshot();
        assert_eq!(metrics.ticks, 3);
        assert_eq!(metrics.tick_failures, 1);
    }

    #[test]
    fn store_fault_ends_tick_and_leaves_rest_queued() {
        let layout = ChannelLayout::new(vec![
            ChannelSpec::new(ChannelTag::Fft, 2),
            ChannelSpec::new(ChannelTag::Freq, 1),
        ])
        .unwrap();
        // Consumer store built from a narrower table than the drain validates against.
        let mut store = ChannelStore::from_layout(
            &ChannelLayout::new(vec![ChannelSpec::new(ChannelTag::Fft, 2)]).unwrap(),
        );
        let (tx, rx) = channel(4).unwrap();
        let mut demux = Demultiplexer::new(rx, layout);

        tx.enqueue(SampleEnvelope::new(ChannelTag::Freq, vec![0.1]))
            .unwrap();
        tx.enqueue(SampleEnvelope::new(ChannelTag::Fft, vec![5.0, 6.0]))
            .unwrap();

        let report = demux.drain_into(&mut store);

        assert_eq!(
            report.failure,
            Some(DrainError::Store(StoreError::MissingChannel(ChannelTag::Freq)))
        );
        assert_eq!(report.applied, 0);
        assert_eq!(tx.len(), 1);

        let next = demux.drain_into(&mut store);
        assert!(next.failure.is_none());
        assert_eq!(store.read(ChannelTag::Fft), Some(vec![5.0, 6.0]));
        assert_eq!(demux.metrics().snapshot().tick_failures, 1);
    }
}

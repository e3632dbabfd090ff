use crate::envelope::SampleEnvelope;
use crate::prelude::{ProducerError, ProducerResult, TransportError};
use crate::scheduler::StopHandle;
use crate::telemetry::log::LogManager;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a blocked enqueue waits before re-checking the stop signal.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Source of envelopes running on its own thread.
///
/// Implementations compute samples at their own cadence and hand them to
/// [`ProducerContext::emit`] until [`ProducerContext::should_stop`] is raised.
pub trait Producer: Send + 'static {
    fn name(&self) -> &str {
        "producer"
    }

    fn run(&mut self, ctx: &ProducerContext) -> ProducerResult<()>;
}

/// Everything a producer sees of the outside world.
pub struct ProducerContext {
    id: usize,
    queue: super::EnvelopeSender,
    stop: StopHandle,
}

impl ProducerContext {
    pub fn new(id: usize, queue: super::EnvelopeSender, stop: StopHandle) -> Self {
        Self { id, queue, stop }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn should_stop(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Enqueues an envelope, blocking under back-pressure.
    ///
    /// The wait is sliced so a stop request still gets through while the
    /// queue is saturated.
    pub fn emit(&self, envelope: SampleEnvelope) -> ProducerResult<()> {
        let mut pending = envelope;
        loop {
            if self.should_stop() {
                return Err(self.transport_error(TransportError::Stopped(pending)));
            }
            match self.queue.enqueue_timeout(pending, STOP_POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(TransportError::Timeout(env)) => pending = env,
                Err(err) => return Err(self.transport_error(err)),
            }
        }
    }

    /// Sleeps one frame period. Returns `true` if stop was requested meanwhile.
    pub fn pace(&self, period: Duration) -> bool {
        self.stop.wait_timeout(period)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn transport_error(&self, source: TransportError) -> ProducerError {
        ProducerError::Transport {
            id: self.id,
            source,
        }
    }
}

impl ProducerError {
    /// True when the error only reflects an orderly shutdown.
    pub fn is_shutdown(&self) -> bool {
        matches!(
            self,
            ProducerError::Transport {
                source: TransportError::Stopped(_) | TransportError::Disconnected(_),
                ..
            }
        )
    }
}

/// Owns a running producer thread.
///
/// `shutdown` may be called from several places (signal handler, normal
/// exit); only the first call joins the thread.
pub struct ProducerHandle {
    id: usize,
    stop: StopHandle,
    join: Mutex<Option<JoinHandle<ProducerResult<()>>>>,
}

impl ProducerHandle {
    pub fn spawn<P: Producer>(
        mut producer: P,
        queue: super::EnvelopeSender,
        id: usize,
    ) -> ProducerResult<Self> {
        let stop = StopHandle::new();
        let ctx = ProducerContext::new(id, queue, stop.clone());
        let join = thread::Builder::new()
            .name(format!("producer-{}", id))
            .spawn(move || {
                let logger = LogManager::new("producer");
                logger.record(&format!("{} #{} started", producer.name(), id));
                let outcome = match producer.run(&ctx) {
                    Err(err) if err.is_shutdown() => Ok(()),
                    other => other,
                };
                match &outcome {
                    Ok(()) => logger.record(&format!("{} #{} exited", producer.name(), id)),
                    Err(err) => logger.warn(&format!("{} #{} failed: {}", producer.name(), id, err)),
                }
                outcome
            })?;

        Ok(Self {
            id,
            stop,
            join: Mutex::new(Some(join)),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn request_stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        match self.join.lock() {
            Ok(guard) => guard.as_ref().map_or(true, |join| join.is_finished()),
            Err(_) => true,
        }
    }

    /// Waits for the producer thread to exit. Later calls return `Ok(())`.
    pub fn join(&self) -> ProducerResult<()> {
        let handle = match self.join.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match handle {
            Some(join) => join.join().map_err(|_| ProducerError::Panicked(self.id))?,
            None => Ok(()),
        }
    }

    pub fn shutdown(&self) -> ProducerResult<()> {
        self.request_stop();
        self.join()
    }
}

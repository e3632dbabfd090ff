use crate::envelope::SampleEnvelope;
use crate::prelude::{DrainError, TransportError, TransportResult};
use crossbeam_channel::{
    bounded, Receiver, SendTimeoutError, Sender, TryRecvError, TrySendError,
};
use std::time::Duration;

/// Creates a bounded FIFO transport holding at most `capacity` envelopes.
///
/// The sender half may be cloned for several producers; per-sender order is
/// preserved, there is no ordering across senders.
pub fn channel(capacity: usize) -> TransportResult<(EnvelopeSender, EnvelopeReceiver)> {
    if capacity == 0 {
        return Err(TransportError::ZeroCapacity);
    }
    let (tx, rx) = bounded(capacity);
    Ok((EnvelopeSender { tx }, EnvelopeReceiver { rx }))
}

/// Producer half of the transport.
#[derive(Debug, Clone)]
pub struct EnvelopeSender {
    tx: Sender<SampleEnvelope>,
}

impl EnvelopeSender {
    /// Blocks while the queue is full. Nothing is dropped at the queue level.
    pub fn enqueue(&self, envelope: SampleEnvelope) -> TransportResult<()> {
        self.tx
            .send(envelope)
            .map_err(|err| TransportError::Disconnected(err.into_inner()))
    }

    /// Non-blocking enqueue; a full queue hands the envelope back.
    pub fn try_enqueue(&self, envelope: SampleEnvelope) -> TransportResult<()> {
        self.tx.try_send(envelope).map_err(|err| match err {
            TrySendError::Full(env) => TransportError::QueueFull(env),
            TrySendError::Disconnected(env) => TransportError::Disconnected(env),
        })
    }

    /// Blocks for at most `timeout` waiting for a free slot.
    pub fn enqueue_timeout(
        &self,
        envelope: SampleEnvelope,
        timeout: Duration,
    ) -> TransportResult<()> {
        self.tx
            .send_timeout(envelope, timeout)
            .map_err(|err| match err {
                SendTimeoutError::Timeout(env) => TransportError::Timeout(env),
                SendTimeoutError::Disconnected(env) => TransportError::Disconnected(env),
            })
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(0)
    }
}

/// Consumer half of the transport. Never blocks.
#[derive(Debug)]
pub struct EnvelopeReceiver {
    rx: Receiver<SampleEnvelope>,
}

impl EnvelopeReceiver {
    /// Returns the oldest queued envelope, or `None` immediately when empty.
    pub fn try_dequeue(&self) -> Option<SampleEnvelope> {
        self.rx.try_recv().ok()
    }

    /// Like [`try_dequeue`](Self::try_dequeue) but distinguishes an empty
    /// queue from one whose producers have all gone away.
    pub fn poll(&self) -> Result<Option<SampleEnvelope>, DrainError> {
        match self.rx.try_recv() {
            Ok(env) => Ok(Some(env)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(DrainError::Disconnected),
        }
    }

    /// Number of envelopes currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }
}

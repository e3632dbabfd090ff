use crate::envelope::{ChannelTag, SampleEnvelope, UpdatePolicy};
use serde::{Deserialize, Serialize};

/// Default capacity of the transport queue between producer and consumer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Declared shape of one channel.
///
/// For latest-value channels `len` is the payload length. For rolling-window
/// channels it is the window capacity; their payloads are single scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub tag: ChannelTag,
    pub len: usize,
}

impl ChannelSpec {
    pub fn new(tag: ChannelTag, len: usize) -> Self {
        Self { tag, len }
    }

    /// Number of values an incoming envelope for this channel must carry.
    pub fn payload_len(&self) -> usize {
        match self.tag.policy() {
            UpdatePolicy::Latest => self.len,
            UpdatePolicy::Rolling => 1,
        }
    }
}

/// Tag/length table agreed between producer and consumer at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelLayout {
    pub channels: Vec<ChannelSpec>,
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self {
            channels: vec![
                ChannelSpec::new(ChannelTag::Fft, 64),
                ChannelSpec::new(ChannelTag::Freq, 128),
                ChannelSpec::new(ChannelTag::Phase, 128),
                ChannelSpec::new(ChannelTag::Mrf, 64),
            ],
        }
    }
}

impl ChannelLayout {
    pub fn new(channels: Vec<ChannelSpec>) -> LayoutResult<Self> {
        for (idx, spec) in channels.iter().enumerate() {
            if spec.len == 0 {
                return Err(LayoutError::ZeroLength(spec.tag));
            }
            if channels[..idx].iter().any(|other| other.tag == spec.tag) {
                return Err(LayoutError::DuplicateTag(spec.tag));
            }
        }
        Ok(Self { channels })
    }

    pub fn spec(&self, tag: ChannelTag) -> Option<&ChannelSpec> {
        self.channels.iter().find(|spec| spec.tag == tag)
    }

    pub fn contains(&self, tag: ChannelTag) -> bool {
        self.spec(tag).is_some()
    }

    pub fn validate(&self) -> LayoutResult<()> {
        Self::new(self.channels.clone()).map(|_| ())
    }

    /// Checks an envelope against the declared shape of its channel.
    pub fn check(&self, envelope: &SampleEnvelope) -> EnvelopeResult<()> {
        let spec = self
            .spec(envelope.tag())
            .ok_or_else(|| EnvelopeError::UnknownTag(envelope.tag().to_string()))?;
        let expected = spec.payload_len();
        if envelope.len() != expected {
            return Err(EnvelopeError::PayloadShapeMismatch {
                tag: envelope.tag(),
                observed: envelope.len(),
                expected,
            });
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("channel {0} declared with zero length")]
    ZeroLength(ChannelTag),
    #[error("channel {0} declared more than once")]
    DuplicateTag(ChannelTag),
}

pub type LayoutResult<T> = Result<T, LayoutError>;

/// Per-envelope rejection reasons. Recovered inside the drain task.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("payload shape mismatch on {tag}: observed {observed} values, expected {expected}")]
    PayloadShapeMismatch {
        tag: ChannelTag,
        observed: usize,
        expected: usize,
    },
    #[error("unknown channel tag `{0}`")]
    UnknownTag(String),
}

pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

/// Errors surfaced by the bounded transport. Rejected envelopes are handed back.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("transport queue is full")]
    QueueFull(SampleEnvelope),
    #[error("timed out waiting for queue space")]
    Timeout(SampleEnvelope),
    #[error("consumer side of the transport is gone")]
    Disconnected(SampleEnvelope),
    #[error("producer stopped while waiting for queue space")]
    Stopped(SampleEnvelope),
    #[error("transport capacity must be non-zero")]
    ZeroCapacity,
}

impl TransportError {
    /// Recovers the envelope that could not be enqueued, if any.
    pub fn into_envelope(self) -> Option<SampleEnvelope> {
        match self {
            Self::QueueFull(env)
            | Self::Timeout(env)
            | Self::Disconnected(env)
            | Self::Stopped(env) => Some(env),
            Self::ZeroCapacity => None,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("no state slot for channel {0}")]
    MissingChannel(ChannelTag),
    #[error("update for {tag} carries {observed} values, slot holds {expected}")]
    SlotShape {
        tag: ChannelTag,
        observed: usize,
        expected: usize,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures that end a drain tick early without stopping the scheduler.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DrainError {
    #[error("all producers disconnected and the queue is empty")]
    Disconnected,
    #[error("state store rejected a validated update: {0}")]
    Store(#[from] StoreError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler has stopped and cannot run again")]
    AlreadyStopped,
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(thiserror::Error, Debug)]
pub enum ProducerError {
    #[error("producer {id} transport failure: {source}")]
    Transport {
        id: usize,
        #[source]
        source: TransportError,
    },
    #[error("producer {id} failed: {reason}")]
    Internal { id: usize, reason: String },
    #[error("producer thread {0} panicked")]
    Panicked(usize),
    #[error("failed to spawn producer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type ProducerResult<T> = Result<T, ProducerError>;

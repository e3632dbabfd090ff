//! Bounded message-passing boundary between producers and the consumer loop.

pub mod producer;
pub mod queue;

pub use producer::{Producer, ProducerContext, ProducerHandle};
pub use queue::{channel, EnvelopeReceiver, EnvelopeSender};

pub mod sample;
pub mod tag;

pub use sample::SampleEnvelope;
pub use tag::{ChannelTag, UpdatePolicy};

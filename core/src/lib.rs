//! Bounded producer/consumer handoff for real-time sensing streams.
//!
//! A producer thread pushes tagged [`SampleEnvelope`]s through a bounded
//! [`transport`] queue. On the consumer side a single-threaded cooperative
//! [`Scheduler`] runs a [`Demultiplexer`] drain task that folds envelopes into
//! per-channel state, followed by render tasks that read consistent snapshots.

pub mod envelope;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod scheduler;
pub mod telemetry;
pub mod transport;

pub use envelope::{ChannelTag, SampleEnvelope};
pub use prelude::{ChannelLayout, ChannelSpec};
pub use processing::{ChannelStore, Demultiplexer};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerTask, StopHandle, TickContext};

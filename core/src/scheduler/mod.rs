//! Cooperative tick loop and the stop/shutdown plumbing around it.

pub mod cooperative;
pub mod shutdown;
pub mod stop;
pub mod task;

pub use cooperative::{ExitReason, RunSummary, Scheduler, SchedulerConfig, SchedulerState};
pub use shutdown::{orderly_shutdown, stop_consumer, stop_producers};
pub use stop::StopHandle;
pub use task::{FnTask, SchedulerTask, TickContext};

use crate::prelude::{ChannelLayout, SchedulerError, SchedulerResult};
use crate::processing::store::ChannelStore;
use crate::scheduler::task::{FnTask, SchedulerTask, TickContext};
use crate::scheduler::StopHandle;
use crate::telemetry::log::LogManager;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Pacing and limits for the tick loop.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    /// Minimum wall time per tick; `None` ticks back to back.
    pub tick_interval: Option<Duration>,
    /// Stop after this many ticks; `None` runs until stopped.
    pub max_ticks: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    ShutdownRequested,
    TickLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub exit: ExitReason,
}

/// Single-threaded cooperative loop.
///
/// Owns the channel store; every tick runs each registered task once, one
/// at a time, so no task ever observes a half-applied update.
pub struct Scheduler {
    config: SchedulerConfig,
    store: ChannelStore,
    tasks: Vec<Box<dyn SchedulerTask>>,
    state: SchedulerState,
    stop: StopHandle,
    tick: u64,
    logger: LogManager,
}

impl Scheduler {
    pub fn new(layout: &ChannelLayout, config: SchedulerConfig) -> Self {
        Self {
            config,
            store: ChannelStore::from_layout(layout),
            tasks: Vec::new(),
            state: SchedulerState::Idle,
            stop: StopHandle::new(),
            tick: 0,
            logger: LogManager::new("scheduler"),
        }
    }

    pub fn register<T>(&mut self, task: T) -> SchedulerResult<&mut Self>
    where
        T: SchedulerTask + 'static,
    {
        if self.state == SchedulerState::Stopped {
            return Err(SchedulerError::AlreadyStopped);
        }
        self.logger.detail(&format!("registered task {}", task.name()));
        self.tasks.push(Box::new(task));
        Ok(self)
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, body: F) -> SchedulerResult<&mut Self>
    where
        F: FnMut(&TickContext<'_>) + 'static,
    {
        self.register(FnTask::new(name, body))
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|task| task.name()).collect()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn store(&self) -> &ChannelStore {
        &self.store
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Runs ticks until stopped or the tick limit is reached.
    pub fn run(&mut self) -> SchedulerResult<RunSummary> {
        if self.state == SchedulerState::Stopped {
            return Err(SchedulerError::AlreadyStopped);
        }
        self.state = SchedulerState::Running;
        self.logger
            .record(&format!("running {} tasks", self.tasks.len()));

        let first_tick = self.tick;
        let exit = loop {
            if self.stop.is_stopped() {
                break ExitReason::ShutdownRequested;
            }
            if let Some(limit) = self.config.max_ticks {
                if self.tick - first_tick >= limit {
                    break ExitReason::TickLimit;
                }
            }

            let started = Instant::now();
            self.run_tick_inner();

            if let Some(interval) = self.config.tick_interval {
                let elapsed = started.elapsed();
                if elapsed < interval {
                    self.stop.wait_timeout(interval - elapsed);
                }
            }
        };

        self.state = SchedulerState::Stopped;
        let summary = RunSummary {
            ticks: self.tick - first_tick,
            exit,
        };
        self.logger
            .record(&format!("stopped after {} ticks ({:?})", summary.ticks, exit));
        Ok(summary)
    }

    /// Runs exactly one tick without entering the loop.
    pub fn run_tick(&mut self) -> SchedulerResult<()> {
        if self.state == SchedulerState::Stopped {
            return Err(SchedulerError::AlreadyStopped);
        }
        self.run_tick_inner();
        Ok(())
    }

    fn run_tick_inner(&mut self) {
        let mut ctx = TickContext::new(self.tick, &mut self.store, &self.stop);
        for task in self.tasks.iter_mut() {
            task.run(&mut ctx);
        }
        self.tick += 1;
    }
}

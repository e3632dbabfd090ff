use crate::envelope::ChannelTag;
use crate::processing::store::ChannelStore;
use crate::scheduler::StopHandle;

/// View handed to each task for the duration of one tick.
pub struct TickContext<'a> {
    tick: u64,
    store: &'a mut ChannelStore,
    stop: &'a StopHandle,
}

impl<'a> TickContext<'a> {
    pub(crate) fn new(tick: u64, store: &'a mut ChannelStore, stop: &'a StopHandle) -> Self {
        Self { tick, store, stop }
    }

    /// Zero-based index of the running tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn store(&self) -> &ChannelStore {
        &*self.store
    }

    /// Copy of a channel's current values.
    pub fn read(&self, tag: ChannelTag) -> Option<Vec<f32>> {
        self.store.read(tag)
    }

    /// Asks the scheduler to stop after the current tick.
    pub fn request_stop(&self) {
        self.stop.stop();
    }

    pub(crate) fn store_mut(&mut self) -> &mut ChannelStore {
        &mut *self.store
    }
}

/// Unit of work invoked once per tick, in registration order.
pub trait SchedulerTask {
    fn name(&self) -> &str;

    fn run(&mut self, ctx: &mut TickContext<'_>);
}

/// Adapts a read-only closure into a task.
pub struct FnTask<F> {
    name: String,
    body: F,
}

impl<F> FnTask<F>
where
    F: FnMut(&TickContext<'_>),
{
    pub fn new(name: impl Into<String>, body: F) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<F> SchedulerTask for FnTask<F>
where
    F: FnMut(&TickContext<'_>),
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, ctx: &mut TickContext<'_>) {
        (self.body)(&*ctx)
    }
}

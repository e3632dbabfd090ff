use serde::Serialize;
use std::sync::Mutex;

/// Counters kept by the drain task. Shared with the driver for reporting.
pub struct DrainMetrics {
    inner: Mutex<Counters>,
}

/// Point-in-time copy of [`DrainMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainSnapshot {
    pub applied: usize,
    pub rejected: usize,
    pub tick_failures: usize,
    pub ticks: usize,
}

#[derive(Default)]
struct Counters {
    applied: usize,
    rejected: usize,
    tick_failures: usize,
    ticks: usize,
}

impl DrainMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counters::default()),
        }
    }

    pub fn record_applied(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.applied += count;
        }
    }

    pub fn record_rejected(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.rejected += 1;
        }
    }

    pub fn record_tick(&self, failed: bool) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.ticks += 1;
            if failed {
                metrics.tick_failures += 1;
            }
        }
    }

    pub fn snapshot(&self) -> DrainSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            DrainSnapshot {
                applied: metrics.applied,
                rejected: metrics.rejected,
                tick_failures: metrics.tick_failures,
                ticks: metrics.ticks,
            }
        } else {
            DrainSnapshot::default()
        }
    }
}

impl Default for DrainMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = DrainMetrics::new();
        metrics.record_applied(3);
        metrics.record_rejected();
        metrics.record_tick(false);
        metrics.record_tick(true);
        assert_eq!(
            metrics.snapshot(),
            DrainSnapshot {
                applied: 3,
                rejected: 1,
                tick_failures: 1,
                ticks: 2,
            }
        );
    }
}

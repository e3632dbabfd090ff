use crate::prelude::ProducerError;
use crate::scheduler::StopHandle;
use crate::telemetry::log::LogManager;
use crate::transport::ProducerHandle;
use std::sync::Arc;

/// Producer-first shutdown.
///
/// Producers are told to stop and joined while the consumer loop is still
/// draining, so a producer blocked on a full queue can finish. Only then is
/// the consumer stopped. Returns the errors reported by producers.
pub fn orderly_shutdown(
    producers: &[Arc<ProducerHandle>],
    consumer: &StopHandle,
) -> Vec<ProducerError> {
    let errors = stop_producers(producers);
    stop_consumer(consumer);
    errors
}

/// First half of [`orderly_shutdown`]: stops and joins every producer.
pub fn stop_producers(producers: &[Arc<ProducerHandle>]) -> Vec<ProducerError> {
    let logger = LogManager::new("shutdown");
    logger.record(&format!("stopping {} producer(s)", producers.len()));

    for producer in producers {
        producer.request_stop();
    }
    let errors: Vec<ProducerError> = producers
        .iter()
        .filter_map(|producer| producer.join().err())
        .collect();
    for err in &errors {
        logger.warn(&format!("producer exited with error: {}", err));
    }
    errors
}

/// Second half of [`orderly_shutdown`].
pub fn stop_consumer(consumer: &StopHandle) {
    consumer.stop();
    LogManager::new("shutdown").record("consumer stop requested");
}

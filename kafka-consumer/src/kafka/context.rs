use std::sync::{Arc, RwLock};

use rdkafka::consumer::{BaseConsumer, ConsumerContext, Rebalance};
use rdkafka::error::KafkaResult;
use rdkafka::{ClientContext, TopicPartitionList};
use tracing::{debug, error, info, warn};

use crate::kafka::rebalance_handler::RebalanceHandler;
use crate::metrics_consts::KAFKA_REBALANCE_EMPTY_SKIPPED;

/// rdkafka context forwarding rebalance callbacks to whichever handler was
/// installed at subscription time.
///
/// The context has to exist before the consumer does, while the handler only
/// becomes known on `subscribe`, hence the late-bound slot.
#[derive(Default)]
pub struct AdapterConsumerContext {
    rebalance_handler: RwLock<Option<Arc<dyn RebalanceHandler>>>,
}

impl AdapterConsumerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install_rebalance_handler(&self, handler: Arc<dyn RebalanceHandler>) {
        *self
            .rebalance_handler
            .write()
            .unwrap_or_else(|poison| poison.into_inner()) = Some(handler);
    }

    fn handler(&self) -> Option<Arc<dyn RebalanceHandler>> {
        self.rebalance_handler
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl ClientContext for AdapterConsumerContext {}

impl ConsumerContext for AdapterConsumerContext {
    fn pre_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        debug!("Pre-rebalance event: {:?}", rebalance);

        let Some(handler) = self.handler() else {
            warn!("Rebalance before a handler was installed: {:?}", rebalance);
            return;
        };

        match rebalance {
            Rebalance::Revoke(partitions) => {
                // membership changes can trigger rebalances that move no
                // partitions at all
                if partitions.count() == 0 {
                    debug!("Skipping empty revoke rebalance");
                    metrics::counter!(KAFKA_REBALANCE_EMPTY_SKIPPED, "event_type" => "revoke")
                        .increment(1);
                    return;
                }
                handler.on_partitions_revoked(partitions);
            }
            Rebalance::Assign(partitions) => {
                debug!(
                    "Pre-rebalance assign event for {} partitions",
                    partitions.count()
                );
            }
            Rebalance::Error(e) => {
                handler.on_rebalance_error(&e.to_string());
            }
        }
    }

    fn post_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance) {
        debug!("Post-rebalance event: {:?}", rebalance);

        let Some(handler) = self.handler() else {
            return;
        };

        match rebalance {
            Rebalance::Assign(partitions) => {
                if partitions.count() == 0 {
                    debug!("Skipping empty assign rebalance");
                    metrics::counter!(KAFKA_REBALANCE_EMPTY_SKIPPED, "event_type" => "assign")
                        .increment(1);
                    return;
                }
                handler.on_partitions_assigned(partitions);
            }
            Rebalance::Revoke(_) => {
                debug!("Post-rebalance revoke event");
            }
            Rebalance::Error(e) => {
                error!("Post-rebalance error: {}", e);
            }
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(_) => {
                info!("Committed offsets for {} partitions", offsets.count());
            }
            Err(e) => {
                warn!("Failed to commit offsets: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::stats::ConsumerStats;

    #[test]
    fn test_installed_handler_is_returned() {
        let context = AdapterConsumerContext::new();
        assert!(context.handler().is_none());

        let stats = Arc::new(ConsumerStats::new());
        context.install_rebalance_handler(stats);
        assert!(context.handler().is_some());
    }
}

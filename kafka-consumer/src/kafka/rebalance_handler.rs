use rdkafka::TopicPartitionList;

/// Receives partition assignment changes from the broker client.
///
/// # Callback Threading
///
/// librdkafka only fires rebalance callbacks from inside a poll call, so in
/// practice these run on the thread driving the consumer:
///
/// ```text
/// consume()
///     └─► poll_batch()
///             ├─► pre_rebalance(Revoke)  ─► on_partitions_revoked()
///             └─► post_rebalance(Assign) ─► on_partitions_assigned()
/// ```
///
/// Whatever an implementation mutates may still be read concurrently by a
/// monitoring thread, so implementations must only touch atomic or
/// lock-guarded state. They MUST be fast and non-blocking: the poll that
/// triggered them is waiting.
pub trait RebalanceHandler: Send + Sync {
    /// Called when the group coordinator hands partitions to this consumer.
    fn on_partitions_assigned(&self, partitions: &TopicPartitionList);

    /// Called before partitions are taken away from this consumer.
    fn on_partitions_revoked(&self, partitions: &TopicPartitionList);

    /// Called when the rebalance protocol itself reports a failure.
    /// Default implementation does nothing.
    fn on_rebalance_error(&self, _error: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::types::Partition;
    use rdkafka::Offset;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        assigned_count: AtomicUsize,
        revoked_count: AtomicUsize,
        assigned_partitions: Mutex<Vec<Partition>>,
        revoked_partitions: Mutex<Vec<Partition>>,
    }

    impl RebalanceHandler for RecordingHandler {
        fn on_partitions_assigned(&self, partitions: &TopicPartitionList) {
            self.assigned_count.fetch_add(1, Ordering::SeqCst);
            let mut assigned = self.assigned_partitions.lock().unwrap();
            for elem in partitions.elements() {
                assigned.push(Partition::from(elem));
            }
        }

        fn on_partitions_revoked(&self, partitions: &TopicPartitionList) {
            self.revoked_count.fetch_add(1, Ordering::SeqCst);
            let mut revoked = self.revoked_partitions.lock().unwrap();
            for elem in partitions.elements() {
                revoked.push(Partition::from(elem));
            }
        }
    }

    fn create_test_partition_list() -> TopicPartitionList {
        let mut list = TopicPartitionList::new();
        list.add_partition_offset("test-topic-1", 0, Offset::Beginning)
            .unwrap();
        list.add_partition_offset("test-topic-1", 1, Offset::Beginning)
            .unwrap();
        list.add_partition_offset("test-topic-2", 0, Offset::Beginning)
            .unwrap();
        list
    }

    #[test]
    fn test_rebalance_handler_assign_then_revoke() {
        let handler = RecordingHandler::default();
        let partitions = create_test_partition_list();

        handler.on_partitions_assigned(&partitions);
        handler.on_partitions_revoked(&partitions);

        assert_eq!(handler.assigned_count.load(Ordering::SeqCst), 1);
        assert_eq!(handler.revoked_count.load(Ordering::SeqCst), 1);

        let assigned = handler.assigned_partitions.lock().unwrap();
        assert_eq!(assigned.len(), 3);
        assert!(assigned.contains(&Partition::new("test-topic-2".to_string(), 0)));
        assert_eq!(*assigned, *handler.revoked_partitions.lock().unwrap());
    }

    #[test]
    fn test_rebalance_error_default_is_noop() {
        let handler = RecordingHandler::default();
        handler.on_rebalance_error("coordinator load in progress");

        assert_eq!(handler.assigned_count.load(Ordering::SeqCst), 0);
        assert_eq!(handler.revoked_count.load(Ordering::SeqCst), 0);
    }
}

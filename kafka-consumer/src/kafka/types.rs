use std::fmt;

use rdkafka::topic_partition_list::TopicPartitionListElem;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    topic: String,
    partition_number: i32,
}

impl Partition {
    pub fn new(topic: String, partition_number: i32) -> Self {
        Self {
            topic,
            partition_number,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition_number(&self) -> i32 {
        self.partition_number
    }
}

impl From<TopicPartitionListElem<'_>> for Partition {
    fn from(elem: TopicPartitionListElem<'_>) -> Self {
        Self::new(elem.topic().to_string(), elem.partition())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.topic, self.partition_number)
    }
}

/// Why the last poll produced nothing the caller should process.
///
/// `NotStalled` is the only state in which buffered messages are usable.
/// `NoMessagesReturned` is benign (the topic is idle); every other value
/// needs caller-visible handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StalledStatus {
    NotStalled,
    NoMessagesReturned,
    RebalanceHappened,
    ConsumerStopped,
    NoAssignment,
    ErrorsReturned,
}

impl StalledStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StalledStatus::NotStalled => "not_stalled",
            StalledStatus::NoMessagesReturned => "no_messages_returned",
            StalledStatus::RebalanceHappened => "rebalance_happened",
            StalledStatus::ConsumerStopped => "consumer_stopped",
            StalledStatus::NoAssignment => "no_assignment",
            StalledStatus::ErrorsReturned => "errors_returned",
        }
    }
}

impl fmt::Display for StalledStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::{Offset, TopicPartitionList};

    #[test]
    fn test_partition_from_topic_partition_list_elem() {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset("events", 3, Offset::Beginning)
            .unwrap();

        let partitions: Vec<Partition> = tpl.elements().into_iter().map(Partition::from).collect();
        assert_eq!(partitions, vec![Partition::new("events".to_string(), 3)]);
        assert_eq!(partitions[0].to_string(), "events[3]");
    }

    #[test]
    fn test_stalled_status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&StalledStatus::NoAssignment).unwrap();
        assert_eq!(json, "\"NO_ASSIGNMENT\"");
        assert_eq!(StalledStatus::ErrorsReturned.as_str(), "errors_returned");
    }
}

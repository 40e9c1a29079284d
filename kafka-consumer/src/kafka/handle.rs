use std::ffi::CStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, CommitMode, Consumer};
use rdkafka::error::KafkaResult;
use rdkafka::message::OwnedMessage;
use rdkafka::TopicPartitionList;

use crate::kafka::context::AdapterConsumerContext;
use crate::kafka::rebalance_handler::RebalanceHandler;

/// The slice of a broker client the consumer adapter relies on.
///
/// Implementations are owned exclusively by one adapter and driven from one
/// thread at a time. Rebalance callbacks installed by `subscribe` must fire
/// synchronously from inside `poll_batch`/`poll_one`.
pub trait ConsumerHandle: Send {
    /// Subscribe to `topics`, routing assignment changes to `rebalance_handler`.
    fn subscribe(
        &self,
        topics: &[&str],
        rebalance_handler: Arc<dyn RebalanceHandler>,
    ) -> KafkaResult<()>;

    /// Topics the handle is currently subscribed to.
    fn subscription(&self) -> KafkaResult<Vec<String>>;

    fn unsubscribe(&self) -> KafkaResult<()>;

    /// Poll for up to `max_messages`, waiting at most `timeout`. Per-message
    /// errors are returned inline.
    fn poll_batch(
        &self,
        max_messages: usize,
        timeout: Duration,
    ) -> Vec<KafkaResult<OwnedMessage>>;

    fn poll_one(&self, timeout: Duration) -> Option<KafkaResult<OwnedMessage>>;

    /// Store `next_offset` (last processed offset + 1) for the next commit.
    fn store_offset(&self, topic: &str, partition: i32, next_offset: i64) -> KafkaResult<()>;

    /// Synchronously commit everything stored so far.
    fn commit_stored(&self) -> KafkaResult<()>;

    /// Last committed offsets for `partitions`.
    fn committed_offsets(
        &self,
        partitions: &TopicPartitionList,
        timeout: Duration,
    ) -> KafkaResult<TopicPartitionList>;

    /// Reposition consumption at `offsets`.
    fn rewind(&self, offsets: &TopicPartitionList) -> KafkaResult<()>;

    /// Group member id assigned by the coordinator, if any yet.
    fn member_id(&self) -> Option<String>;
}

/// [`ConsumerHandle`] backed by a librdkafka consumer.
pub struct RdKafkaHandle {
    consumer: BaseConsumer<AdapterConsumerContext>,
}

impl RdKafkaHandle {
    pub fn from_config(config: &ClientConfig) -> KafkaResult<Self> {
        let consumer: BaseConsumer<AdapterConsumerContext> =
            config.create_with_context(AdapterConsumerContext::new())?;
        Ok(Self { consumer })
    }
}

impl ConsumerHandle for RdKafkaHandle {
    fn subscribe(
        &self,
        topics: &[&str],
        rebalance_handler: Arc<dyn RebalanceHandler>,
    ) -> KafkaResult<()> {
        self.consumer
            .context()
            .install_rebalance_handler(rebalance_handler);
        self.consumer.subscribe(topics)
    }

    fn subscription(&self) -> KafkaResult<Vec<String>> {
        let tpl = self.consumer.subscription()?;
        Ok(tpl
            .elements()
            .into_iter()
            .map(|elem| elem.topic().to_string())
            .collect())
    }

    fn unsubscribe(&self) -> KafkaResult<()> {
        self.consumer.unsubscribe();
        Ok(())
    }

    fn poll_batch(
        &self,
        max_messages: usize,
        timeout: Duration,
    ) -> Vec<KafkaResult<OwnedMessage>> {
        let deadline = Instant::now() + timeout;
        let mut batch = Vec::with_capacity(max_messages);

        while batch.len() < max_messages {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.consumer.poll(remaining) {
                Some(Ok(message)) => batch.push(Ok(message.detach())),
                Some(Err(e)) => batch.push(Err(e)),
                None => break,
            }
        }

        batch
    }

    fn poll_one(&self, timeout: Duration) -> Option<KafkaResult<OwnedMessage>> {
        self.consumer
            .poll(timeout)
            .map(|result| result.map(|message| message.detach()))
    }

    fn store_offset(&self, topic: &str, partition: i32, next_offset: i64) -> KafkaResult<()> {
        self.consumer.store_offset(topic, partition, next_offset)
    }

    fn commit_stored(&self) -> KafkaResult<()> {
        self.consumer.commit_consumer_state(CommitMode::Sync)
    }

    fn committed_offsets(
        &self,
        partitions: &TopicPartitionList,
        timeout: Duration,
    ) -> KafkaResult<TopicPartitionList> {
        self.consumer.committed_offsets(partitions.clone(), timeout)
    }

    fn rewind(&self, offsets: &TopicPartitionList) -> KafkaResult<()> {
        self.consumer.assign(offsets)
    }

    fn member_id(&self) -> Option<String> {
        let client = self.consumer.client();
        // SAFETY: the client pointer is valid for the lifetime of `self`, the
        // returned string is owned by us and released with rd_kafka_mem_free.
        unsafe {
            let raw = rdkafka::bindings::rd_kafka_memberid(client.native_ptr());
            if raw.is_null() {
                return None;
            }
            let id = CStr::from_ptr(raw).to_string_lossy().into_owned();
            rdkafka::bindings::rd_kafka_mem_free(client.native_ptr(), raw.cast());
            Some(id).filter(|id| !id.is_empty())
        }
    }
}

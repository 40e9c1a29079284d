//! Batch-poll / iterate / stall / commit state machine.
//!
//! The adapter pulls batches from a [`ConsumerHandle`], hands them out one
//! message at a time and tracks which offsets the caller confirmed. Every
//! poll ends either with usable messages (`NotStalled`) or with a
//! [`StalledStatus`] explaining why there is nothing to process.
//!
//! Priority after a poll returns:
//!
//! ```text
//! shutdown requested    ─► ConsumerStopped     (batch discarded)
//! revoke during poll    ─► RebalanceHappened   (batch discarded, rewind)
//! empty batch           ─► NoMessagesReturned | NoAssignment
//! only errors           ─► ErrorsReturned
//! only tombstones left  ─► NoMessagesReturned
//! otherwise             ─► NotStalled
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use rdkafka::error::{KafkaError, KafkaResult, RDKafkaErrorCode};
use rdkafka::message::{Message, OwnedMessage};
use rdkafka::{Offset, TopicPartitionList};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{ConsumerError, Result};
use crate::kafka::config::ConsumerSettings;
use crate::kafka::handle::ConsumerHandle;
use crate::kafka::message::{CurrentMessage, ReadBuffer};
use crate::kafka::rebalance_handler::RebalanceHandler;
use crate::kafka::stats::{ConsumerStats, Stat, INVALID_OFFSET};
use crate::kafka::types::{Partition, StalledStatus};
use crate::metrics::LiveConsumerGuard;
use crate::metrics_consts::{
    KAFKA_COMMITS, KAFKA_COMMIT_FAILURES, KAFKA_CONSUMER_ERRORS, KAFKA_CONSUMER_STALLS,
    KAFKA_MESSAGES_POLLED, KAFKA_RESETS_TO_COMMITTED,
};

pub struct KafkaConsumer<H: ConsumerHandle> {
    // cleared in `teardown` before the handle goes away
    messages: Vec<OwnedMessage>,

    // one past the last message handed to the caller
    current: usize,

    handle: H,
    settings: ConsumerSettings,
    topics: Vec<String>,

    // shutdown signal owned by whoever drives this consumer
    shutdown: CancellationToken,

    stalled_status: StalledStatus,
    offsets_stored: usize,
    waited_for_assignment: u64,

    // shared with rebalance callbacks and monitoring
    stats: Arc<ConsumerStats>,

    _live: LiveConsumerGuard,
}

impl<H: ConsumerHandle> KafkaConsumer<H> {
    pub fn new(
        handle: H,
        settings: ConsumerSettings,
        shutdown: CancellationToken,
        topics: Vec<String>,
    ) -> Self {
        Self {
            messages: Vec::new(),
            current: 0,
            handle,
            settings,
            topics,
            shutdown,
            stalled_status: StalledStatus::NoMessagesReturned,
            offsets_stored: 0,
            waited_for_assignment: 0,
            stats: Arc::new(ConsumerStats::new()),
            _live: LiveConsumerGuard::acquire(),
        }
    }

    pub fn stalled_status(&self) -> StalledStatus {
        self.stalled_status
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled_status != StalledStatus::NotStalled
    }

    /// Whether the current batch still holds undelivered messages.
    pub fn has_more_polled_messages(&self) -> bool {
        self.stalled_status == StalledStatus::NotStalled && self.current < self.messages.len()
    }

    /// Whether the last poll ended in a stall the caller has to react to.
    pub fn polled_data_unusable(&self) -> bool {
        self.stalled_status != StalledStatus::NotStalled
            && self.stalled_status != StalledStatus::NoMessagesReturned
    }

    /// Offsets stored since the last commit.
    pub fn offsets_stored(&self) -> usize {
        self.offsets_stored
    }

    /// Polls attempted without an assignment since one was last held.
    pub fn waited_for_assignment(&self) -> u64 {
        self.waited_for_assignment
    }

    pub fn subscribe(&mut self) -> Result<()> {
        let subscription = self.handle.subscription().map_err(|e| {
            self.stats.set_exception_info(e.to_string());
            ConsumerError::Kafka(e)
        })?;

        if subscription.is_empty() {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();
            let handler: Arc<dyn RebalanceHandler> = self.stats.clone();
            if let Err(e) = self.handle.subscribe(&topics, handler) {
                error!("Failed to subscribe to topics {:?}: {e}", self.topics);
                self.stats.set_exception_info(e.to_string());
                return Err(ConsumerError::Subscribe {
                    topics: self.topics.clone(),
                    source: e,
                });
            }
            info!(topics = ?self.topics, "Subscribed to topics");
        } else {
            debug!(subscription = ?subscription, "Already subscribed to topics");
        }

        self.clean_unprocessed();

        // any flag except a stop can be cleared before reading a new block
        if self.stalled_status != StalledStatus::ConsumerStopped {
            self.stalled_status = StalledStatus::NoMessagesReturned;
        }

        Ok(())
    }

    /// Best effort: failures are logged and recorded, never returned.
    pub fn unsubscribe(&mut self) {
        debug!("Unsubscribing from topics {:?}", self.topics);
        self.clean_unprocessed();

        if let Err(e) = self.handle.unsubscribe() {
            error!("Error during unsubscribe: {e}");
            self.stats.set_exception_info(e.to_string());
        }
    }

    /// Hand out the next message of the current batch, polling a new batch
    /// once the current one is exhausted.
    ///
    /// `Ok(None)` means there is nothing to process right now; check
    /// [`stalled_status`](Self::stalled_status) for the reason.
    pub fn consume(&mut self) -> Result<Option<ReadBuffer<'_>>> {
        self.reset_if_stopped();
        if self.stalled_status == StalledStatus::ConsumerStopped {
            return Ok(None);
        }

        if self.has_more_polled_messages() {
            return Ok(self.next_message());
        }

        if self.settings.intermediate_commit {
            self.commit_stored_offsets()?;
        }

        self.poll_new_batch()?;

        if self.is_stalled() {
            metrics::counter!(KAFKA_CONSUMER_STALLS, "status" => self.stalled_status.as_str())
                .increment(1);
            return Ok(None);
        }

        Ok(self.next_message())
    }

    /// The message most recently returned by `consume()`.
    pub fn current_message(&self) -> Result<CurrentMessage<'_>> {
        self.last_delivered().map(CurrentMessage::new)
    }

    pub fn current_topic(&self) -> Result<&str> {
        Ok(self.current_message()?.topic())
    }

    pub fn current_key(&self) -> Result<Option<&[u8]>> {
        Ok(self.current_message()?.key())
    }

    pub fn current_offset(&self) -> Result<i64> {
        Ok(self.current_message()?.offset())
    }

    pub fn current_partition(&self) -> Result<i32> {
        Ok(self.current_message()?.partition())
    }

    pub fn current_timestamp(&self) -> Result<rdkafka::message::Timestamp> {
        Ok(self.current_message()?.timestamp())
    }

    pub fn current_headers(&self) -> Result<Option<&rdkafka::message::OwnedHeaders>> {
        Ok(self.current_message()?.headers())
    }

    pub fn current_payload(&self) -> Result<Option<&[u8]>> {
        Ok(self.current_message()?.payload())
    }

    /// Mark the last delivered message as processed. Only confirmed
    /// messages are ever committed, which gives at-least-once delivery.
    pub fn store_last_read_message_offset(&mut self) -> Result<()> {
        if self.is_stalled() {
            trace!(status = %self.stalled_status, "Stalled, not storing offset");
            return Ok(());
        }

        let message = self.last_delivered()?;
        let (topic, partition, next_offset) =
            (message.topic(), message.partition(), message.offset() + 1);

        if let Err(e) = self.handle.store_offset(topic, partition, next_offset) {
            error!("Failed to store offset {next_offset} for {topic}[{partition}]: {e}");
            self.stats.set_exception_info(e.to_string());
            return Err(ConsumerError::StoreOffset {
                topic: topic.to_string(),
                partition,
                offset: next_offset,
                source: e,
            });
        }
        self.offsets_stored += 1;

        let every = self.settings.intermediate_commit_every;
        if self.settings.intermediate_commit && every > 0 && self.offsets_stored >= every {
            self.commit_stored_offsets()?;
        }

        Ok(())
    }

    /// Commit all stored offsets. A no-op when nothing was stored.
    pub fn commit(&mut self) -> Result<()> {
        if self.has_more_polled_messages() {
            warn!(
                remaining = self.messages.len() - self.current,
                "Not all polled messages were processed before commit"
            );
        }
        self.commit_stored_offsets()
    }

    /// Drop the buffer and pending offsets, then move the handle back to the
    /// last committed offset of every assigned partition so anything not yet
    /// committed is delivered again.
    pub fn reset_to_last_committed(&mut self, reason: &str) -> Result<()> {
        self.clean_unprocessed();

        let assignment = match self.stats.assignment() {
            Some(assignment) if !assignment.is_empty() => assignment,
            _ => {
                trace!("Not assigned. Can't reset to last committed position.");
                return Ok(());
            }
        };

        let mut tpl = TopicPartitionList::new();
        for partition in &assignment {
            tpl.add_partition(partition.topic(), partition.partition_number());
        }

        let committed = self
            .handle
            .committed_offsets(&tpl, self.settings.committed_offsets_timeout)
            .and_then(|committed| self.handle.rewind(&committed).map(|_| committed))
            .map_err(|e| {
                error!("Failed to return to committed position ({reason}): {e}");
                self.stats.set_exception_info(e.to_string());
                ConsumerError::Reset(e)
            })?;

        for elem in committed.elements() {
            let offset = match elem.offset() {
                Offset::Offset(offset) => offset,
                _ => INVALID_OFFSET,
            };
            self.stats.set_position(
                Partition::new(elem.topic().to_string(), elem.partition()),
                offset,
            );
        }

        metrics::counter!(KAFKA_RESETS_TO_COMMITTED).increment(1);
        info!(
            partitions = committed.count(),
            "{reason} Returned to committed position"
        );

        Ok(())
    }

    /// Record an error for monitoring without failing anything.
    pub fn set_exception_info(&self, text: impl Into<String>) {
        self.stats.set_exception_info(text);
    }

    pub fn in_use(&self) {
        self.stats.set_in_use(true);
    }

    pub fn not_in_use(&self) {
        self.stats.set_in_use(false);
    }

    pub fn get_stat(&self) -> Stat {
        self.stats.get_stat()
    }

    /// Shared statistics, safe to read from any thread.
    pub fn stats_handle(&self) -> Arc<ConsumerStats> {
        self.stats.clone()
    }

    fn poll_new_batch(&mut self) -> Result<()> {
        self.clear_buffer();
        self.stalled_status = StalledStatus::NoMessagesReturned;

        let timeout = self.effective_poll_timeout();
        let had_assignment = self.stats.has_assignment();
        if !had_assignment {
            self.waited_for_assignment += 1;
        }

        let polled = self
            .handle
            .poll_batch(self.settings.batch_size, timeout);
        self.stats.record_poll();
        if let Some(member_id) = self.handle.member_id() {
            self.stats.set_consumer_id(member_id);
        }
        if !had_assignment && self.stats.has_assignment() {
            self.waited_for_assignment = 0;
        }

        self.reset_if_stopped();
        if self.stalled_status == StalledStatus::ConsumerStopped {
            debug!(
                discarded = polled.len(),
                "Consumer stopped, discarding polled batch"
            );
            return Ok(());
        }

        if self.stats.take_rebalance_flag() {
            self.stalled_status = StalledStatus::RebalanceHappened;
            self.waited_for_assignment = 0;
            self.offsets_stored = 0;
            if !polled.is_empty() {
                // we will not use this batch, so continue from the committed
                // position rather than after it
                self.reset_to_last_committed("Rewind last poll after rebalance.")?;
            }
            return Ok(());
        }

        if polled.is_empty() {
            if self.stats.has_assignment() {
                trace!("Stalled");
            } else {
                self.stalled_status = StalledStatus::NoAssignment;
                if self.assignment_wait_exhausted() {
                    warn!(
                        waited_polls = self.waited_for_assignment,
                        "Can't get assignment. Will keep trying."
                    );
                }
            }
            return Ok(());
        }

        let polled_count = polled.len();
        let messages = self.filter_message_errors(polled);
        if messages.is_empty() {
            error!(polled = polled_count, "Only errors left");
            self.stalled_status = StalledStatus::ErrorsReturned;
            return Ok(());
        }

        let messages = Self::skip_tombstones(messages);
        if messages.is_empty() {
            trace!("Only tombstones polled");
            return Ok(());
        }

        trace!(
            messages = messages.len(),
            "Polled batch of {} messages",
            messages.len()
        );
        metrics::counter!(KAFKA_MESSAGES_POLLED).increment(messages.len() as u64);

        self.messages = messages;
        self.current = 0;
        self.stalled_status = StalledStatus::NotStalled;

        Ok(())
    }

    /// Drop per-message errors from a polled batch, recording each of them.
    fn filter_message_errors(
        &self,
        polled: Vec<KafkaResult<OwnedMessage>>,
    ) -> Vec<OwnedMessage> {
        let mut messages = Vec::with_capacity(polled.len());
        let mut skipped = 0;

        for result in polled {
            match result {
                Ok(message) => messages.push(message),
                Err(e) => {
                    skipped += 1;
                    metrics::counter!(KAFKA_CONSUMER_ERRORS).increment(1);
                    error!("Consumer error: {e}");
                    self.stats.set_exception_info(e.to_string());
                }
            }
        }

        if skipped > 0 {
            error!("There were {skipped} messages with an error");
        }

        messages
    }

    /// Messages without a payload are never handed out, so the cursor can
    /// only ever rest on a deliverable message.
    fn skip_tombstones(mut messages: Vec<OwnedMessage>) -> Vec<OwnedMessage> {
        messages.retain(|message| {
            if message.payload().is_some() {
                return true;
            }
            debug!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                "Skipping message without payload"
            );
            false
        });
        messages
    }

    fn next_message(&mut self) -> Option<ReadBuffer<'_>> {
        let message = self.messages.get(self.current)?;
        self.current += 1;
        self.stats
            .record_delivery(message.topic(), message.partition(), message.offset());
        message.payload().map(ReadBuffer::new)
    }

    fn last_delivered(&self) -> Result<&OwnedMessage> {
        self.current
            .checked_sub(1)
            .and_then(|index| self.messages.get(index))
            .ok_or(ConsumerError::NoCurrentMessage)
    }

    fn commit_stored_offsets(&mut self) -> Result<()> {
        if self.offsets_stored == 0 {
            trace!("Nothing to commit.");
            return Ok(());
        }

        match self.handle.commit_stored() {
            Ok(()) => {
                self.stats.record_commit();
                metrics::counter!(KAFKA_COMMITS).increment(1);
                debug!(offsets = self.offsets_stored, "Committed stored offsets");
            }
            // nothing was actually pending at the broker, retrying won't help
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {
                debug!("No offsets to commit");
            }
            Err(e) => {
                // only widens the window for duplicates after a rebalance
                error!("Exception during commit attempt: {e}");
                metrics::counter!(KAFKA_COMMIT_FAILURES).increment(1);
                self.stats.set_exception_info(e.to_string());
                return Err(ConsumerError::Commit(e));
            }
        }

        self.offsets_stored = 0;
        Ok(())
    }

    fn effective_poll_timeout(&self) -> Duration {
        if !self.stats.has_assignment() && self.assignment_wait_exhausted() {
            self.settings
                .poll_timeout_without_assignment
                .min(self.settings.poll_timeout)
        } else {
            self.settings.poll_timeout
        }
    }

    fn assignment_wait_exhausted(&self) -> bool {
        let waited = self
            .settings
            .poll_timeout
            .saturating_mul(u32::try_from(self.waited_for_assignment).unwrap_or(u32::MAX));
        waited >= self.settings.max_wait_for_assignment
    }

    fn reset_if_stopped(&mut self) {
        if self.shutdown.is_cancelled() {
            self.stalled_status = StalledStatus::ConsumerStopped;
            self.clean_unprocessed();
        }
    }

    fn clear_buffer(&mut self) {
        self.messages.clear();
        self.current = 0;
    }

    /// Forget the buffer and the pending offset count without committing.
    pub fn clean_unprocessed(&mut self) {
        self.clear_buffer();
        self.offsets_stored = 0;
    }

    /// Flush queued callbacks and messages after unsubscribing, so closing
    /// the client does not hang. Results are discarded.
    fn drain(&mut self) {
        let start = Instant::now();
        let mut last_error: Option<String> = None;

        loop {
            match self.handle.poll_one(self.settings.drain_poll_interval) {
                None => break,
                Some(Ok(_)) => last_error = None,
                Some(Err(KafkaError::PartitionEOF(_))) => break,
                Some(Err(e)) => {
                    let text = e.to_string();
                    // only stop on an error that repeats back to back
                    if last_error.as_deref() == Some(text.as_str()) {
                        break;
                    }
                    error!("Error during draining: {text}");
                    self.stats.set_exception_info(text.clone());
                    last_error = Some(text);
                }
            }

            if start.elapsed() > self.settings.drain_timeout {
                error!("Timeout during draining.");
                break;
            }
        }
    }

    fn teardown(&mut self) {
        match self.handle.subscription() {
            Ok(subscription) if !subscription.is_empty() => {
                self.unsubscribe();
                self.drain();
            }
            Ok(_) => {}
            Err(e) => {
                error!("Error while destructing consumer: {e}");
                self.stats.set_exception_info(e.to_string());
            }
        }

        self.clean_unprocessed();
        self.stats.clear_assignment();
    }
}

impl<H: ConsumerHandle> Drop for KafkaConsumer<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::test_utils::{
        message_error, partition_list, test_message, tombstone_message, FakeConsumerHandle,
        ScriptedPoll,
    };

    fn consumer_with(
        handle: &FakeConsumerHandle,
        settings: ConsumerSettings,
    ) -> KafkaConsumer<FakeConsumerHandle> {
        KafkaConsumer::new(
            handle.clone(),
            settings,
            CancellationToken::new(),
            vec!["events".to_string()],
        )
    }

    #[test]
    fn test_accessors_fail_before_first_message() {
        let handle = FakeConsumerHandle::new();
        let consumer = consumer_with(&handle, ConsumerSettings::default());

        assert!(matches!(
            consumer.current_message(),
            Err(ConsumerError::NoCurrentMessage)
        ));
        assert!(matches!(
            consumer.current_offset(),
            Err(ConsumerError::NoCurrentMessage)
        ));
        assert_eq!(consumer.stalled_status(), StalledStatus::NoMessagesReturned);
        assert!(!consumer.polled_data_unusable());
    }

    #[test]
    fn test_tombstones_are_skipped() {
        let handle = FakeConsumerHandle::new();
        let tombstone = tombstone_message("events", 0, 0);
        handle.push_poll(
            ScriptedPoll::new()
                .assign(partition_list(&[("events", 0)]))
                .messages(vec![Ok(tombstone), Ok(test_message("events", 0, 1, "b"))]),
        );

        let mut consumer = consumer_with(&handle, ConsumerSettings::new(10, Duration::ZERO));
        consumer.subscribe().unwrap();

        let payload = consumer.consume().unwrap().map(|b| b.as_bytes().to_vec());
        assert_eq!(payload, Some(b"b".to_vec()));
        assert_eq!(consumer.current_offset().unwrap(), 1);
        assert_eq!(consumer.get_stat().num_messages_read, 1);
    }

    #[test]
    fn test_trailing_tombstone_polls_next_batch() {
        let handle = FakeConsumerHandle::new();
        handle.push_poll(
            ScriptedPoll::new()
                .assign(partition_list(&[("events", 0)]))
                .messages(vec![
                    Ok(test_message("events", 0, 0, "a")),
                    Ok(tombstone_message("events", 0, 1)),
                ]),
        );
        handle.push_poll(
            ScriptedPoll::new().messages(vec![Ok(test_message("events", 0, 2, "c"))]),
        );

        let mut consumer = consumer_with(&handle, ConsumerSettings::new(10, Duration::ZERO));
        consumer.subscribe().unwrap();

        assert!(consumer.consume().unwrap().is_some());
        assert_eq!(consumer.current_offset().unwrap(), 0);
        assert!(!consumer.has_more_polled_messages());

        let payload = consumer.consume().unwrap().map(|b| b.as_bytes().to_vec());
        assert_eq!(payload, Some(b"c".to_vec()));
        assert_eq!(handle.poll_timeouts().len(), 2);
        assert_eq!(consumer.current_offset().unwrap(), 2);
        assert_eq!(consumer.stalled_status(), StalledStatus::NotStalled);
    }

    #[test]
    fn test_batch_of_tombstones_stalls() {
        let handle = FakeConsumerHandle::new();
        handle.push_poll(
            ScriptedPoll::new()
                .assign(partition_list(&[("events", 0)]))
                .messages(vec![
                    Ok(tombstone_message("events", 0, 0)),
                    Ok(tombstone_message("events", 0, 1)),
                ]),
        );

        let mut consumer = consumer_with(&handle, ConsumerSettings::new(10, Duration::ZERO));
        consumer.subscribe().unwrap();

        assert!(consumer.consume().unwrap().is_none());
        assert_eq!(consumer.stalled_status(), StalledStatus::NoMessagesReturned);
        assert!(!consumer.has_more_polled_messages());
        assert!(matches!(
            consumer.current_offset(),
            Err(ConsumerError::NoCurrentMessage)
        ));
        assert_eq!(consumer.get_stat().num_messages_read, 0);
    }

    #[test]
    fn test_store_offset_stores_next_offset() {
        let handle = FakeConsumerHandle::new();
        handle.push_poll(
            ScriptedPoll::new()
                .assign(partition_list(&[("events", 2)]))
                .messages(vec![Ok(test_message("events", 2, 41, "a"))]),
        );

        let mut consumer = consumer_with(&handle, ConsumerSettings::new(10, Duration::ZERO));
        consumer.subscribe().unwrap();
        assert!(consumer.consume().unwrap().is_some());
        consumer.store_last_read_message_offset().unwrap();

        assert_eq!(
            handle.stored_offsets(),
            vec![("events".to_string(), 2, 42)]
        );
        assert_eq!(consumer.offsets_stored(), 1);
    }

    #[test]
    fn test_store_offset_is_ignored_while_stalled() {
        let handle = FakeConsumerHandle::new();
        handle.push_poll(ScriptedPoll::new().messages(vec![Err(message_error())]));

        let mut consumer = consumer_with(&handle, ConsumerSettings::new(10, Duration::ZERO));
        consumer.subscribe().unwrap();
        assert!(consumer.consume().unwrap().is_none());
        assert_eq!(consumer.stalled_status(), StalledStatus::ErrorsReturned);

        consumer.store_last_read_message_offset().unwrap();
        assert_eq!(consumer.offsets_stored(), 0);
        assert!(handle.stored_offsets().is_empty());
    }

    #[test]
    fn test_no_offset_commit_error_counts_as_nothing_to_commit() {
        let handle = FakeConsumerHandle::new();
        handle.push_poll(
            ScriptedPoll::new()
                .assign(partition_list(&[("events", 0)]))
                .messages(vec![Ok(test_message("events", 0, 0, "a"))]),
        );
        handle.fail_next_commit(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset));

        let mut consumer = consumer_with(&handle, ConsumerSettings::new(10, Duration::ZERO));
        consumer.subscribe().unwrap();
        assert!(consumer.consume().unwrap().is_some());
        consumer.store_last_read_message_offset().unwrap();

        consumer.commit().unwrap();
        assert_eq!(consumer.offsets_stored(), 0);
        assert_eq!(consumer.get_stat().num_commits, 0);
    }

    #[test]
    fn test_assignment_wait_shortens_poll_timeout() {
        let handle = FakeConsumerHandle::new();
        let settings = ConsumerSettings::new(10, Duration::from_millis(100))
            .with_max_wait_for_assignment(Duration::from_millis(200))
            .with_poll_timeout_without_assignment(Duration::from_millis(5));
        let mut consumer = consumer_with(&handle, settings);
        consumer.subscribe().unwrap();

        for _ in 0..3 {
            assert!(consumer.consume().unwrap().is_none());
            assert_eq!(consumer.stalled_status(), StalledStatus::NoAssignment);
        }

        assert_eq!(consumer.waited_for_assignment(), 3);
        assert_eq!(
            handle.poll_timeouts(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(100),
                Duration::from_millis(5),
            ]
        );
    }

    #[test]
    fn test_member_id_is_published_after_poll() {
        let handle = FakeConsumerHandle::new();
        let mut consumer = consumer_with(&handle, ConsumerSettings::new(10, Duration::ZERO));
        consumer.subscribe().unwrap();
        assert_eq!(consumer.get_stat().consumer_id, "");

        assert!(consumer.consume().unwrap().is_none());
        assert_eq!(consumer.get_stat().consumer_id, FakeConsumerHandle::MEMBER_ID);
    }

    #[test]
    fn test_drain_stops_on_repeated_error() {
        let handle = FakeConsumerHandle::new();
        handle.push_drain(Ok(test_message("events", 0, 5, "late")));
        handle.push_drain(Err(message_error()));
        handle.push_drain(Err(message_error()));
        handle.push_drain(Ok(test_message("events", 0, 6, "never polled")));

        {
            let mut consumer =
                consumer_with(&handle, ConsumerSettings::new(10, Duration::ZERO));
            consumer.subscribe().unwrap();
        }

        assert_eq!(handle.unsubscribe_calls(), 1);
        assert_eq!(handle.drain_polls(), 3);
        assert_eq!(handle.remaining_drain(), 1);
    }

    #[test]
    fn test_drop_without_subscription_skips_drain() {
        let handle = FakeConsumerHandle::new();
        handle.push_drain(Ok(test_message("events", 0, 5, "late")));
        {
            let _consumer = consumer_with(&handle, ConsumerSettings::default());
        }

        assert_eq!(handle.unsubscribe_calls(), 0);
        assert_eq!(handle.drain_polls(), 0);
    }
}

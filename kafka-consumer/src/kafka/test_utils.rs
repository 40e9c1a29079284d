use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rdkafka::error::{KafkaError, KafkaResult, RDKafkaErrorCode};
use rdkafka::message::{OwnedMessage, Timestamp};
use rdkafka::{Offset, TopicPartitionList};
use tokio_util::sync::CancellationToken;

use super::handle::ConsumerHandle;
use super::rebalance_handler::RebalanceHandler;

/// Test utilities for kafka module tests and the tests/ directory

pub fn test_message(topic: &str, partition: i32, offset: i64, payload: &str) -> OwnedMessage {
    OwnedMessage::new(
        Some(payload.as_bytes().to_vec()),
        Some(format!("key-{offset}").into_bytes()),
        topic.to_string(),
        Timestamp::CreateTime(1_700_000_000_000 + offset),
        partition,
        offset,
        None,
    )
}

pub fn tombstone_message(topic: &str, partition: i32, offset: i64) -> OwnedMessage {
    OwnedMessage::new(
        None,
        Some(format!("key-{offset}").into_bytes()),
        topic.to_string(),
        Timestamp::CreateTime(1_700_000_000_000 + offset),
        partition,
        offset,
        None,
    )
}

/// A per-message error as the broker client would report it inline.
pub fn message_error() -> KafkaError {
    KafkaError::MessageConsumption(RDKafkaErrorCode::UnknownTopicOrPartition)
}

pub fn partition_list(partitions: &[(&str, i32)]) -> TopicPartitionList {
    let mut tpl = TopicPartitionList::new();
    for (topic, partition) in partitions {
        tpl.add_partition(topic, *partition);
    }
    tpl
}

/// Things that happen inside a scripted poll, before it returns.
pub enum PollEvent {
    Assign(TopicPartitionList),
    Revoke(TopicPartitionList),
    RebalanceError(String),
    Shutdown(CancellationToken),
}

/// One scripted answer of [`FakeConsumerHandle::poll_batch`].
#[derive(Default)]
pub struct ScriptedPoll {
    events: Vec<PollEvent>,
    results: Vec<KafkaResult<OwnedMessage>>,
}

impl ScriptedPoll {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(mut self, partitions: TopicPartitionList) -> Self {
        self.events.push(PollEvent::Assign(partitions));
        self
    }

    pub fn revoke(mut self, partitions: TopicPartitionList) -> Self {
        self.events.push(PollEvent::Revoke(partitions));
        self
    }

    pub fn rebalance_error(mut self, error: &str) -> Self {
        self.events.push(PollEvent::RebalanceError(error.to_string()));
        self
    }

    /// Cancel `token` while the poll is in flight.
    pub fn shutdown(mut self, token: &CancellationToken) -> Self {
        self.events.push(PollEvent::Shutdown(token.clone()));
        self
    }

    pub fn messages(mut self, results: Vec<KafkaResult<OwnedMessage>>) -> Self {
        self.results = results;
        self
    }
}

#[derive(Default)]
struct FakeState {
    subscription: Vec<String>,
    rebalance_handler: Option<Arc<dyn RebalanceHandler>>,
    polls: VecDeque<ScriptedPoll>,
    poll_timeouts: Vec<Duration>,
    drain: VecDeque<KafkaResult<OwnedMessage>>,
    drain_polls: usize,
    stored: Vec<(String, i32, i64)>,
    pending: HashMap<(String, i32), i64>,
    committed: HashMap<(String, i32), i64>,
    commit_calls: usize,
    next_commit_error: Option<KafkaError>,
    rewinds: Vec<Vec<(String, i32, Offset)>>,
    unsubscribe_calls: usize,
    unsubscribe_error: Option<KafkaError>,
    subscribe_error: Option<KafkaError>,
}

/// In-memory [`ConsumerHandle`] replaying scripted polls.
///
/// Clones share state, so a test can keep one clone for assertions while the
/// consumer owns another. Rebalance events fire synchronously from inside
/// `poll_batch`, like librdkafka callbacks do.
#[derive(Clone, Default)]
pub struct FakeConsumerHandle {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConsumerHandle {
    pub const MEMBER_ID: &'static str = "rdkafka-fake-member";

    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn push_poll(&self, poll: ScriptedPoll) {
        self.state().polls.push_back(poll);
    }

    pub fn push_drain(&self, result: KafkaResult<OwnedMessage>) {
        self.state().drain.push_back(result);
    }

    pub fn fail_next_commit(&self, error: KafkaError) {
        self.state().next_commit_error = Some(error);
    }

    pub fn fail_next_subscribe(&self, error: KafkaError) {
        self.state().subscribe_error = Some(error);
    }

    /// The failed call leaves the subscription in place.
    pub fn fail_next_unsubscribe(&self, error: KafkaError) {
        self.state().unsubscribe_error = Some(error);
    }

    /// Pretend the broker already holds committed offsets.
    pub fn set_committed(&self, topic: &str, partition: i32, offset: i64) {
        self.state()
            .committed
            .insert((topic.to_string(), partition), offset);
    }

    pub fn committed(&self, topic: &str, partition: i32) -> Option<i64> {
        self.state()
            .committed
            .get(&(topic.to_string(), partition))
            .copied()
    }

    pub fn stored_offsets(&self) -> Vec<(String, i32, i64)> {
        self.state().stored.clone()
    }

    pub fn commit_calls(&self) -> usize {
        self.state().commit_calls
    }

    pub fn rewinds(&self) -> Vec<Vec<(String, i32, Offset)>> {
        self.state().rewinds.clone()
    }

    pub fn poll_timeouts(&self) -> Vec<Duration> {
        self.state().poll_timeouts.clone()
    }

    pub fn remaining_polls(&self) -> usize {
        self.state().polls.len()
    }

    pub fn drain_polls(&self) -> usize {
        self.state().drain_polls
    }

    pub fn remaining_drain(&self) -> usize {
        self.state().drain.len()
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.state().unsubscribe_calls
    }

    pub fn current_subscription(&self) -> Vec<String> {
        self.state().subscription.clone()
    }
}

impl ConsumerHandle for FakeConsumerHandle {
    fn subscribe(
        &self,
        topics: &[&str],
        rebalance_handler: Arc<dyn RebalanceHandler>,
    ) -> KafkaResult<()> {
        let mut state = self.state();
        if let Some(e) = state.subscribe_error.take() {
            return Err(e);
        }
        state.subscription = topics.iter().map(|t| t.to_string()).collect();
        state.rebalance_handler = Some(rebalance_handler);
        Ok(())
    }

    fn subscription(&self) -> KafkaResult<Vec<String>> {
        Ok(self.state().subscription.clone())
    }

    fn unsubscribe(&self) -> KafkaResult<()> {
        let mut state = self.state();
        state.unsubscribe_calls += 1;
        if let Some(e) = state.unsubscribe_error.take() {
            return Err(e);
        }
        state.subscription.clear();
        Ok(())
    }

    fn poll_batch(
        &self,
        max_messages: usize,
        timeout: Duration,
    ) -> Vec<KafkaResult<OwnedMessage>> {
        // release the lock before invoking callbacks
        let (poll, handler) = {
            let mut state = self.state();
            state.poll_timeouts.push(timeout);
            (state.polls.pop_front(), state.rebalance_handler.clone())
        };
        let Some(poll) = poll else {
            return Vec::new();
        };

        for event in poll.events {
            match (event, handler.as_ref()) {
                (PollEvent::Assign(tpl), Some(handler)) => handler.on_partitions_assigned(&tpl),
                (PollEvent::Revoke(tpl), Some(handler)) => handler.on_partitions_revoked(&tpl),
                (PollEvent::RebalanceError(e), Some(handler)) => handler.on_rebalance_error(&e),
                (PollEvent::Shutdown(token), _) => token.cancel(),
                (_, None) => {}
            }
        }

        poll.results.into_iter().take(max_messages).collect()
    }

    fn poll_one(&self, _timeout: Duration) -> Option<KafkaResult<OwnedMessage>> {
        let mut state = self.state();
        state.drain_polls += 1;
        state.drain.pop_front()
    }

    fn store_offset(&self, topic: &str, partition: i32, next_offset: i64) -> KafkaResult<()> {
        let mut state = self.state();
        state.stored.push((topic.to_string(), partition, next_offset));
        state
            .pending
            .insert((topic.to_string(), partition), next_offset);
        Ok(())
    }

    fn commit_stored(&self) -> KafkaResult<()> {
        let mut state = self.state();
        state.commit_calls += 1;
        if let Some(e) = state.next_commit_error.take() {
            return Err(e);
        }
        let pending: Vec<((String, i32), i64)> = state.pending.drain().collect();
        state.committed.extend(pending);
        Ok(())
    }

    fn committed_offsets(
        &self,
        partitions: &TopicPartitionList,
        _timeout: Duration,
    ) -> KafkaResult<TopicPartitionList> {
        let state = self.state();
        let mut tpl = TopicPartitionList::new();
        for elem in partitions.elements() {
            let offset = state
                .committed
                .get(&(elem.topic().to_string(), elem.partition()))
                .map(|offset| Offset::Offset(*offset))
                .unwrap_or(Offset::Invalid);
            tpl.add_partition_offset(elem.topic(), elem.partition(), offset)?;
        }
        Ok(tpl)
    }

    fn rewind(&self, offsets: &TopicPartitionList) -> KafkaResult<()> {
        let rewound = offsets
            .elements()
            .into_iter()
            .map(|elem| (elem.topic().to_string(), elem.partition(), elem.offset()))
            .collect();
        self.state().rewinds.push(rewound);
        Ok(())
    }

    fn member_id(&self) -> Option<String> {
        Some(Self::MEMBER_ID.to_string())
    }
}

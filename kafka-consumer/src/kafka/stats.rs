//! Runtime statistics shared between the consuming thread and monitoring.
//!
//! One thread drives the consumer, but rebalance callbacks and any number of
//! monitoring readers touch the same state. Every field is individually atomic
//! or lock-guarded; a [`Stat`] snapshot is therefore not transactionally
//! consistent across fields, only each field on its own.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use dashmap::DashMap;
use rdkafka::{Offset, TopicPartitionList};
use serde::Serialize;
use tracing::{error, info};

use crate::kafka::rebalance_handler::RebalanceHandler;
use crate::kafka::types::Partition;
use crate::metrics_consts::{
    KAFKA_REBALANCE_ASSIGNMENTS, KAFKA_REBALANCE_ERRORS, KAFKA_REBALANCE_REVOCATIONS,
};

/// Raw value librdkafka reports for a partition without a known position.
pub const INVALID_OFFSET: i64 = -1001;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatAssignment {
    pub topic: String,
    pub partition_id: i32,
    pub current_offset: i64,
}

/// Point-in-time view of a consumer. Timestamps are microseconds since the
/// unix epoch, zero meaning "never happened".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stat {
    pub consumer_id: String,
    pub assignments: Vec<StatAssignment>,
    pub last_exception: String,
    pub last_exception_time: u64,
    pub last_poll_time: u64,
    pub num_messages_read: u64,
    pub last_commit_timestamp_usec: u64,
    pub last_rebalance_timestamp_usec: u64,
    pub num_commits: u64,
    pub num_rebalance_assignments: u64,
    pub num_rebalance_revocations: u64,
    pub in_use: bool,
}

#[derive(Default)]
struct ExceptionInfo {
    text: String,
}

/// Consumer state that must stay observable from outside the consuming
/// thread. Shared via `Arc` with the rebalance callbacks and monitoring.
#[derive(Default)]
pub struct ConsumerStats {
    consumer_id: RwLock<String>,

    /// Absent until the first assignment callback fires.
    assignment: RwLock<Option<Vec<Partition>>>,

    /// Next offset to be delivered, per assigned partition.
    positions: DashMap<Partition, i64>,

    /// Set by the revoke callback, taken by the engine after a poll.
    rebalance_happened: AtomicBool,

    last_exception: Mutex<ExceptionInfo>,
    last_exception_timestamp_usec: AtomicU64,

    last_poll_timestamp_usec: AtomicU64,
    num_messages_read: AtomicU64,
    last_commit_timestamp_usec: AtomicU64,
    num_commits: AtomicU64,
    last_rebalance_timestamp_usec: AtomicU64,
    num_rebalance_assignments: AtomicU64,
    num_rebalance_revocations: AtomicU64,
    in_use: AtomicBool,
}

impl ConsumerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_exception_info(&self, text: impl Into<String>) {
        let mut guard = self
            .last_exception
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        guard.text = text.into();
        self.last_exception_timestamp_usec
            .store(now_micros(), Ordering::Relaxed);
    }

    pub fn set_consumer_id(&self, id: String) {
        let mut guard = self
            .consumer_id
            .write()
            .unwrap_or_else(|poison| poison.into_inner());
        if *guard != id {
            *guard = id;
        }
    }

    pub fn set_in_use(&self, in_use: bool) {
        self.in_use.store(in_use, Ordering::Relaxed);
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Relaxed)
    }

    pub fn has_assignment(&self) -> bool {
        self.assignment
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .is_some()
    }

    /// Currently owned partitions, `None` before the first assignment and
    /// after a revocation.
    pub fn assignment(&self) -> Option<Vec<Partition>> {
        self.assignment
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    pub fn clear_assignment(&self) {
        *self
            .assignment
            .write()
            .unwrap_or_else(|poison| poison.into_inner()) = None;
        self.positions.clear();
    }

    /// Returns whether a revocation happened since the last call, clearing
    /// the flag.
    pub fn take_rebalance_flag(&self) -> bool {
        self.rebalance_happened.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn record_poll(&self) {
        self.last_poll_timestamp_usec
            .store(now_micros(), Ordering::Relaxed);
    }

    pub(crate) fn record_delivery(&self, topic: &str, partition: i32, offset: i64) {
        self.num_messages_read.fetch_add(1, Ordering::Relaxed);
        self.set_position(Partition::new(topic.to_string(), partition), offset + 1);
    }

    pub(crate) fn record_commit(&self) {
        self.num_commits.fetch_add(1, Ordering::Relaxed);
        self.last_commit_timestamp_usec
            .store(now_micros(), Ordering::Relaxed);
    }

    pub(crate) fn set_position(&self, partition: Partition, offset: i64) {
        self.positions.insert(partition, offset);
    }

    pub fn num_messages_read(&self) -> u64 {
        self.num_messages_read.load(Ordering::Relaxed)
    }

    pub fn num_commits(&self) -> u64 {
        self.num_commits.load(Ordering::Relaxed)
    }

    pub fn num_rebalance_assignments(&self) -> u64 {
        self.num_rebalance_assignments.load(Ordering::Relaxed)
    }

    pub fn num_rebalance_revocations(&self) -> u64 {
        self.num_rebalance_revocations.load(Ordering::Relaxed)
    }

    pub fn get_stat(&self) -> Stat {
        let assignments = self
            .assignment()
            .unwrap_or_default()
            .into_iter()
            .map(|partition| {
                let current_offset = self
                    .positions
                    .get(&partition)
                    .map(|offset| *offset)
                    .unwrap_or(INVALID_OFFSET);
                StatAssignment {
                    topic: partition.topic().to_string(),
                    partition_id: partition.partition_number(),
                    current_offset,
                }
            })
            .collect();

        let last_exception = self
            .last_exception
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .text
            .clone();

        Stat {
            consumer_id: self
                .consumer_id
                .read()
                .unwrap_or_else(|poison| poison.into_inner())
                .clone(),
            assignments,
            last_exception,
            last_exception_time: self.last_exception_timestamp_usec.load(Ordering::Relaxed),
            last_poll_time: self.last_poll_timestamp_usec.load(Ordering::Relaxed),
            num_messages_read: self.num_messages_read.load(Ordering::Relaxed),
            last_commit_timestamp_usec: self.last_commit_timestamp_usec.load(Ordering::Relaxed),
            last_rebalance_timestamp_usec: self
                .last_rebalance_timestamp_usec
                .load(Ordering::Relaxed),
            num_commits: self.num_commits.load(Ordering::Relaxed),
            num_rebalance_assignments: self.num_rebalance_assignments.load(Ordering::Relaxed),
            num_rebalance_revocations: self.num_rebalance_revocations.load(Ordering::Relaxed),
            in_use: self.in_use.load(Ordering::Relaxed),
        }
    }
}

impl RebalanceHandler for ConsumerStats {
    fn on_partitions_assigned(&self, partitions: &TopicPartitionList) {
        let assigned: Vec<Partition> = partitions
            .elements()
            .into_iter()
            .map(|elem| {
                let partition = Partition::new(elem.topic().to_string(), elem.partition());
                let offset = match elem.offset() {
                    Offset::Offset(offset) => offset,
                    _ => INVALID_OFFSET,
                };
                self.set_position(partition.clone(), offset);
                partition
            })
            .collect();

        info!(
            partitions = assigned.len(),
            "Topics/partitions assigned: {:?}", assigned
        );

        *self
            .assignment
            .write()
            .unwrap_or_else(|poison| poison.into_inner()) = Some(assigned);
        self.num_rebalance_assignments
            .fetch_add(1, Ordering::Relaxed);
        self.last_rebalance_timestamp_usec
            .store(now_micros(), Ordering::Relaxed);
        metrics::counter!(KAFKA_REBALANCE_ASSIGNMENTS).increment(1);
    }

    fn on_partitions_revoked(&self, partitions: &TopicPartitionList) {
        info!(
            partitions = partitions.count(),
            "Rebalance initiated, revoking partitions"
        );

        // Anything buffered or stored for these partitions is no longer safe
        // to commit; the engine discards it when it sees the flag.
        self.rebalance_happened.store(true, Ordering::Release);
        self.clear_assignment();
        self.num_rebalance_revocations
            .fetch_add(1, Ordering::Relaxed);
        self.last_rebalance_timestamp_usec
            .store(now_micros(), Ordering::Relaxed);
        metrics::counter!(KAFKA_REBALANCE_REVOCATIONS).increment(1);
    }

    fn on_rebalance_error(&self, error: &str) {
        error!("Rebalance error: {error}");
        metrics::counter!(KAFKA_REBALANCE_ERRORS).increment(1);
        self.set_exception_info(error);
    }
}

pub(crate) fn now_micros() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_micros()).unwrap_or_default()
}

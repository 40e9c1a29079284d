// ==== Consumer lifecycle ====
/// Gauge for the number of live consumer adapters in this process
pub const KAFKA_CONSUMERS_LIVE: &str = "kafka_consumers_live";

// ==== Polling ====
/// Counter for usable messages handed over by a poll
pub const KAFKA_MESSAGES_POLLED: &str = "kafka_messages_polled_total";

/// Counter for per-message errors reported by the broker client
pub const KAFKA_CONSUMER_ERRORS: &str = "kafka_consumer_errors_total";

/// Counter for polls that ended in a stall, labelled by stall status
pub const KAFKA_CONSUMER_STALLS: &str = "kafka_consumer_stalls_total";

// ==== Offsets ====
/// Counter for successful offset commits
pub const KAFKA_COMMITS: &str = "kafka_commits_total";

/// Counter for failed offset commits
pub const KAFKA_COMMIT_FAILURES: &str = "kafka_commit_failures_total";

/// Counter for rewinds to the last committed position
pub const KAFKA_RESETS_TO_COMMITTED: &str = "kafka_resets_to_committed_total";

// ==== Rebalance ====
/// Counter for partition assignment callbacks
pub const KAFKA_REBALANCE_ASSIGNMENTS: &str = "kafka_rebalance_assignments_total";

/// Counter for partition revocation callbacks
pub const KAFKA_REBALANCE_REVOCATIONS: &str = "kafka_rebalance_revocations_total";

/// Counter for rebalance protocol errors
pub const KAFKA_REBALANCE_ERRORS: &str = "kafka_rebalance_errors_total";

/// Counter for rebalance callbacks skipped because the partition list was empty
pub const KAFKA_REBALANCE_EMPTY_SKIPPED: &str = "kafka_rebalance_empty_skipped_total";

// ==== Driver ====
/// Counter for messages handled by the service's processor
pub const KAFKA_MESSAGES_PROCESSED: &str = "kafka_messages_processed_total";

/// Counter for failures seen by the driver loop
pub const KAFKA_DRIVER_ERRORS: &str = "kafka_driver_errors_total";

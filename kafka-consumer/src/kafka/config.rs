use std::time::Duration;

use rdkafka::ClientConfig;

/// Tuning knobs of the consumer adapter itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerSettings {
    /// Upper bound on messages requested per poll
    pub batch_size: usize,

    /// Bounded wait of a single poll call
    pub poll_timeout: Duration,

    /// Commit pending offsets before every new poll
    pub intermediate_commit: bool,

    /// With `intermediate_commit`, also commit after this many stored
    /// offsets (0 = only before polling)
    pub intermediate_commit_every: usize,

    /// Accumulated wait without an assignment after which polls are shortened
    pub max_wait_for_assignment: Duration,

    /// Poll timeout used once `max_wait_for_assignment` is exhausted
    pub poll_timeout_without_assignment: Duration,

    /// Upper bound on the teardown drain
    pub drain_timeout: Duration,

    /// Per-poll wait while draining
    pub drain_poll_interval: Duration,

    /// Timeout for looking up committed offsets when rewinding
    pub committed_offsets_timeout: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            batch_size: 1,
            poll_timeout: Duration::from_millis(500),
            intermediate_commit: true,
            intermediate_commit_every: 0,
            max_wait_for_assignment: Duration::from_secs(15),
            poll_timeout_without_assignment: Duration::from_millis(50),
            drain_timeout: Duration::from_secs(5),
            drain_poll_interval: Duration::from_millis(100),
            committed_offsets_timeout: Duration::from_secs(5),
        }
    }
}

impl ConsumerSettings {
    pub fn new(batch_size: usize, poll_timeout: Duration) -> Self {
        Self {
            // a zero-sized batch would never make progress
            batch_size: batch_size.max(1),
            poll_timeout,
            ..Self::default()
        }
    }

    pub fn with_intermediate_commit(mut self, enabled: bool) -> Self {
        self.intermediate_commit = enabled;
        self
    }

    pub fn with_intermediate_commit_every(mut self, stored_offsets: usize) -> Self {
        self.intermediate_commit_every = stored_offsets;
        self
    }

    pub fn with_max_wait_for_assignment(mut self, wait: Duration) -> Self {
        self.max_wait_for_assignment = wait;
        self
    }

    pub fn with_poll_timeout_without_assignment(mut self, timeout: Duration) -> Self {
        self.poll_timeout_without_assignment = timeout;
        self
    }

    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_committed_offsets_timeout(mut self, timeout: Duration) -> Self {
        self.committed_offsets_timeout = timeout;
        self
    }
}

/// rdkafka client configuration for an adapter-driven consumer.
///
/// Offsets are stored and committed explicitly by the adapter, so automatic
/// storing and committing are always disabled.
pub struct ConsumerConfigBuilder {
    config: ClientConfig,
}

impl ConsumerConfigBuilder {
    pub fn new(bootstrap_servers: &str, group_id: &str) -> Self {
        let mut config = ClientConfig::new();

        config
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.auto.offset.store", "false")
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .set("socket.timeout.ms", "10000")
            .set("session.timeout.ms", "60000")
            .set("heartbeat.interval.ms", "5000")
            .set("max.poll.interval.ms", "300000");

        Self { config }
    }

    /// Enable TLS/SSL for Kafka connection
    pub fn with_tls(mut self, enabled: bool) -> Self {
        if enabled {
            self.config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        }
        self
    }

    pub fn with_offset_reset(mut self, policy: &str) -> Self {
        self.config.set("auto.offset.reset", policy);
        self
    }

    pub fn with_client_id(mut self, client_id: &str) -> Self {
        self.config.set("client.id", client_id);
        self
    }

    pub fn with_session_timeout_ms(mut self, ms: u32) -> Self {
        self.config.set("session.timeout.ms", ms.to_string());
        self
    }

    /// Maximum time between poll() calls before the consumer leaves the group
    pub fn with_max_poll_interval_ms(mut self, ms: u32) -> Self {
        self.config.set("max.poll.interval.ms", ms.to_string());
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

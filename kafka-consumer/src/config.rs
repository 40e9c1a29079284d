use std::time::Duration;

use envconfig::Envconfig;
use rdkafka::ClientConfig;

use crate::kafka::config::{ConsumerConfigBuilder, ConsumerSettings};
use crate::service::LoopSettings;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    // Kafka configuration
    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,

    #[envconfig(default = "kafka-consumer")]
    pub kafka_consumer_group: String,

    // Comma separated
    #[envconfig(default = "events")]
    pub kafka_consumer_topics: String,

    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: String,

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    pub kafka_client_id: Option<String>,

    #[envconfig(default = "60000")]
    pub kafka_session_timeout_ms: u32,

    #[envconfig(default = "300000")]
    pub kafka_max_poll_interval_ms: u32,

    // Adapter configuration
    #[envconfig(default = "100")]
    pub batch_size: usize,

    #[envconfig(default = "500")]
    pub poll_timeout_ms: u64,

    #[envconfig(default = "true")]
    pub intermediate_commit: bool,

    // 0 = commit only at batch boundaries
    #[envconfig(default = "0")]
    pub intermediate_commit_every: usize,

    #[envconfig(default = "15")]
    pub max_wait_for_assignment_secs: u64,

    #[envconfig(default = "5000")]
    pub drain_timeout_ms: u64,

    // Driver loop configuration
    #[envconfig(default = "10")]
    pub max_consecutive_errors: u32,

    #[envconfig(default = "100")]
    pub error_backoff_ms: u64,

    #[envconfig(default = "5000")]
    pub max_error_backoff_ms: u64,

    #[envconfig(default = "30")] // 30 seconds
    pub shutdown_timeout_secs: u64,

    // HTTP server configuration
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "8080")]
    pub port: u16,
}

impl Config {
    pub fn init_with_defaults() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn topics(&self) -> Vec<String> {
        self.kafka_consumer_topics
            .split(',')
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            max_consecutive_errors: self.max_consecutive_errors.max(1),
            error_backoff: Duration::from_millis(self.error_backoff_ms),
            max_error_backoff: Duration::from_millis(self.max_error_backoff_ms),
        }
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn consumer_settings(&self) -> ConsumerSettings {
        ConsumerSettings::new(self.batch_size, self.poll_timeout())
            .with_intermediate_commit(self.intermediate_commit)
            .with_intermediate_commit_every(self.intermediate_commit_every)
            .with_max_wait_for_assignment(Duration::from_secs(self.max_wait_for_assignment_secs))
            .with_drain_timeout(Duration::from_millis(self.drain_timeout_ms))
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut builder = ConsumerConfigBuilder::new(&self.kafka_hosts, &self.kafka_consumer_group)
            .with_tls(self.kafka_tls)
            .with_offset_reset(&self.kafka_consumer_offset_reset)
            .with_session_timeout_ms(self.kafka_session_timeout_ms)
            .with_max_poll_interval_ms(self.kafka_max_poll_interval_ms);

        if let Some(client_id) = &self.kafka_client_id {
            builder = builder.with_client_id(client_id);
        }

        builder.build()
    }
}

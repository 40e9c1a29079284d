// Kafka module - batch polling adapter with rebalance handling
pub mod config;
pub mod consumer;
pub mod context;
pub mod handle;
pub mod message;
pub mod rebalance_handler;
pub mod stats;
pub mod types;

// Used in "mod tests" and tests/ directory (integration tests)
pub mod test_utils;

// Public API
pub use config::{ConsumerConfigBuilder, ConsumerSettings};
pub use consumer::KafkaConsumer;
pub use handle::{ConsumerHandle, RdKafkaHandle};
pub use message::{CurrentMessage, ReadBuffer};
pub use rebalance_handler::RebalanceHandler;
pub use stats::{ConsumerStats, Stat, StatAssignment};
pub use types::{Partition, StalledStatus};

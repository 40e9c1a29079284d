use rdkafka::error::KafkaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsumerError {
    /// An accessor was called before `consume()` handed out a message.
    #[error("No message has been consumed yet")]
    NoCurrentMessage,

    #[error("Failed to subscribe to topics {topics:?}: {source}")]
    Subscribe {
        topics: Vec<String>,
        #[source]
        source: KafkaError,
    },

    #[error("Failed to store offset {offset} for {topic}[{partition}]: {source}")]
    StoreOffset {
        topic: String,
        partition: i32,
        offset: i64,
        #[source]
        source: KafkaError,
    },

    #[error("Failed to commit stored offsets: {0}")]
    Commit(#[source] KafkaError),

    #[error("Failed to return to the last committed position: {0}")]
    Reset(#[source] KafkaError),

    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
}

pub type Result<T> = std::result::Result<T, ConsumerError>;

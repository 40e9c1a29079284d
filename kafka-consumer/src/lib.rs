//! Stateful Kafka consumer adapter.
//!
//! [`kafka::KafkaConsumer`] polls batches from a broker client, hands them
//! out one message at a time and commits only the offsets the caller
//! confirmed. Polls that yield nothing usable end in a
//! [`kafka::StalledStatus`] instead of an error. Runtime statistics live in a
//! shared [`kafka::ConsumerStats`] so monitoring can read them from any
//! thread while a single thread drives consumption.
//!
//! ## Error logging (anyhow)
//!
//! When logging `anyhow::Error` or other error types with a cause chain, use
//! `{e:#}` inline or `error = ?e` as a structured field so root causes are
//! visible. Plain `{}` only shows the top-level message.

pub mod config;
pub mod error;
pub mod kafka;
pub mod metrics;
pub mod metrics_consts;
pub mod service;

pub use error::ConsumerError;

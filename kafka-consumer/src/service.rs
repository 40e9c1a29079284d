//! Driver for a single consumer adapter.
//!
//! The adapter is synchronous and owned by one thread, so the service runs it
//! on a blocking task and only shares its [`ConsumerStats`] with the async
//! HTTP side.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ConsumerError;
use crate::kafka::consumer::KafkaConsumer;
use crate::kafka::handle::{ConsumerHandle, RdKafkaHandle};
use crate::kafka::message::CurrentMessage;
use crate::kafka::stats::{ConsumerStats, Stat};
use crate::kafka::types::StalledStatus;
use crate::metrics_consts::{KAFKA_DRIVER_ERRORS, KAFKA_MESSAGES_PROCESSED};

/// Plug point for whatever the service does with each message.
pub trait MessageProcessor: Send {
    /// Handle one message. An error rewinds the consumer to its last
    /// committed position so the message is delivered again.
    fn process(&mut self, message: &CurrentMessage<'_>) -> Result<()>;
}

/// Logs every message it sees.
#[derive(Debug, Default)]
pub struct LoggingProcessor {
    processed: u64,
}

impl LoggingProcessor {
    pub fn processed(&self) -> u64 {
        self.processed
    }
}

impl MessageProcessor for LoggingProcessor {
    fn process(&mut self, message: &CurrentMessage<'_>) -> Result<()> {
        self.processed += 1;
        debug!(
            topic = message.topic(),
            partition = message.partition(),
            offset = message.offset(),
            bytes = message.reader().len(),
            "Processed message"
        );
        Ok(())
    }
}

/// Error budget of the driver loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    /// Give up after this many failures in a row
    pub max_consecutive_errors: u32,
    pub error_backoff: Duration,
    pub max_error_backoff: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_consecutive_errors: 10,
            error_backoff: Duration::from_millis(100),
            max_error_backoff: Duration::from_secs(5),
        }
    }
}

impl LoopSettings {
    /// Backoff after `consecutive_errors` failures, doubling up to
    /// `max_error_backoff`.
    pub fn backoff(&self, consecutive_errors: u32) -> Duration {
        let exponent = consecutive_errors.saturating_sub(1).min(16);
        self.error_backoff
            .saturating_mul(1 << exponent)
            .min(self.max_error_backoff)
    }
}

/// Counters reported when the driver loop returns.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    pub messages_processed: u64,
    pub processing_failures: u64,
    pub rewinds: u64,
}

struct ErrorBudget<'a> {
    settings: &'a LoopSettings,
    shutdown: &'a CancellationToken,
    consecutive: u32,
}

impl ErrorBudget<'_> {
    fn reset(&mut self) {
        self.consecutive = 0;
    }

    /// Count a failure and back off, or give up once the budget is spent.
    fn fail(&mut self, error: anyhow::Error) -> Result<()> {
        self.consecutive += 1;
        metrics::counter!(KAFKA_DRIVER_ERRORS).increment(1);

        if self.consecutive >= self.settings.max_consecutive_errors {
            return Err(error.context(format!(
                "giving up after {} consecutive errors",
                self.consecutive
            )));
        }

        let backoff = self.settings.backoff(self.consecutive);
        warn!(
            consecutive_errors = self.consecutive,
            backoff_ms = backoff.as_millis() as u64,
            "Consumer loop error: {error:#}"
        );
        sleep_unless_cancelled(self.shutdown, backoff);
        Ok(())
    }
}

fn sleep_unless_cancelled(shutdown: &CancellationToken, duration: Duration) {
    let deadline = Instant::now() + duration;
    while !shutdown.is_cancelled() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(remaining.min(Duration::from_millis(50)));
    }
}

/// Drive `consumer` until the shutdown token is cancelled or the error budget
/// is exhausted.
///
/// Every delivered message is processed and its offset stored; stored offsets
/// are committed when the batch is exhausted.
pub fn run_consumer_loop<H: ConsumerHandle>(
    consumer: &mut KafkaConsumer<H>,
    processor: &mut dyn MessageProcessor,
    settings: &LoopSettings,
    shutdown: &CancellationToken,
) -> Result<LoopSummary> {
    let mut budget = ErrorBudget {
        settings,
        shutdown,
        consecutive: 0,
    };
    let mut summary = LoopSummary::default();

    loop {
        match consumer.subscribe() {
            Ok(()) => break,
            Err(e) => budget.fail(e.into())?,
        }
        if shutdown.is_cancelled() {
            return Ok(summary);
        }
    }
    budget.reset();

    consumer.in_use();
    let result = drive(consumer, processor, &mut budget, &mut summary);
    consumer.not_in_use();

    info!(
        processed = summary.messages_processed,
        failures = summary.processing_failures,
        rewinds = summary.rewinds,
        "Consumer loop finished"
    );
    result.map(|_| summary)
}

fn drive<H: ConsumerHandle>(
    consumer: &mut KafkaConsumer<H>,
    processor: &mut dyn MessageProcessor,
    budget: &mut ErrorBudget<'_>,
    summary: &mut LoopSummary,
) -> Result<()> {
    loop {
        let delivered = match consumer.consume() {
            Ok(buffer) => buffer.is_some(),
            Err(e) => {
                budget.fail(e.into())?;
                continue;
            }
        };

        if !delivered {
            match consumer.stalled_status() {
                StalledStatus::ConsumerStopped => return Ok(()),
                StalledStatus::ErrorsReturned => {
                    summary.rewinds += 1;
                    let reset = consumer.reset_to_last_committed("Poll returned only errors.");
                    let error = match reset {
                        Ok(()) => anyhow::anyhow!("poll returned only errors"),
                        Err(e) => {
                            anyhow::Error::new(e).context("rewinding after a batch of errors")
                        }
                    };
                    budget.fail(error)?;
                }
                // nothing to process yet, poll again
                StalledStatus::NotStalled
                | StalledStatus::NoMessagesReturned
                | StalledStatus::NoAssignment
                | StalledStatus::RebalanceHappened => {}
            }
            continue;
        }

        if let Err(e) = process_current(consumer, processor) {
            summary.processing_failures += 1;
            error!("Failed to process message: {e:#}");
            consumer.set_exception_info(format!("{e:#}"));

            summary.rewinds += 1;
            match consumer.reset_to_last_committed("Message processing failed.") {
                Ok(()) => budget.fail(e)?,
                Err(reset) => budget.fail(
                    anyhow::Error::new(reset).context("rewinding after a processing failure"),
                )?,
            }
            continue;
        }
        summary.messages_processed += 1;
        metrics::counter!(KAFKA_MESSAGES_PROCESSED).increment(1);

        match store_and_commit(consumer) {
            Ok(()) => budget.reset(),
            Err(e) => budget.fail(e.into())?,
        }
    }
}

/// Store the offset of the message just processed, committing once the batch
/// is exhausted.
fn store_and_commit<H: ConsumerHandle>(
    consumer: &mut KafkaConsumer<H>,
) -> Result<(), ConsumerError> {
    consumer.store_last_read_message_offset()?;
    if !consumer.has_more_polled_messages() {
        consumer.commit()?;
    }
    Ok(())
}

fn process_current<H: ConsumerHandle>(
    consumer: &KafkaConsumer<H>,
    processor: &mut dyn MessageProcessor,
) -> Result<()> {
    let message = consumer.current_message()?;
    processor.process(&message)
}

/// Build the adapter from `config` and drive it on a blocking task until
/// `shutdown` is cancelled.
pub fn spawn_consumer(
    config: &Config,
    processor: Box<dyn MessageProcessor>,
    shutdown: CancellationToken,
) -> Result<(Arc<ConsumerStats>, tokio::task::JoinHandle<Result<LoopSummary>>)> {
    let handle = RdKafkaHandle::from_config(&config.client_config())
        .context("Failed to create Kafka consumer")?;
    let mut consumer = KafkaConsumer::new(
        handle,
        config.consumer_settings(),
        shutdown.clone(),
        config.topics(),
    );
    let stats = consumer.stats_handle();
    let loop_settings = config.loop_settings();

    let task = tokio::task::spawn_blocking(move || {
        let mut processor = processor;
        run_consumer_loop(&mut consumer, processor.as_mut(), &loop_settings, &shutdown)
    });

    Ok((stats, task))
}

#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<ConsumerStats>,
    pub metrics: Option<PrometheusHandle>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/_liveness", get(liveness))
        .route("/_readiness", get(readiness))
        .route("/metrics", get(render_metrics))
        .route("/stat", get(stat))
        .with_state(state)
}

/// Bind a `TcpListener` on the provided bind address to serve a `Router` on it.
pub async fn serve(router: Router, bind: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, router).await?;

    Ok(())
}

async fn index() -> &'static str {
    "kafka consumer service"
}

async fn liveness() -> &'static str {
    "ok"
}

async fn readiness(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    if state.stats.is_in_use() {
        Ok("ok")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

async fn stat(State(state): State<AppState>) -> Json<Stat> {
    Json(state.stats.get_stat())
}

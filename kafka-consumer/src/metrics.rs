use crate::metrics_consts::KAFKA_CONSUMERS_LIVE;

/// Scoped membership in the process-wide live consumer gauge.
///
/// Acquiring bumps the gauge, dropping lowers it again, so the gauge always
/// equals the number of adapters currently alive.
#[derive(Debug)]
pub struct LiveConsumerGuard {
    _private: (),
}

impl LiveConsumerGuard {
    pub fn acquire() -> Self {
        metrics::gauge!(KAFKA_CONSUMERS_LIVE).increment(1.0);
        Self { _private: () }
    }
}

impl Drop for LiveConsumerGuard {
    fn drop(&mut self) {
        metrics::gauge!(KAFKA_CONSUMERS_LIVE).decrement(1.0);
    }
}

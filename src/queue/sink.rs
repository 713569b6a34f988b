/// What forced a flush: the buffer reaching its size threshold, or the
/// interval timer elapsing first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    Saturated,
    Interval,
}

/// Receiver for queue diagnostics.
///
/// Diagnostics are advisory; nothing in the queue's behavior depends on the
/// sink. Injecting one lets tests assert on overflow drops and flushes
/// without parsing log output.
pub trait DiagnosticSink: Send + Sync {
    /// An item was dropped because the buffer already holds `safety_limit`
    /// items.
    fn item_dropped(&self, buffered: usize, safety_limit: usize) {
        let _ = (buffered, safety_limit);
    }

    /// A batch of `len` items was flushed.
    fn batch_flushed(&self, len: usize, trigger: FlushTrigger) {
        let _ = (len, trigger);
    }
}

/// Default sink that forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn item_dropped(&self, buffered: usize, safety_limit: usize) {
        tracing::warn!(
            buffered,
            safety_limit,
            "dropping item pushed beyond safety limit"
        );
    }

    fn batch_flushed(&self, len: usize, trigger: FlushTrigger) {
        tracing::debug!(len, ?trigger, "flushing batch");
    }
}

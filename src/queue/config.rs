use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cargo::{CargoHandler, ResumeToken};
use super::sink::{DiagnosticSink, TracingSink};
use super::BatchQueue;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    ZeroLimit(&'static str),

    #[error("safety limit {safety_limit} is below the flush limit {limit}")]
    SafetyBelowLimit { safety_limit: usize, limit: usize },
}

/// Plain queue knobs, loadable from serialized configuration.
///
/// Omitted fields fall back to the defaults below. The cargo handler and
/// diagnostic sink are not serializable; set them on the builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueOptions {
    /// Buffer length that forces an immediate flush (non-cargo mode).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Longest a non-empty buffer may sit before a flush is forced.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Items handed to the cargo handler per invocation.
    #[serde(default = "default_cargo_limit")]
    pub cargo_limit: usize,
    /// Hard cap on buffer length; items pushed beyond it are dropped.
    #[serde(default = "default_safety_limit")]
    pub safety_limit: usize,
}

fn default_limit() -> usize {
    10_000
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_cargo_limit() -> usize {
    1
}

fn default_safety_limit() -> usize {
    2_000_000
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            interval_ms: default_interval_ms(),
            cargo_limit: default_cargo_limit(),
            safety_limit: default_safety_limit(),
        }
    }
}

/// Builder for a [`BatchQueue`].
pub struct QueueBuilder<T> {
    pub(crate) limit: usize,
    pub(crate) interval: Duration,
    pub(crate) cargo: Option<CargoHandler<T>>,
    pub(crate) cargo_limit: usize,
    pub(crate) safety_limit: usize,
    pub(crate) sink: Arc<dyn DiagnosticSink>,
}

impl<T: Send + 'static> QueueBuilder<T> {
    /// Create a builder with default options and the tracing sink.
    pub fn new() -> Self {
        Self::from_options(QueueOptions::default())
    }

    /// Create a builder seeded from loaded options.
    pub fn from_options(options: QueueOptions) -> Self {
        Self {
            limit: options.limit,
            interval: Duration::from_millis(options.interval_ms),
            cargo: None,
            cargo_limit: options.cargo_limit,
            safety_limit: options.safety_limit,
            sink: Arc::new(TracingSink),
        }
    }

    /// Set the size threshold that forces a flush (non-cargo mode).
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the time threshold.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Enable cargo mode: flushes hand bounded chunks to `handler` instead
    /// of emitting the whole buffer.
    pub fn cargo<F>(mut self, handler: F) -> Self
    where
        F: Fn(Vec<T>, ResumeToken<T>) + Send + Sync + 'static,
    {
        self.cargo = Some(Arc::new(handler));
        self
    }

    /// Set the maximum chunk size per cargo handoff.
    pub fn cargo_limit(mut self, cargo_limit: usize) -> Self {
        self.cargo_limit = cargo_limit;
        self
    }

    /// Set the hard cap on buffer length.
    pub fn safety_limit(mut self, safety_limit: usize) -> Self {
        self.safety_limit = safety_limit;
        self
    }

    /// Replace the diagnostic sink.
    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validate the configuration and build the queue. Flushing starts
    /// enabled.
    pub fn build(self) -> Result<BatchQueue<T>, ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::ZeroLimit("limit"));
        }
        if self.cargo_limit == 0 {
            return Err(ConfigError::ZeroLimit("cargo limit"));
        }
        if self.safety_limit == 0 {
            return Err(ConfigError::ZeroLimit("safety limit"));
        }
        if self.safety_limit < self.limit {
            return Err(ConfigError::SafetyBelowLimit {
                safety_limit: self.safety_limit,
                limit: self.limit,
            });
        }
        Ok(BatchQueue::from_builder(self))
    }
}

impl<T: Send + 'static> Default for QueueBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

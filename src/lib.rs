// Public API exports
pub mod queue;

// Re-export main types for convenience
pub use queue::{
    BatchQueue, CargoHandler, ConfigError, DiagnosticSink, FlushTrigger, QueueBuilder,
    QueueOptions, ResumeToken, TracingSink,
};

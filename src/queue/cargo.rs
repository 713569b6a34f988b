use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::BatchQueue;

/// Handler invoked with each cargo chunk and the token that resumes the
/// queue once the chunk has been dealt with.
pub type CargoHandler<T> = Arc<dyn Fn(Vec<T>, ResumeToken<T>) + Send + Sync>;

/// Single-use signal handed to the cargo handler alongside each chunk.
///
/// The queue stays paused until `done` is invoked. Clones share one
/// idempotency flag, so calling `done` on more than one clone resumes the
/// queue exactly once. There is no timeout: a handler that never signals
/// completion stalls the queue permanently.
pub struct ResumeToken<T> {
    queue: BatchQueue<T>,
    used: Arc<AtomicBool>,
}

impl<T> Clone for ResumeToken<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            used: Arc::clone(&self.used),
        }
    }
}

impl<T: Send + 'static> ResumeToken<T> {
    pub(crate) fn new(queue: BatchQueue<T>) -> Self {
        Self {
            queue,
            used: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Resume flushing. Repeat invocations through clones are no-ops.
    pub fn done(self) {
        if !self.used.swap(true, Ordering::SeqCst) {
            self.queue.resume();
        }
    }
}

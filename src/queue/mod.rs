mod cargo;
mod config;
mod sink;


pub use cargo::{CargoHandler, ResumeToken};
pub use config::{ConfigError, QueueBuilder, QueueOptions};
pub use sink::{DiagnosticSink, FlushTrigger, TracingSink};

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

/// Observer invoked with each emitted batch and whether the flush was
/// saturation-triggered. The slice is not valid after the call returns.
type FlushObserver<T> = Arc<dyn Fn(&[T], bool) + Send + Sync>;

/// Buffering queue that accumulates items and releases them in batches,
/// triggered by whichever comes first: the buffer reaching a size threshold,
/// or a time interval elapsing since accumulation began.
///
/// In cargo mode, flushes instead hand bounded chunks to a handler supplied
/// at construction, and the queue pauses until the handler signals
/// completion through its [`ResumeToken`].
///
/// A flush against an empty buffer is a no-op in both modes; empty batches
/// are never emitted.
///
/// Handles are cheap to clone and share one buffer. Arming the flush timer
/// requires a tokio runtime.
pub struct BatchQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for BatchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<T> {
    limit: usize,
    interval: Duration,
    cargo: Option<CargoHandler<T>>,
    cargo_limit: usize,
    safety_limit: usize,
    sink: Arc<dyn DiagnosticSink>,
    observers: Mutex<Vec<FlushObserver<T>>>,
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    buffer: VecDeque<T>,
    flushing_enabled: bool,
    /// At most one outstanding deferred-flush task.
    timer: Option<JoinHandle<()>>,
    /// Bumped on every arm/cancel; a timer task that outlives its epoch
    /// must not flush (abort is only honored at await points).
    timer_epoch: u64,
}

/// Work to perform after the state lock is released, so observers and the
/// cargo handler can re-enter the queue without deadlocking.
enum Emit<T> {
    Nothing,
    Batch { items: Vec<T>, saturated: bool },
    Cargo { chunk: Vec<T> },
}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.get_mut().timer.take() {
            timer.abort();
        }
    }
}

impl<T: Send + 'static> BatchQueue<T> {
    /// Start building a queue.
    pub fn builder() -> QueueBuilder<T> {
        QueueBuilder::new()
    }

    pub(crate) fn from_builder(builder: QueueBuilder<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                limit: builder.limit,
                interval: builder.interval,
                cargo: builder.cargo,
                cargo_limit: builder.cargo_limit,
                safety_limit: builder.safety_limit,
                sink: builder.sink,
                observers: Mutex::new(Vec::new()),
                inner: Mutex::new(Inner {
                    buffer: VecDeque::new(),
                    flushing_enabled: true,
                    timer: None,
                    timer_epoch: 0,
                }),
            }),
        }
    }

    /// Register an observer for emitted batches (non-cargo mode).
    pub fn on_flush<F>(&self, observer: F)
    where
        F: Fn(&[T], bool) + Send + Sync + 'static,
    {
        self.shared.observers.lock().push(Arc::new(observer));
    }

    /// Append an item at the tail, then run the flush-check. Items pushed
    /// while the buffer is at the safety limit are dropped, not queued.
    pub fn push(&self, item: T) -> &Self {
        self.enqueue(item, false);
        self
    }

    /// Append an item at the head; used for re-queuing or priority
    /// insertion. Same safety-limit semantics as [`push`](Self::push).
    pub fn push_front(&self, item: T) -> &Self {
        self.enqueue(item, true);
        self
    }

    /// Discard all queued items and cancel any pending timer. No flush is
    /// emitted; a chunk already handed to the cargo handler is unaffected.
    pub fn empty(&self) {
        let mut inner = self.shared.inner.lock();
        inner.buffer.clear();
        Self::cancel_timer(&mut inner);
    }

    /// Disable flushing and cancel any pending timer. Items still
    /// accumulate, subject to the safety limit.
    pub fn pause(&self) {
        let mut inner = self.shared.inner.lock();
        inner.flushing_enabled = false;
        Self::cancel_timer(&mut inner);
    }

    /// Re-enable flushing and immediately re-run the flush-check, so a
    /// buffer that saturated while paused flushes right away.
    pub fn resume(&self) {
        let emit = {
            let mut inner = self.shared.inner.lock();
            inner.flushing_enabled = true;
            self.check_locked(&mut inner)
        };
        self.dispatch(emit);
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        self.shared.inner.lock().buffer.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the buffer has reached the flush-triggering size: the cargo
    /// limit in cargo mode, the flush limit otherwise.
    pub fn saturated(&self) -> bool {
        self.shared.inner.lock().buffer.len() >= self.trigger_len()
    }

    /// Whether flushing is currently disabled.
    pub fn is_paused(&self) -> bool {
        !self.shared.inner.lock().flushing_enabled
    }

    fn trigger_len(&self) -> usize {
        if self.shared.cargo.is_some() {
            self.shared.cargo_limit
        } else {
            self.shared.limit
        }
    }

    fn enqueue(&self, item: T, front: bool) {
        let emit = {
            let mut inner = self.shared.inner.lock();
            if inner.buffer.len() >= self.shared.safety_limit {
                self.shared
                    .sink
                    .item_dropped(inner.buffer.len(), self.shared.safety_limit);
                return;
            }
            if front {
                inner.buffer.push_front(item);
            } else {
                inner.buffer.push_back(item);
            }
            self.check_locked(&mut inner)
        };
        self.dispatch(emit);
    }

    /// Flush-check: flush now if saturated, otherwise make sure a timer is
    /// pending. An already-pending timer is left untouched, so the flush
    /// window is anchored to the first accumulation, not extended by later
    /// pushes.
    fn check_locked(&self, inner: &mut Inner<T>) -> Emit<T> {
        if !inner.flushing_enabled {
            return Emit::Nothing;
        }
        if inner.buffer.len() >= self.trigger_len() {
            return self.flush_locked(inner, FlushTrigger::Saturated);
        }
        if inner.timer.is_none() && !inner.buffer.is_empty() {
            self.arm_timer(inner);
        }
        Emit::Nothing
    }

    fn flush_locked(&self, inner: &mut Inner<T>, trigger: FlushTrigger) -> Emit<T> {
        Self::cancel_timer(inner);
        if inner.buffer.is_empty() {
            return Emit::Nothing;
        }
        if self.shared.cargo.is_some() {
            let take = self.shared.cargo_limit.min(inner.buffer.len());
            let chunk: Vec<T> = inner.buffer.drain(..take).collect();
            // Paused until the handler's resume token fires.
            inner.flushing_enabled = false;
            self.shared.sink.batch_flushed(chunk.len(), trigger);
            Emit::Cargo { chunk }
        } else {
            let items: Vec<T> = inner.buffer.drain(..).collect();
            self.shared.sink.batch_flushed(items.len(), trigger);
            Emit::Batch {
                items,
                saturated: trigger == FlushTrigger::Saturated,
            }
        }
    }

    fn arm_timer(&self, inner: &mut Inner<T>) {
        inner.timer_epoch = inner.timer_epoch.wrapping_add(1);
        let epoch = inner.timer_epoch;
        let interval = self.shared.interval;
        // Weak, so a pending timer never keeps a dropped queue alive.
        let weak = Arc::downgrade(&self.shared);
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            Self::timer_fired(&weak, epoch);
        }));
    }

    fn timer_fired(weak: &Weak<Shared<T>>, epoch: u64) {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let queue = BatchQueue { shared };
        let emit = {
            let mut inner = queue.shared.inner.lock();
            if inner.timer_epoch != epoch || !inner.flushing_enabled {
                return;
            }
            inner.timer = None;
            queue.flush_locked(&mut inner, FlushTrigger::Interval)
        };
        queue.dispatch(emit);
    }

    fn cancel_timer(inner: &mut Inner<T>) {
        inner.timer_epoch = inner.timer_epoch.wrapping_add(1);
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
    }

    fn dispatch(&self, emit: Emit<T>) {
        match emit {
            Emit::Nothing => {}
            Emit::Batch { items, saturated } => {
                // Snapshot so observers may register further observers.
                let observers: Vec<FlushObserver<T>> = self.shared.observers.lock().clone();
                for observer in &observers {
                    observer(&items, saturated);
                }
            }
            Emit::Cargo { chunk } => {
                if let Some(handler) = &self.shared.cargo {
                    handler(chunk, ResumeToken::new(self.clone()));
                }
            }
        }
    }
}

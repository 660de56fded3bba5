use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// The loaded window of a query: every item fetched so far plus the opaque
/// cursor for the next chunk (`None` once the backend reports the end).
#[derive(Debug, Clone)]
pub struct PagedResults<M> {
    pub items: Vec<M>,
    pub cursor: Option<usize>,
}

impl<M> PagedResults<M> {
    pub fn new(items: Vec<M>, cursor: Option<usize>) -> Self {
        Self { items, cursor }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    /// Appends a continuation chunk and returns how many items it added.
    pub fn extend(&mut self, items: Vec<M>, cursor: Option<usize>) -> usize {
        let added = items.len();
        self.items.extend(items);
        self.cursor = cursor;
        added
    }

    pub fn needs_fill(&self, visible_rows: usize) -> bool {
        self.has_more() && self.items.len() < visible_rows
    }
}

/// At most one continuation fetch per query class; late callers are turned
/// away instead of queued.
#[derive(Debug, Default)]
pub struct ReentrancyLock {
    busy: AtomicBool,
}

pub struct ReentrancyGuard<'a> {
    lock: &'a ReentrancyLock,
}

impl ReentrancyLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<ReentrancyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ReentrancyGuard { lock: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        self.lock.busy.store(false, Ordering::Release);
    }
}

/// Trailing-edge debounce: each `schedule` restarts the delay. Only the delay
/// is ever cancelled; once it elapses the work runs in its own task and is
/// left to finish.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(task);
        });

        if let Some(previous) = self.pending.lock().replace(timer) {
            previous.abort();
        }
    }

    /// Drops a pending delay. Work that already started is unaffected.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|timer| !timer.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

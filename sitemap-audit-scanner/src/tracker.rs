use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// Counts dispatched-but-unresolved units of work.
///
/// A unit is registered the moment it is discovered, before it is spawned,
/// so the count cannot touch zero while a parent is still handing out
/// children. Once it reaches zero it stays there.
#[derive(Clone, Default)]
pub struct WorkTracker {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    outstanding: AtomicUsize,
    idle: Notify,
}

/// Held by a unit of work; resolves it when dropped, including on panic.
pub struct WorkGuard {
    inner: Arc<Inner>,
}

impl WorkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> WorkGuard {
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        WorkGuard {
            inner: self.inner.clone(),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Resolves once every registered unit has been dropped.
    pub async fn wait_idle(&self) {
        loop {
            // Created before the check so a wakeup between the two is not lost.
            let notified = self.inner.idle.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        if self.inner.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

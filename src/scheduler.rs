//! Expiration Scheduler Module
//!
//! A shared background timer facility that runs delayed removal callbacks
//! for every cache instance in the process.
//!
//! The scheduler is an explicit, cloneable handle rather than a hidden
//! static: caches either receive one by injection or fall back to the
//! process-wide instance returned by [`ExpirationScheduler::global`].
//!
//! **The global scheduler is shared process-wide state.** Calling
//! [`shutdown_global`] stops TTL scheduling for *every* cache in the
//! process that uses the global handle; logically independent caches
//! sharing one process must coordinate their shutdown externally.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, info};

// == Constants ==
/// Grace period granted to in-flight callbacks during [`shutdown_global`].
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Process-wide scheduler, lazily created on first use.
static GLOBAL_SCHEDULER: OnceLock<ExpirationScheduler> = OnceLock::new();

// == Expiration Handle ==
/// Opaque handle to a scheduled removal callback.
///
/// Cancellation is best-effort: a callback that has already started firing
/// keeps running, and callers must tolerate losing that race.
#[derive(Debug)]
pub struct ExpirationHandle {
    task: JoinHandle<()>,
}

impl ExpirationHandle {
    /// Cancels the pending callback if it has not started firing yet.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

// == Expiration Scheduler ==
/// Shared timer facility backed by a dedicated single-worker runtime.
///
/// Cloning produces another handle to the same facility. Callbacks run on
/// the scheduler's own worker thread and never block application threads;
/// a panicking callback is contained by its task boundary and does not
/// affect other pending callbacks.
#[derive(Clone)]
pub struct ExpirationScheduler {
    runtime: Arc<RwLock<Option<Runtime>>>,
}

impl ExpirationScheduler {
    // == Constructor ==
    /// Creates an independent scheduler with its own timer thread.
    ///
    /// Useful for tests and for hosts that want per-subsystem shutdown
    /// ordering instead of the process-wide instance.
    pub fn new() -> Self {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("ttl-expiration")
            .enable_time()
            .build()
            .expect("failed to build expiration scheduler runtime");

        Self {
            runtime: Arc::new(RwLock::new(Some(runtime))),
        }
    }

    // == Global Instance ==
    /// Returns a handle to the process-wide scheduler, creating it on
    /// first use.
    pub fn global() -> ExpirationScheduler {
        GLOBAL_SCHEDULER
            .get_or_init(ExpirationScheduler::new)
            .clone()
    }

    // == Schedule ==
    /// Runs `task` after `delay` on the scheduler's worker thread.
    ///
    /// Returns `None` once the scheduler has been shut down; no callback is
    /// registered in that case. A zero delay fires on the next timer tick.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> Option<ExpirationHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.runtime.read();
        let runtime = guard.as_ref()?;

        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });

        Some(ExpirationHandle { task: handle })
    }

    // == Is Running ==
    /// Returns true while the scheduler accepts new callbacks.
    pub fn is_running(&self) -> bool {
        self.runtime.read().is_some()
    }

    // == Shutdown ==
    /// Stops the scheduler, waiting up to `grace` for in-flight callbacks.
    ///
    /// Pending (not yet fired) callbacks are dropped; callbacks that are
    /// mid-execution get the grace period before the worker is torn down.
    /// Subsequent [`schedule`](Self::schedule) calls return `None`. Calling
    /// shutdown again is a no-op.
    ///
    /// This is the one intentionally blocking operation in the crate: the
    /// calling thread may block for up to `grace`.
    pub fn shutdown(&self, grace: Duration) {
        let runtime = self.runtime.write().take();
        match runtime {
            Some(runtime) => {
                info!(grace_ms = grace.as_millis() as u64, "shutting down expiration scheduler");
                runtime.shutdown_timeout(grace);
                info!("expiration scheduler stopped");
            }
            None => {
                debug!("expiration scheduler already stopped");
            }
        }
    }
}

impl Default for ExpirationScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// == Global Shutdown ==
/// Shuts down the process-wide scheduler with the default grace period.
///
/// After this call no cache instance using the global scheduler can
/// register new TTL expirations; non-TTL operations are unaffected. Safe
/// to call more than once, and a no-op if the global scheduler was never
/// created.
pub fn shutdown_global() {
    if let Some(scheduler) = GLOBAL_SCHEDULER.get() {
        scheduler.shutdown(DEFAULT_SHUTDOWN_GRACE);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::sleep;

    #[test]
    fn test_schedule_fires_callback() {
        let scheduler = ExpirationScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let handle = scheduler.schedule(Duration::from_millis(20), move || {
            flag.store(true, Ordering::SeqCst);
        });
        assert!(handle.is_some());

        sleep(Duration::from_millis(200));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancel_prevents_callback() {
        let scheduler = ExpirationScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let handle = scheduler
            .schedule(Duration::from_millis(100), move || {
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();
        handle.cancel();

        sleep(Duration::from_millis(300));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_zero_delay_fires() {
        let scheduler = ExpirationScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        scheduler
            .schedule(Duration::ZERO, move || {
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();

        sleep(Duration::from_millis(200));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_schedule_after_shutdown_returns_none() {
        let scheduler = ExpirationScheduler::new();
        scheduler.shutdown(Duration::from_millis(100));

        assert!(!scheduler.is_running());
        let handle = scheduler.schedule(Duration::from_millis(10), || {});
        assert!(handle.is_none());
    }

    #[test]
    fn test_shutdown_drops_pending_callbacks() {
        let scheduler = ExpirationScheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        scheduler
            .schedule(Duration::from_millis(100), move || {
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();

        scheduler.shutdown(Duration::from_millis(500));

        sleep(Duration::from_millis(300));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let scheduler = ExpirationScheduler::new();
        scheduler.shutdown(Duration::from_millis(100));
        scheduler.shutdown(Duration::from_millis(100));
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_cloned_handles_share_shutdown_state() {
        let scheduler = ExpirationScheduler::new();
        let other = scheduler.clone();

        scheduler.shutdown(Duration::from_millis(100));
        assert!(!other.is_running());
        assert!(other.schedule(Duration::from_millis(10), || {}).is_none());
    }
}

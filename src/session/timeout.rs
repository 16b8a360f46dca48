//! The two session expiry clocks
//!
//! - alive: total lifetime, started once, never restarted
//! - idle: time since the last applied update, restarted on every apply
//!
//! Each clock is a delayed task in the session's scope. Starting an
//! already running clock is a no-op; cancelling a stopped one too.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::sync::lock;

/// Stand-in deadline for clocks too long to represent
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Alive,
    Idle,
}

type FireFn = Arc<dyn Fn(TimeoutKind) + Send + Sync>;

struct Clock {
    handle: JoinHandle<()>,
    deadline: Instant,
}

pub struct TimeoutManager {
    scope: CancellationToken,
    tracker: TaskTracker,
    alive: Mutex<Option<Clock>>,
    idle: Mutex<Option<Clock>>,
    fire: FireFn,
}

impl TimeoutManager {
    /// `fire` runs inside the timer task when a clock expires; it must not
    /// block and must not cancel the scope it runs in synchronously.
    pub fn new<F>(scope: CancellationToken, tracker: TaskTracker, fire: F) -> Self
    where
        F: Fn(TimeoutKind) + Send + Sync + 'static,
    {
        Self {
            scope,
            tracker,
            alive: Mutex::new(None),
            idle: Mutex::new(None),
            fire: Arc::new(fire),
        }
    }

    /// Start the lifetime clock. Must be called within a Tokio runtime.
    pub fn start_alive(&self, after: Duration) -> bool {
        self.start(&self.alive, TimeoutKind::Alive, deadline_after(after))
    }

    pub fn cancel_alive(&self) -> bool {
        cancel(&self.alive)
    }

    /// Start the idle clock. Must be called within a Tokio runtime.
    pub fn start_idle(&self, after: Duration) -> bool {
        self.start(&self.idle, TimeoutKind::Idle, deadline_after(after))
    }

    /// Start the idle clock with a fixed deadline, e.g. to restore one
    /// that was cancelled around an apply that failed.
    pub fn start_idle_until(&self, deadline: Instant) -> bool {
        self.start(&self.idle, TimeoutKind::Idle, deadline)
    }

    pub fn cancel_idle(&self) -> bool {
        cancel(&self.idle)
    }

    /// When the idle clock fires, if it is set
    pub fn idle_deadline(&self) -> Option<Instant> {
        lock(&self.idle).as_ref().map(|clock| clock.deadline)
    }

    pub fn is_alive_running(&self) -> bool {
        running(&self.alive)
    }

    pub fn is_idle_running(&self) -> bool {
        running(&self.idle)
    }

    pub fn cancel_all(&self) {
        self.cancel_alive();
        self.cancel_idle();
    }

    fn start(&self, slot: &Mutex<Option<Clock>>, kind: TimeoutKind, deadline: Instant) -> bool {
        let mut slot = lock(slot);
        if slot.is_some() || self.scope.is_cancelled() {
            return false;
        }
        debug!(
            ?kind,
            after_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
            "timeout started"
        );
        let scope = self.scope.clone();
        let fire = self.fire.clone();
        let handle = self.tracker.spawn(async move {
            tokio::select! {
                _ = scope.cancelled() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    info!(?kind, "timeout fired");
                    fire(kind);
                }
            }
        });
        *slot = Some(Clock { handle, deadline });
        true
    }
}

fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after).unwrap_or(now + FAR_FUTURE)
}

fn cancel(slot: &Mutex<Option<Clock>>) -> bool {
    match lock(slot).take() {
        Some(clock) => {
            clock.handle.abort();
            true
        }
        None => false,
    }
}

fn running(slot: &Mutex<Option<Clock>>) -> bool {
    lock(slot).as_ref().is_some_and(|clock| !clock.handle.is_finished())
}

impl Drop for TimeoutManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn manager() -> (TimeoutManager, mpsc::UnboundedReceiver<TimeoutKind>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mgr = TimeoutManager::new(CancellationToken::new(), TaskTracker::new(), move |kind| {
            let _ = tx.send(kind);
        });
        (mgr, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_a_no_op() {
        let (mgr, _rx) = manager();
        assert!(mgr.start_alive(Duration::from_secs(10)));
        assert!(!mgr.start_alive(Duration::from_secs(1)));
        assert!(mgr.start_idle(Duration::from_secs(10)));
        assert!(!mgr.start_idle(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_idempotent() {
        let (mgr, _rx) = manager();
        assert!(!mgr.cancel_idle());
        mgr.start_idle(Duration::from_secs(10));
        assert!(mgr.cancel_idle());
        assert!(!mgr.cancel_idle());
        assert!(!mgr.is_idle_running());
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (mgr, mut rx) = manager();
        mgr.start_idle(Duration::from_secs(30));
        let start = tokio::time::Instant::now();
        assert_eq!(rx.recv().await, Some(TimeoutKind::Idle));
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_pushes_deadline_out() {
        let (mgr, mut rx) = manager();
        let start = tokio::time::Instant::now();
        mgr.start_idle(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(20)).await;
        mgr.cancel_idle();
        mgr.start_idle(Duration::from_secs(30));

        assert_eq!(rx.recv().await, Some(TimeoutKind::Idle));
        assert!(start.elapsed() >= Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_scope_stops_clocks() {
        let scope = CancellationToken::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        let mgr = TimeoutManager::new(scope.clone(), TaskTracker::new(), move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        mgr.start_alive(Duration::from_secs(5));
        scope.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!mgr.start_idle(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn restoring_a_deadline_keeps_the_original_expiry() {
        let (mgr, mut rx) = manager();
        let start = tokio::time::Instant::now();
        mgr.start_idle(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(20)).await;

        let deadline = mgr.idle_deadline().unwrap();
        assert_eq!(deadline, start + Duration::from_secs(30));
        mgr.cancel_idle();
        assert!(mgr.idle_deadline().is_none());
        assert!(mgr.start_idle_until(deadline));

        assert_eq!(rx.recv().await, Some(TimeoutKind::Idle));
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_duration_never_fires() {
        let (mgr, mut rx) = manager();
        assert!(mgr.start_idle(Duration::MAX));
        tokio::time::sleep(Duration::from_secs(86400)).await;
        assert!(rx.try_recv().is_err());
        assert!(mgr.is_idle_running());
    }

    #[tokio::test(start_paused = true)]
    async fn alive_is_not_restarted_after_firing() {
        let (mgr, mut rx) = manager();
        mgr.start_alive(Duration::from_secs(1));
        assert_eq!(rx.recv().await, Some(TimeoutKind::Alive));
        assert!(!mgr.start_alive(Duration::from_secs(1)));
    }
}

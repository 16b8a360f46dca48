//! Session container
//!
//! One [`Session`] per user-initiated surface. It owns the [`Builder`] the
//! domain declares units into and keeps the remote message in step with it:
//!
//! - every render, update and the cancellation itself run under one async
//!   mutex, so no two deltas are ever computed against the same snapshot
//! - the auto-refresh loop defers to foreground renders instead of queuing
//! - two expiry clocks (alive, idle) cancel the session out-of-band
//! - cancellation tears down the task scope, then fans out to handlers
//!
//! Lifecycle: `Fresh -> (first response) -> Active <-> (updating) ->
//! Cancelled`. The transient states only exist while the lock is held.

mod cancel;
mod refresh;
mod registry;
mod timeout;

use std::collections::HashSet;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, MutexGuard, Notify};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::builder::{Builder, DEFAULT_ROW_SLOTS, DEFAULT_ROW_WIDTH};
use crate::config::SessionConfig;
use crate::error::{Result, SurfaceError};
use crate::remote::{Interaction, MessageHandle, MessageId, UserId, Visibility};
use crate::render::{BaseRenderer, DeltaRenderer, ErrorChain, ErrorHandler, PendingDelta, Renderer, Snapshot};
use crate::sync::lock;

pub use cancel::CancelCause;
pub use registry::SessionRegistry;
pub use timeout::{TimeoutKind, TimeoutManager};

use cancel::CancelHandler;

/// Construction options, also inherited by derived sessions.
#[derive(Clone)]
pub struct SessionOptions {
    owners: Option<HashSet<UserId>>,
    authorized: Option<HashSet<UserId>>,
    row_slots: usize,
    row_width: usize,
    errors: ErrorChain,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self {
            owners: None,
            authorized: None,
            row_slots: DEFAULT_ROW_SLOTS,
            row_width: DEFAULT_ROW_WIDTH,
            errors: ErrorChain::new(),
        }
    }

    pub fn owner(mut self, user: UserId) -> Self {
        self.owners.get_or_insert_with(HashSet::new).insert(user);
        self
    }

    pub fn authorize(mut self, user: UserId) -> Self {
        self.authorized.get_or_insert_with(HashSet::new).insert(user);
        self
    }

    pub fn rows(mut self, slots: usize, width: usize) -> Self {
        self.row_slots = slots;
        self.row_width = width;
        self
    }

    pub fn error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.errors.push(handler);
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fresh,
    Active,
    Cancelled,
}

struct RenderState {
    phase: Phase,
    snapshot: Option<Snapshot>,
    handle: Option<Arc<dyn MessageHandle>>,
}

/// Lock guard that flags the session busy while held and wakes anyone
/// waiting for it to go idle once the lock is actually released.
struct StateGuard<'a> {
    guard: Option<MutexGuard<'a, RenderState>>,
    busy: &'a AtomicBool,
    unlocked: &'a Notify,
}

impl Deref for StateGuard<'_> {
    type Target = RenderState;

    fn deref(&self) -> &RenderState {
        self.guard.as_ref().expect("guard is present until drop")
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut RenderState {
        self.guard.as_mut().expect("guard is present until drop")
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.busy.store(false, Ordering::Release);
        self.unlocked.notify_waiters();
    }
}

pub struct Session {
    id: Uuid,
    this: Weak<Session>,
    builder: Builder,
    options: SessionOptions,
    state: AsyncMutex<RenderState>,
    busy: AtomicBool,
    unlocked: Notify,
    visibility: OnceLock<Visibility>,
    scope: CancellationToken,
    tasks: TaskTracker,
    timeouts: TimeoutManager,
    /// Idle period, set once by `timeout()`
    max_idle: OnceLock<Duration>,
    auto_update: Mutex<Option<CancellationToken>>,
    cancel_handlers: Mutex<Option<Vec<CancelHandler>>>,
    cause: OnceLock<CancelCause>,
}

impl Session {
    /// Session where everyone is owner
    pub fn new() -> Arc<Self> {
        Self::with_options(SessionOptions::new())
    }

    pub fn with_options(options: SessionOptions) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Session>| {
            let scope = CancellationToken::new();
            let tasks = TaskTracker::new();
            let weak = this.clone();
            let timeouts = TimeoutManager::new(scope.clone(), tasks.clone(), move |kind| {
                if let Some(session) = weak.upgrade() {
                    session.schedule_cancel(kind.into());
                }
            });
            Self {
                id: Uuid::new_v4(),
                this: this.clone(),
                builder: Builder::with_rows(options.row_slots, options.row_width),
                options,
                state: AsyncMutex::new(RenderState {
                    phase: Phase::Fresh,
                    snapshot: None,
                    handle: None,
                }),
                busy: AtomicBool::new(false),
                unlocked: Notify::new(),
                visibility: OnceLock::new(),
                scope,
                tasks,
                timeouts,
                max_idle: OnceLock::new(),
                auto_update: Mutex::new(None),
                cancel_handlers: Mutex::new(Some(Vec::new())),
                cause: OnceLock::new(),
            }
        })
    }

    /// Build a session from config: row geometry, timeouts and
    /// auto-refresh. Must be called within a Tokio runtime.
    pub fn from_config(config: &SessionConfig, options: SessionOptions) -> Arc<Self> {
        let session = Self::with_options(options.rows(config.row_slots, config.row_width));
        if let Some((max_alive, max_idle)) = config.timeouts() {
            // Fresh session, cannot already be configured.
            let _ = session.timeout(max_alive, max_idle);
        }
        if let Some(interval) = config.auto_update() {
            session.start_auto_update(interval);
        }
        session
    }

    /// New session for a follow-up surface (a summary screen, say). Same
    /// owners, authorized users, error handlers and row geometry; fresh
    /// units and render state.
    pub fn derive(&self) -> Arc<Self> {
        Self::with_options(self.options.clone())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    /// Visibility fixed by the first response
    pub fn visibility(&self) -> Option<Visibility> {
        self.visibility.get().copied()
    }

    pub fn is_cancelled(&self) -> bool {
        self.scope.is_cancelled()
    }

    /// Cause of cancellation, once cancelled
    pub fn cancel_cause(&self) -> Option<&CancelCause> {
        self.cause.get()
    }

    /// Resolves once the session has been torn down
    pub async fn cancelled(&self) {
        self.scope.cancelled().await
    }

    pub async fn phase(&self) -> Phase {
        self.lock_state().await.phase
    }

    /// Last applied surface
    pub async fn snapshot(&self) -> Option<Snapshot> {
        self.lock_state().await.snapshot.clone()
    }

    /// Id of the message currently being edited, if known
    pub async fn message_id(&self) -> Option<MessageId> {
        self.lock_state().await.handle.as_ref().and_then(|h| h.message_id())
    }

    // =========================================================================
    // Authorization
    // =========================================================================

    /// Everyone is owner when no owners were set.
    pub fn is_owner(&self, user: UserId) -> bool {
        self.options.owners.as_ref().map_or(true, |owners| owners.contains(&user))
    }

    /// True if every given user is an owner
    pub fn are_owners(&self, users: &[UserId]) -> bool {
        users.iter().all(|user| self.is_owner(*user))
    }

    /// Owners plus explicitly authorized users.
    pub fn is_authorized(&self, user: UserId) -> bool {
        match (&self.options.owners, &self.options.authorized) {
            (None, _) => true,
            (Some(owners), authorized) => {
                owners.contains(&user) || authorized.as_ref().is_some_and(|a| a.contains(&user))
            }
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Produce the first response. Everything is sent; there is nothing to
    /// diff against. Fixes the visibility for the session's lifetime.
    #[instrument(skip_all, fields(session.id = %self.id, visibility = ?visibility))]
    pub async fn render_first(&self, interaction: &Interaction, visibility: Visibility) -> Result<()> {
        let mut state = self.lock_state().await;
        match state.phase {
            Phase::Cancelled => return Err(SurfaceError::Cancelled),
            Phase::Active => return Err(SurfaceError::AlreadyResponded),
            Phase::Fresh => {}
        }

        let handle = interaction
            .responder()
            .respond(visibility)
            .await
            .map_err(SurfaceError::remote)?;

        self.render_and_apply(&mut state, handle, false, true).await?;
        let _ = self.visibility.set(visibility);
        state.phase = Phase::Active;
        info!("first response applied");
        Ok(())
    }

    /// Re-render against a fresh handle obtained from `interaction`.
    /// Always applies, even without changes, to answer the interaction.
    #[instrument(skip_all, fields(session.id = %self.id, user = %interaction.user))]
    pub async fn render_interaction(&self, interaction: &Interaction) -> Result<bool> {
        let mut state = self.lock_state().await;
        let visibility = self.active_visibility(&state)?;
        let handle = interaction
            .responder()
            .respond(visibility)
            .await
            .map_err(SurfaceError::remote)?;
        self.render_and_apply(&mut state, handle, true, true).await
    }

    /// Record the handle from `interaction` without rendering, for when the
    /// control already updated the message itself.
    #[instrument(skip_all, fields(session.id = %self.id, user = %interaction.user))]
    pub async fn acknowledge(&self, interaction: &Interaction) -> Result<()> {
        let mut state = self.lock_state().await;
        let visibility = self.active_visibility(&state)?;
        let handle = interaction
            .responder()
            .respond(visibility)
            .await
            .map_err(SurfaceError::remote)?;
        state.handle = Some(handle);
        Ok(())
    }

    /// Push whatever changed since the last apply. Returns false, without
    /// touching the network, when nothing changed.
    #[instrument(skip_all, fields(session.id = %self.id))]
    pub async fn update(&self) -> Result<bool> {
        let mut state = self.lock_state().await;
        self.active_visibility(&state)?;
        let handle = state.handle.clone().ok_or(SurfaceError::NotResponded)?;
        self.render_and_apply(&mut state, handle, true, false).await
    }

    fn active_visibility(&self, state: &RenderState) -> Result<Visibility> {
        match state.phase {
            Phase::Cancelled => Err(SurfaceError::Cancelled),
            Phase::Fresh => Err(SurfaceError::NotResponded),
            Phase::Active => Ok(self.visibility.get().copied().unwrap_or_default()),
        }
    }

    /// Render (diffed or full), run the error chain on failure, apply to
    /// `handle` and fold the result into the snapshot. Caller holds the lock.
    async fn render_and_apply(
        &self,
        state: &mut RenderState,
        handle: Arc<dyn MessageHandle>,
        diff: bool,
        force: bool,
    ) -> Result<bool> {
        let previous = if diff { state.snapshot.as_ref() } else { None };
        let (delta, unhandled) = match DeltaRenderer::new(BaseRenderer, previous).render(&self.builder) {
            Ok(delta) => (delta, false),
            Err(err) => {
                warn!(error = %err, "render failed");
                let mut delta = PendingDelta::unset();
                let handled = self.options.errors.handle(&err, &mut delta);
                if let Some(snapshot) = previous {
                    delta.retain_changes(snapshot);
                }
                (delta, !handled)
            }
        };

        if !delta.has_update() && !force {
            if unhandled {
                debug!("render failed with nothing to show");
            }
            return Ok(unhandled);
        }

        // Restore the old idle deadline if the apply fails.
        let idle_deadline = self.timeouts.idle_deadline();
        self.timeouts.cancel_idle();
        if let Err(e) = handle.apply(&delta).await {
            if let Some(deadline) = idle_deadline {
                self.timeouts.start_idle_until(deadline);
            }
            let err = SurfaceError::remote(e);
            if matches!(err, SurfaceError::MessageDeleted) {
                warn!("message deleted remotely");
                self.schedule_cancel(CancelCause::MessageDeleted);
            } else {
                warn!(error = %err, "apply failed");
            }
            return Err(err);
        }
        self.start_idle();

        state.snapshot.get_or_insert_with(Snapshot::default).apply(&delta);
        state.handle = Some(handle);
        debug!(
            content = delta.content.is_some(),
            rows = delta.rows.is_some(),
            "delta applied"
        );
        Ok(true)
    }

    // =========================================================================
    // Auto-refresh
    // =========================================================================

    /// Run `update()` every `interval` until stopped or cancelled.
    /// Returns false if already running.
    pub fn start_auto_update(&self, interval: Duration) -> bool {
        let mut slot = lock(&self.auto_update);
        if slot.is_some() || self.scope.is_cancelled() {
            return false;
        }
        let token = self.scope.child_token();
        self.tasks
            .spawn(refresh::auto_update_loop(self.this.clone(), interval, token.clone()));
        *slot = Some(token);
        debug!(session.id = %self.id, interval_ms = interval.as_millis() as u64, "auto update started");
        true
    }

    /// Returns false if it was not running.
    pub fn stop_auto_update(&self) -> bool {
        match lock(&self.auto_update).take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_auto_updating(&self) -> bool {
        lock(&self.auto_update).is_some()
    }

    /// If a render holds the lock, wait for it to be released without
    /// touching the lock. Returns true if it had to wait.
    async fn wait_if_busy(&self) -> bool {
        let notified = self.unlocked.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if !self.busy.load(Ordering::Acquire) {
            return false;
        }
        notified.await;
        true
    }

    // =========================================================================
    // Timeouts
    // =========================================================================

    /// Configure both expiry clocks and start them. Only once per session.
    /// Must be called within a Tokio runtime.
    pub fn timeout(&self, max_alive: Duration, max_idle: Duration) -> Result<()> {
        self.max_idle
            .set(max_idle)
            .map_err(|_| SurfaceError::TimeoutAlreadyConfigured)?;
        self.timeouts.start_alive(max_alive);
        self.timeouts.start_idle(max_idle);
        Ok(())
    }

    pub fn timeouts(&self) -> &TimeoutManager {
        &self.timeouts
    }

    fn start_idle(&self) {
        if let Some(max_idle) = self.max_idle.get() {
            self.timeouts.start_idle(*max_idle);
        }
    }

    // =========================================================================
    // Cancellation and task scope
    // =========================================================================

    /// Register a handler run once when the session is cancelled. If it
    /// already was, the handler runs right away and false is returned.
    pub fn on_cancel<F, Fut>(&self, handler: F) -> bool
    where
        F: FnOnce(CancelCause) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler = cancel::boxed(handler);
        let mut handlers = lock(&self.cancel_handlers);
        if let Some(handlers) = handlers.as_mut() {
            handlers.push(handler);
            return true;
        }
        drop(handlers);
        let cause = self.cause.get().cloned().unwrap_or(CancelCause::Explicit);
        tokio::spawn(async move {
            cancel::run_handlers(vec![handler], &cause).await;
        });
        false
    }

    /// Tear the session down. Returns false if it already was.
    #[instrument(skip_all, fields(session.id = %self.id, cause = %cause))]
    pub async fn cancel(&self, cause: CancelCause) -> bool {
        {
            let mut state = self.lock_state().await;
            if state.phase == Phase::Cancelled {
                return false;
            }
            state.phase = Phase::Cancelled;
            let _ = self.cause.set(cause.clone());
            self.stop_auto_update();
            self.timeouts.cancel_all();
            self.scope.cancel();
            self.tasks.close();
        }
        info!("session cancelled");

        let handlers = lock(&self.cancel_handlers).take().unwrap_or_default();
        cancel::run_handlers(handlers, &cause).await;
        true
    }

    /// Cancel from a task outside this session's scope, so tearing the
    /// scope down cannot abort the cancellation itself.
    fn schedule_cancel(&self, cause: CancelCause) {
        let Some(session) = self.this.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            session.cancel(cause).await;
        });
    }

    /// Run a child task in the session's scope; it stops on cancellation.
    /// Returns false if the session is already cancelled.
    pub fn spawn<F>(&self, fut: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.scope.is_cancelled() {
            return false;
        }
        let scope = self.scope.clone();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = scope.cancelled() => {}
                _ = fut => {}
            }
        });
        true
    }

    /// Child token of the session scope, for units running their own loops
    pub fn child_token(&self) -> CancellationToken {
        self.scope.child_token()
    }

    // =========================================================================
    // Interactions
    // =========================================================================

    /// Route a control press to the control it names. Returns false when
    /// the user may not interact, the session is gone, or no control matches.
    #[instrument(skip_all, fields(session.id = %self.id, user = %interaction.user))]
    pub async fn dispatch(&self, interaction: Interaction) -> anyhow::Result<bool> {
        if self.is_cancelled() {
            return Ok(false);
        }
        if !self.is_authorized(interaction.user) {
            debug!("unauthorized interaction ignored");
            return Ok(false);
        }
        let Some(id) = interaction.component.clone() else {
            return Ok(false);
        };
        let Some(control) = self.builder.control(&id) else {
            warn!(component.id = %id, "interaction for unknown control");
            return Ok(false);
        };
        let Some(session) = self.this.upgrade() else {
            return Ok(false);
        };
        control.on_interact(session, interaction).await?;
        Ok(true)
    }

    async fn lock_state(&self) -> StateGuard<'_> {
        let guard = self.state.lock().await;
        self.busy.store(true, Ordering::Release);
        StateGuard {
            guard: Some(guard),
            busy: &self.busy,
            unlocked: &self.unlocked,
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

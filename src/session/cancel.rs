//! Cancellation causes and the handler fan-out

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{error, warn};

use super::timeout::TimeoutKind;

/// Why a session was torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelCause {
    /// The owner left or closed the session
    OwnerExit,
    /// Nothing was applied for the idle period
    IdleTimeout,
    /// The total lifetime ran out
    AliveTimeout,
    /// The message was deleted on the remote side
    MessageDeleted,
    /// The domain finished normally (game over)
    Completed,
    /// The domain hit an error it cannot continue from
    DomainError(String),
    /// Cancelled by the caller for any other reason
    Explicit,
}

impl CancelCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelCause::OwnerExit => "owner_exit",
            CancelCause::IdleTimeout => "idle_timeout",
            CancelCause::AliveTimeout => "alive_timeout",
            CancelCause::MessageDeleted => "message_deleted",
            CancelCause::Completed => "completed",
            CancelCause::DomainError(_) => "domain_error",
            CancelCause::Explicit => "explicit",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CancelCause::IdleTimeout | CancelCause::AliveTimeout)
    }

    /// Whether the remote message can still be written to
    pub fn message_available(&self) -> bool {
        !matches!(self, CancelCause::MessageDeleted)
    }
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::DomainError(msg) => write!(f, "domain_error: {msg}"),
            other => f.write_str(other.as_str()),
        }
    }
}

impl From<TimeoutKind> for CancelCause {
    fn from(kind: TimeoutKind) -> Self {
        match kind {
            TimeoutKind::Alive => CancelCause::AliveTimeout,
            TimeoutKind::Idle => CancelCause::IdleTimeout,
        }
    }
}

pub(crate) type CancelHandler =
    Box<dyn FnOnce(CancelCause) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

pub(crate) fn boxed<F, Fut>(handler: F) -> CancelHandler
where
    F: FnOnce(CancelCause) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move |cause: CancelCause| handler(cause).boxed())
}

/// Run every handler once, in registration order. A failing or panicking
/// handler is logged and the rest still run.
pub(crate) async fn run_handlers(handlers: Vec<CancelHandler>, cause: &CancelCause) {
    for (index, handler) in handlers.into_iter().enumerate() {
        let cause = cause.clone();
        let fut = match std::panic::catch_unwind(AssertUnwindSafe(move || handler(cause))) {
            Ok(fut) => fut,
            Err(_) => {
                error!(handler = index, "cancel handler panicked");
                continue;
            }
        };
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(handler = index, error = %e, "cancel handler failed"),
            Err(_) => error!(handler = index, "cancel handler panicked"),
        }
    }
}

//! Auto-refresh loop

use std::sync::Weak;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::Session;
use crate::error::SurfaceError;

/// Call `update()` every `interval`. A tick that finds a foreground render
/// in progress waits for it to finish and then skips, rather than queuing
/// a redundant update behind it.
pub(super) async fn auto_update_loop(session: Weak<Session>, interval: Duration, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let Some(session) = session.upgrade() else {
            break;
        };

        if session.wait_if_busy().await {
            trace!(session.id = %session.id, "foreground render in progress, tick skipped");
            continue;
        }

        match session.update().await {
            Ok(true) => debug!(session.id = %session.id, "auto update applied"),
            Ok(false) => trace!(session.id = %session.id, "auto update found no changes"),
            Err(SurfaceError::Cancelled) => break,
            Err(SurfaceError::NotResponded) => trace!(session.id = %session.id, "no first response yet"),
            Err(e) => warn!(session.id = %session.id, error = %e, "auto update failed"),
        }
    }
    debug!("auto update loop stopped");
}

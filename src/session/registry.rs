//! Routing from remote message ids to live sessions
//!
//! The transport layer only knows message ids. It looks sessions up here
//! to deliver control presses and remote deletions.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use super::{CancelCause, Session};
use crate::remote::{Interaction, MessageId};

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<MessageId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `session` under `message`. The entry is dropped when the
    /// session is cancelled. Returns false if the id was already taken.
    pub fn track(&self, message: MessageId, session: &Arc<Session>) -> bool {
        if session.is_cancelled() {
            return false;
        }
        match self.sessions.entry(message) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(entry) => {
                entry.insert(session.clone());
            }
        }

        let sessions = Arc::downgrade(&self.sessions);
        let weak = Arc::downgrade(session);
        session.on_cancel(move |cause| async move {
            if let Some(sessions) = sessions.upgrade() {
                sessions.remove_if(&message, |_, tracked| std::ptr::eq(Arc::as_ptr(tracked), weak.as_ptr()));
                debug!(%message, %cause, "session untracked");
            }
            anyhow::Ok(())
        });
        true
    }

    /// Track under the id of the message the session currently edits.
    pub async fn track_current(&self, session: &Arc<Session>) -> Option<MessageId> {
        let message = session.message_id().await?;
        self.track(message, session).then_some(message)
    }

    pub fn get(&self, message: MessageId) -> Option<Arc<Session>> {
        self.sessions.get(&message).map(|entry| entry.value().clone())
    }

    /// Deliver a control press. False if no session owns the message or
    /// the session declined it.
    pub async fn dispatch(&self, message: MessageId, interaction: Interaction) -> anyhow::Result<bool> {
        let Some(session) = self.get(message) else {
            debug!(%message, "interaction for untracked message");
            return Ok(false);
        };
        session.dispatch(interaction).await
    }

    /// The remote side deleted `message`; cancel whatever session drove it.
    pub async fn message_deleted(&self, message: MessageId) -> bool {
        let Some((_, session)) = self.sessions.remove(&message) else {
            return false;
        };
        info!(%message, session.id = %session.id(), "message deleted remotely");
        session.cancel(CancelCause::MessageDeleted).await
    }

    /// Cancel every tracked session.
    pub async fn cancel_all(&self, cause: CancelCause) {
        let sessions: Vec<_> = self.sessions.iter().map(|e| e.value().clone()).collect();
        for session in sessions {
            session.cancel(cause.clone()).await;
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

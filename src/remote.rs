//! Boundary to the chat platform
//!
//! The engine never talks to a transport directly. Adapters implement
//! [`Responder`] (answer an interaction, yielding a handle to the message)
//! and [`MessageHandle`] (apply a delta to that message).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::component::ComponentId;
use crate::render::PendingDelta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who can see the message. Fixed by the first response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Ephemeral,
}

/// A live message that deltas can be applied to.
#[async_trait]
pub trait MessageHandle: Send + Sync {
    /// Remote id of the message, once known
    fn message_id(&self) -> Option<MessageId>;

    /// Apply a delta. Unset fields must be left untouched remotely.
    ///
    /// Return [`SurfaceError::MessageDeleted`](crate::SurfaceError::MessageDeleted)
    /// (optionally wrapped) when the message is gone.
    async fn apply(&self, delta: &PendingDelta) -> anyhow::Result<()>;
}

/// Answers an interaction and hands back the message to edit.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, visibility: Visibility) -> anyhow::Result<Arc<dyn MessageHandle>>;
}

/// A user action against the surface: the initial command or a control press.
#[derive(Clone)]
pub struct Interaction {
    pub user: UserId,
    /// Control that was activated; None for the initial command
    pub component: Option<ComponentId>,
    /// Selected values for select controls
    pub values: Vec<String>,
    responder: Arc<dyn Responder>,
}

impl Interaction {
    /// The command that opens a session
    pub fn command(user: UserId, responder: Arc<dyn Responder>) -> Self {
        Self {
            user,
            component: None,
            values: Vec::new(),
            responder,
        }
    }

    /// A press on a control
    pub fn control(user: UserId, component: impl Into<ComponentId>, responder: Arc<dyn Responder>) -> Self {
        Self {
            user,
            component: Some(component.into()),
            values: Vec::new(),
            responder,
        }
    }

    pub fn with_values(mut self, values: Vec<String>) -> Self {
        self.values = values;
        self
    }

    pub fn responder(&self) -> &Arc<dyn Responder> {
        &self.responder
    }
}

impl fmt::Debug for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interaction")
            .field("user", &self.user)
            .field("component", &self.component)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nowhere;

    #[async_trait]
    impl Responder for Nowhere {
        async fn respond(&self, _: Visibility) -> anyhow::Result<Arc<dyn MessageHandle>> {
            anyhow::bail!("not connected")
        }
    }

    #[test]
    fn control_interaction_carries_component() {
        let i = Interaction::control(UserId(7), "vote-a", Arc::new(Nowhere))
            .with_values(vec!["a".into()]);
        assert_eq!(i.component.as_ref().map(ComponentId::as_str), Some("vote-a"));
        assert_eq!(i.values, ["a"]);
        assert!(format!("{i:?}").contains("vote-a"));
    }

    #[tokio::test]
    async fn responder_errors_surface() {
        let i = Interaction::command(UserId(1), Arc::new(Nowhere));
        assert!(i.component.is_none());
        assert!(i.responder().respond(Visibility::Public).await.is_err());
    }

    #[test]
    fn visibility_defaults_public() {
        assert_eq!(Visibility::default(), Visibility::Public);
    }
}

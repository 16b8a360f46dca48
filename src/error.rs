//! Error types for the surface engine
//!
//! Programmer errors (double first response, mis-declared row layout,
//! double timeout configuration) fail fast with a distinguishable variant.
//! Capacity conditions (duplicate ids, full rows) are `bool` returns on the
//! registries and never show up here.

use thiserror::Error;

use crate::component::ComponentId;

pub type Result<T> = std::result::Result<T, SurfaceError>;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("session already produced its first response")]
    AlreadyResponded,

    #[error("session has not produced its first response yet")]
    NotResponded,

    #[error("session timeouts are already configured")]
    TimeoutAlreadyConfigured,

    #[error("control '{id}' (width {width}) does not fit row {slot} ({remaining} remaining)")]
    RowOverflow {
        id: ComponentId,
        slot: usize,
        width: usize,
        remaining: usize,
    },

    #[error("row {slot} is out of range ({slots} rows declared)")]
    SlotOutOfRange { slot: usize, slots: usize },

    #[error("session is cancelled")]
    Cancelled,

    /// Returned by remote adapters when the message no longer exists.
    #[error("remote message was deleted")]
    MessageDeleted,

    #[error("remote apply failed: {0}")]
    Remote(#[source] anyhow::Error),
}

impl SurfaceError {
    /// Wrap a remote adapter failure, keeping deletion distinguishable.
    pub fn remote(error: anyhow::Error) -> Self {
        if is_message_deleted(&error) {
            Self::MessageDeleted
        } else {
            Self::Remote(error)
        }
    }

    /// True for errors a caller caused by misusing the API.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyResponded
                | Self::NotResponded
                | Self::TimeoutAlreadyConfigured
                | Self::RowOverflow { .. }
                | Self::SlotOutOfRange { .. }
        )
    }
}

/// Check whether an adapter error chain reports a deleted remote message.
pub fn is_message_deleted(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<SurfaceError>(), Some(SurfaceError::MessageDeleted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn overflow_message_names_slot_and_width() {
        let err = SurfaceError::RowOverflow {
            id: ComponentId::from("vote"),
            slot: 2,
            width: 3,
            remaining: 1,
        };
        assert_eq!(
            err.to_string(),
            "control 'vote' (width 3) does not fit row 2 (1 remaining)"
        );
        assert!(err.is_programmer_error());
    }

    #[test]
    fn deletion_survives_context_wrapping() {
        let err = Err::<(), _>(anyhow::Error::new(SurfaceError::MessageDeleted))
            .context("editing message")
            .unwrap_err();
        assert!(is_message_deleted(&err));
        assert!(matches!(SurfaceError::remote(err), SurfaceError::MessageDeleted));
    }

    #[test]
    fn other_remote_errors_stay_remote() {
        let err = SurfaceError::remote(anyhow::anyhow!("rate limited"));
        assert!(matches!(err, SurfaceError::Remote(_)));
        assert!(!err.is_programmer_error());
    }
}

//! Render error handling chain

use std::sync::Arc;

use tracing::{error, warn};

use super::PendingDelta;
use crate::component::ContentBlock;

/// Gets a chance to turn a render failure into something shown remotely.
pub trait ErrorHandler: Send + Sync {
    /// Return true if the error was handled; later handlers are skipped.
    fn handle(&self, error: &anyhow::Error, delta: &mut PendingDelta) -> bool;
}

/// Ordered handlers; the first one that handles the error wins.
#[derive(Clone, Default)]
pub struct ErrorChain {
    handlers: Vec<Arc<dyn ErrorHandler>>,
}

impl ErrorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handler: Arc<dyn ErrorHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the chain. Returns true if some handler took the error.
    pub fn handle(&self, err: &anyhow::Error, delta: &mut PendingDelta) -> bool {
        for handler in &self.handlers {
            if handler.handle(err, delta) {
                return true;
            }
        }
        error!(error = %err, "render failed and no handler took it");
        false
    }
}

/// Replaces the surface with a single error block and no controls.
pub struct ErrorBlockHandler {
    title: String,
    color: u32,
}

impl ErrorBlockHandler {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            color: 0xED4245,
        }
    }
}

impl Default for ErrorBlockHandler {
    fn default() -> Self {
        Self::new("Something went wrong")
    }
}

impl ErrorHandler for ErrorBlockHandler {
    fn handle(&self, err: &anyhow::Error, delta: &mut PendingDelta) -> bool {
        warn!(error = %err, "rendering error block");
        let block = ContentBlock {
            title: Some(self.title.clone()),
            description: Some(format!("{err:#}")),
            color: Some(self.color),
            ..ContentBlock::default()
        };
        delta.content = Some(vec![block]);
        delta.rows = Some(Vec::new());
        true
    }
}

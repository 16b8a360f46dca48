//! Snapshot-diffing renderer

use super::{PendingDelta, Renderer, Snapshot};
use crate::builder::Builder;

/// Wraps a renderer and suppresses fields equal to the last applied
/// snapshot. Without a snapshot everything is treated as changed.
pub struct DeltaRenderer<'a, R> {
    inner: R,
    snapshot: Option<&'a Snapshot>,
}

impl<'a, R: Renderer> DeltaRenderer<'a, R> {
    pub fn new(inner: R, snapshot: Option<&'a Snapshot>) -> Self {
        Self { inner, snapshot }
    }
}

impl<R: Renderer> Renderer for DeltaRenderer<'_, R> {
    fn render(&self, builder: &Builder) -> anyhow::Result<PendingDelta> {
        let mut delta = self.inner.render(builder)?;
        if let Some(snapshot) = self.snapshot {
            delta.retain_changes(snapshot);
        }
        Ok(delta)
    }
}

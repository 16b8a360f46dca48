//! Render pipeline
//!
//! [`BaseRenderer`] walks a [`Builder`] and produces the full surface:
//! composites are loaded first so whatever they register shows up in the
//! same pass, then content units merge into one block, then populated rows
//! become one list of controls each.
//!
//! [`DeltaRenderer`] decorates any renderer and blanks out the fields that
//! match the last applied [`Snapshot`], leaving the minimal change.

mod delta;
mod errors;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::builder::Builder;
use crate::component::{ContentBlock, Control};

pub use delta::DeltaRenderer;
pub use errors::{ErrorBlockHandler, ErrorChain, ErrorHandler};

/// What the remote surface currently shows, as last applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub content: Vec<ContentBlock>,
    pub rows: Vec<Vec<Control>>,
}

impl Snapshot {
    /// Fold an applied delta in. Unset fields keep their current value.
    pub fn apply(&mut self, delta: &PendingDelta) {
        if let Some(content) = &delta.content {
            self.content = content.clone();
        }
        if let Some(rows) = &delta.rows {
            self.rows = rows.clone();
        }
    }
}

/// A change to push to the remote surface.
///
/// `None` means "leave the remote value alone"; `Some(vec![])` means
/// "clear it". The two must never be conflated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentBlock>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<Control>>>,
}

impl PendingDelta {
    /// Delta that changes nothing
    pub fn unset() -> Self {
        Self::default()
    }

    /// Delta that sets every field
    pub fn full(snapshot: Snapshot) -> Self {
        Self {
            content: Some(snapshot.content),
            rows: Some(snapshot.rows),
        }
    }

    pub fn has_update(&self) -> bool {
        self.content.is_some() || self.rows.is_some()
    }

    /// Unset every field that already matches `snapshot`.
    pub fn retain_changes(&mut self, snapshot: &Snapshot) {
        if self.content.as_ref() == Some(&snapshot.content) {
            self.content = None;
        }
        if self.rows.as_ref() == Some(&snapshot.rows) {
            self.rows = None;
        }
    }
}

/// Turns a builder into a delta.
pub trait Renderer: Send + Sync {
    fn render(&self, builder: &Builder) -> anyhow::Result<PendingDelta>;
}

/// Renders everything; its output never has unset fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseRenderer;

impl BaseRenderer {
    pub fn render_full(&self, builder: &Builder) -> anyhow::Result<Snapshot> {
        // Snapshot first so composites can register more units.
        for composite in builder.composites().snapshot() {
            composite.on_load(builder)?;
        }

        let units = builder.content().snapshot();
        let mut content = Vec::new();
        if !units.is_empty() {
            let mut block = ContentBlock::new();
            for unit in &units {
                unit.render(&mut block)?;
            }
            content.push(block);
        }

        let mut rows = Vec::new();
        for row in builder.rows().rows() {
            let controls = row
                .iter()
                .map(|unit| unit.render())
                .collect::<anyhow::Result<Vec<_>>>()?;
            rows.push(controls);
        }

        trace!(
            content_units = units.len(),
            rows = rows.len(),
            "rendered surface"
        );
        Ok(Snapshot { content, rows })
    }
}

impl Renderer for BaseRenderer {
    fn render(&self, builder: &Builder) -> anyhow::Result<PendingDelta> {
        self.render_full(builder).map(PendingDelta::full)
    }
}

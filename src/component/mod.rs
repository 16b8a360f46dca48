//! Component model: the three kinds of units a surface is declared from
//!
//! - [`ContentUnit`] writes into the single merged [`ContentBlock`]
//! - [`ControlUnit`] produces one [`Control`] and occupies row width
//! - [`CompositeUnit`] registers other units when loaded, never rendered
//!
//! Units are identified by [`ComponentId`]; diffing compares rendered
//! values, registries compare ids.

mod block;
mod control;
mod units;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::builder::Builder;
use crate::remote::Interaction;
use crate::session::Session;

pub use block::{Author, ContentBlock, Field};
pub use control::{ButtonStyle, Control, SelectOption};
pub use units::{Button, FnComposite, FnContent, InteractHandler};

/// Identifier of a unit, unique within one registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Behaviour shared by every registered unit.
pub trait Unit: Send + Sync {
    fn id(&self) -> &ComponentId;

    /// Called when the unit is removed with cancellation. Units owning
    /// background work stop it here.
    fn cancel(&self) {}
}

/// Contributes fields to the one merged content block.
pub trait ContentUnit: Unit {
    fn render(&self, block: &mut ContentBlock) -> anyhow::Result<()>;
}

/// One interactive control placed into a width-limited row.
#[async_trait]
pub trait ControlUnit: Unit {
    /// Row width this control occupies.
    fn width(&self) -> usize {
        1
    }

    fn render(&self) -> anyhow::Result<Control>;

    /// Invoked when a user activates this control.
    ///
    /// The default re-renders the session against the interaction.
    async fn on_interact(&self, session: Arc<Session>, interaction: Interaction) -> anyhow::Result<()> {
        session.render_interaction(&interaction).await?;
        Ok(())
    }
}

/// Registers other units when loaded. Loaded once per render pass.
pub trait CompositeUnit: Unit {
    fn on_load(&self, builder: &Builder) -> anyhow::Result<()>;
}

//! Registries a surface is declared into
//!
//! Each kind of unit lives in its own registry with its own lock. The
//! [`Builder`] facade ties the three together and is what composites and
//! the renderer see.

mod keyed;
mod rows;

use std::sync::Arc;

use crate::component::{ComponentId, CompositeUnit, ContentUnit, ControlUnit};
use crate::error::Result;

pub use keyed::Keyed;
pub use rows::{RowRegistry, DEFAULT_ROW_SLOTS, DEFAULT_ROW_WIDTH};

pub type ContentRegistry = Keyed<dyn ContentUnit>;
pub type CompositeRegistry = Keyed<dyn CompositeUnit>;

#[derive(Default)]
pub struct Builder {
    content: ContentRegistry,
    rows: RowRegistry,
    composites: CompositeRegistry,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder with a custom row geometry
    pub fn with_rows(slots: usize, width: usize) -> Self {
        Self {
            content: Keyed::new(),
            rows: RowRegistry::new(slots, width),
            composites: Keyed::new(),
        }
    }

    pub fn content(&self) -> &ContentRegistry {
        &self.content
    }

    pub fn rows(&self) -> &RowRegistry {
        &self.rows
    }

    pub fn composites(&self) -> &CompositeRegistry {
        &self.composites
    }

    pub fn add_content(&self, unit: Arc<dyn ContentUnit>) -> bool {
        self.content.add(unit)
    }

    pub fn add_control(&self, unit: Arc<dyn ControlUnit>) -> bool {
        self.rows.add(unit)
    }

    pub fn add_control_at(&self, unit: Arc<dyn ControlUnit>, slot: usize) -> Result<bool> {
        self.rows.add_at(unit, slot)
    }

    pub fn add_composite(&self, unit: Arc<dyn CompositeUnit>) -> bool {
        self.composites.add(unit)
    }

    /// Find a registered control by id
    pub fn control(&self, id: &ComponentId) -> Option<Arc<dyn ControlUnit>> {
        self.rows.get(id)
    }

    /// Remove and cancel the given ids from every registry.
    pub fn remove_and_cancel(&self, ids: &[ComponentId]) -> bool {
        let composites = self.composites.remove_and_cancel(ids);
        let content = self.content.remove_and_cancel(ids);
        let rows = self.rows.remove_and_cancel(ids);
        composites || content || rows
    }

    /// Remove and cancel everything.
    pub fn remove_and_cancel_all(&self) {
        self.composites.clear_and_cancel();
        self.content.clear_and_cancel();
        self.rows.clear_and_cancel();
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.rows.is_empty() && self.composites.is_empty()
    }
}

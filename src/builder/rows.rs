//! Control rows with first-fit width packing
//!
//! A fixed number of rows (slots), each with a fixed width capacity.
//! Unslotted adds go to the first row with enough room; slotted adds go
//! exactly where asked and fail loudly if the row is full, because that
//! means the layout was declared wrong.

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::component::{ComponentId, ControlUnit};
use crate::error::{Result, SurfaceError};
use crate::sync::lock;

pub const DEFAULT_ROW_SLOTS: usize = 5;
pub const DEFAULT_ROW_WIDTH: usize = 5;

type Row = Vec<Arc<dyn ControlUnit>>;

pub struct RowRegistry {
    slots: usize,
    width: usize,
    rows: Mutex<Vec<Row>>,
}

impl RowRegistry {
    pub fn new(slots: usize, width: usize) -> Self {
        Self {
            slots,
            width,
            rows: Mutex::new((0..slots).map(|_| Vec::new()).collect()),
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// First-fit add. False on duplicate id or when no row has room.
    pub fn add(&self, unit: Arc<dyn ControlUnit>) -> bool {
        let mut rows = lock(&self.rows);
        if contains(&rows, unit.id()) {
            debug!(component.id = %unit.id(), "duplicate control id rejected");
            return false;
        }
        let needed = unit.width();
        let Some(slot) = rows.iter().position(|row| remaining(self.width, row) >= needed) else {
            debug!(component.id = %unit.id(), width = needed, "no row has room");
            return false;
        };
        rows[slot].push(unit);
        true
    }

    /// Add into an explicit row.
    ///
    /// `Ok(false)` on duplicate id; an error if the row does not exist or
    /// cannot fit the control.
    pub fn add_at(&self, unit: Arc<dyn ControlUnit>, slot: usize) -> Result<bool> {
        let mut rows = lock(&self.rows);
        if contains(&rows, unit.id()) {
            return Ok(false);
        }
        let row = rows.get_mut(slot).ok_or(SurfaceError::SlotOutOfRange {
            slot,
            slots: self.slots,
        })?;
        let free = remaining(self.width, row);
        if free < unit.width() {
            return Err(SurfaceError::RowOverflow {
                id: unit.id().clone(),
                slot,
                width: unit.width(),
                remaining: free,
            });
        }
        row.push(unit);
        Ok(true)
    }

    pub fn remove(&self, id: &ComponentId) -> bool {
        let mut rows = lock(&self.rows);
        for row in rows.iter_mut() {
            if let Some(pos) = row.iter().position(|u| u.id() == id) {
                row.remove(pos);
                return true;
            }
        }
        false
    }

    /// Remove and cancel the given controls. True if any was present.
    pub fn remove_and_cancel(&self, ids: &[ComponentId]) -> bool {
        let mut removed = Vec::new();
        {
            let mut rows = lock(&self.rows);
            for row in rows.iter_mut() {
                let (gone, kept): (Row, Row) = row.drain(..).partition(|u| ids.contains(u.id()));
                *row = kept;
                removed.extend(gone);
            }
        }
        let any = !removed.is_empty();
        for unit in removed {
            unit.cancel();
        }
        any
    }

    pub fn clear_and_cancel(&self) {
        let removed: Vec<Row> = {
            let mut rows = lock(&self.rows);
            rows.iter_mut().map(std::mem::take).collect()
        };
        for unit in removed.into_iter().flatten() {
            unit.cancel();
        }
    }

    pub fn get(&self, id: &ComponentId) -> Option<Arc<dyn ControlUnit>> {
        lock(&self.rows).iter().flatten().find(|u| u.id() == id).cloned()
    }

    /// Width still free in a row, or None if the row does not exist
    pub fn remaining(&self, slot: usize) -> Option<usize> {
        lock(&self.rows).get(slot).map(|row| remaining(self.width, row))
    }

    /// Populated rows in slot order. Empty rows are omitted.
    pub fn rows(&self) -> Vec<Row> {
        lock(&self.rows)
            .iter()
            .filter(|row| !row.is_empty())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RowRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_SLOTS, DEFAULT_ROW_WIDTH)
    }
}

// Recomputed from the members every time; no running total to drift.
fn remaining(capacity: usize, row: &[Arc<dyn ControlUnit>]) -> usize {
    capacity.saturating_sub(row.iter().map(|u| u.width()).sum())
}

fn contains(rows: &[Row], id: &ComponentId) -> bool {
    rows.iter().flatten().any(|u| u.id() == id)
}

//! Insertion-ordered unit registry keyed by id

use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::component::{ComponentId, Unit};
use crate::sync::lock;

/// Units kept in insertion order, unique by id.
///
/// The lock is a leaf: it is never held while unit code runs, so units may
/// freely call back into the registry from `render`, `on_load` or `cancel`.
pub struct Keyed<T: ?Sized> {
    units: Mutex<Vec<Arc<T>>>,
}

impl<T: ?Sized + Unit> Keyed<T> {
    pub fn new() -> Self {
        Self {
            units: Mutex::new(Vec::new()),
        }
    }

    /// Add a unit. Returns false if the id is already present.
    pub fn add(&self, unit: Arc<T>) -> bool {
        let mut units = lock(&self.units);
        if units.iter().any(|u| u.id() == unit.id()) {
            debug!(component.id = %unit.id(), "duplicate unit id rejected");
            return false;
        }
        units.push(unit);
        true
    }

    /// Remove a unit without cancelling it
    pub fn remove(&self, id: &ComponentId) -> bool {
        self.take(|u| u.id() == id).is_some()
    }

    /// Remove and cancel the given units. Returns true if any was present.
    pub fn remove_and_cancel(&self, ids: &[ComponentId]) -> bool {
        let removed = self.take_all(|u| ids.contains(u.id()));
        let any = !removed.is_empty();
        for unit in removed {
            unit.cancel();
        }
        any
    }

    /// Remove and cancel everything
    pub fn clear_and_cancel(&self) {
        let removed = std::mem::take(&mut *lock(&self.units));
        for unit in removed {
            unit.cancel();
        }
    }

    pub fn get(&self, id: &ComponentId) -> Option<Arc<T>> {
        lock(&self.units).iter().find(|u| u.id() == id).cloned()
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        lock(&self.units).iter().any(|u| u.id() == id)
    }

    /// Point-in-time copy of the units, in insertion order
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        lock(&self.units).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.units).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.units).is_empty()
    }

    fn take(&self, pred: impl Fn(&Arc<T>) -> bool) -> Option<Arc<T>> {
        let mut units = lock(&self.units);
        let pos = units.iter().position(pred)?;
        Some(units.remove(pos))
    }

    fn take_all(&self, pred: impl Fn(&Arc<T>) -> bool) -> Vec<Arc<T>> {
        let mut units = lock(&self.units);
        let (removed, kept): (Vec<_>, Vec<_>) = units.drain(..).partition(|u| pred(u));
        *units = kept;
        removed
    }
}

impl<T: ?Sized + Unit> Default for Keyed<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Probe {
        id: ComponentId,
        cancelled: AtomicBool,
    }

    impl Probe {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.into(),
                cancelled: AtomicBool::new(false),
            })
        }
    }

    impl Unit for Probe {
        fn id(&self) -> &ComponentId {
            &self.id
        }

        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let reg: Keyed<Probe> = Keyed::new();
        assert!(reg.add(Probe::new("a")));
        assert!(!reg.add(Probe::new("a")));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn keeps_insertion_order() {
        let reg: Keyed<Probe> = Keyed::new();
        for id in ["c", "a", "b"] {
            reg.add(Probe::new(id));
        }
        let ids: Vec<_> = reg.snapshot().iter().map(|u| u.id.to_string()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn remove_does_not_cancel() {
        let reg: Keyed<Probe> = Keyed::new();
        let probe = Probe::new("a");
        reg.add(probe.clone());
        assert!(reg.remove(&"a".into()));
        assert!(!reg.remove(&"a".into()));
        assert!(!probe.cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn remove_and_cancel_cancels_only_named() {
        let reg: Keyed<Probe> = Keyed::new();
        let a = Probe::new("a");
        let b = Probe::new("b");
        reg.add(a.clone());
        reg.add(b.clone());

        assert!(reg.remove_and_cancel(&["a".into(), "zzz".into()]));
        assert!(a.cancelled.load(Ordering::SeqCst));
        assert!(!b.cancelled.load(Ordering::SeqCst));
        assert!(reg.contains(&"b".into()));
        assert!(!reg.remove_and_cancel(&["a".into()]));
    }

    #[test]
    fn clear_and_cancel_empties() {
        let reg: Keyed<Probe> = Keyed::new();
        let a = Probe::new("a");
        reg.add(a.clone());
        reg.clear_and_cancel();
        assert!(reg.is_empty());
        assert!(a.cancelled.load(Ordering::SeqCst));
    }
}

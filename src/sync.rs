//! Small helpers around std locks used for leaf state

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a leaf mutex. A panic while holding one of these never leaves the
/// protected value half-written, so poisoning is ignored.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

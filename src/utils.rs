use std::sync::{Mutex, MutexGuard};

/// Lock a mutex, taking the data even if another thread panicked while holding it.
///
/// Every mutex in this crate guards plain collections whose invariants hold
/// between statements, so a poisoned guard is still consistent.
pub(crate) fn lock_or_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

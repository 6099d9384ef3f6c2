//! Small crate-wide helpers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard if a panicking holder poisoned it.
/// Engine state stays consistent under poisoning because every mutation
/// completes before its guard drops.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-unique object label with the given prefix (`tensor-42`).
pub(crate) fn next_label(prefix: &str) -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let id = NEXT.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_unique() {
        let a = next_label("tensor");
        let b = next_label("tensor");
        assert_ne!(a, b);
        assert!(a.starts_with("tensor-"));
    }
}

//! Lock poisoning helpers
//!
//! A panic while holding one of the shared std locks (address-lock table,
//! vendor prefix table, memory store) poisons it. These helpers turn the
//! poison into the caller's error type instead of panicking again.

use std::sync::{LockResult, MutexGuard, RwLockReadGuard, RwLockWriteGuard};

fn poisoned_message(kind: &str) -> String {
    format!(
        "internal synchronisation error: {} poisoned by a panic in another task",
        kind
    )
}

/// Map a poisoned `Mutex::lock` result into an application error
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use bleradar::core::sync::handle_mutex_poison;
/// use bleradar::scanner::api::ScanError;
///
/// let counter = Mutex::new(0u32);
/// let guard = handle_mutex_poison(counter.lock(), |message| ScanError::Io { message }).unwrap();
/// assert_eq!(*guard, 0);
/// ```
pub fn handle_mutex_poison<'a, T, E>(
    result: LockResult<MutexGuard<'a, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<MutexGuard<'a, T>, E> {
    result.map_err(|_| error_constructor(poisoned_message("mutex")))
}

pub fn handle_rwlock_read<'a, T, E>(
    result: LockResult<RwLockReadGuard<'a, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<'a, T>, E> {
    result.map_err(|_| error_constructor(poisoned_message("rwlock (read)")))
}

pub fn handle_rwlock_write<'a, T, E>(
    result: LockResult<RwLockWriteGuard<'a, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<'a, T>, E> {
    result.map_err(|_| error_constructor(poisoned_message("rwlock (write)")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex, RwLock};
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct LockError(String);

    #[test]
    fn test_healthy_mutex_passes_guard_through() {
        let table = Mutex::new(vec!["001A7D"]);
        let guard = handle_mutex_poison(table.lock(), LockError).unwrap();
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn test_poisoned_mutex_becomes_error() {
        let table = Arc::new(Mutex::new(0));
        let clone = Arc::clone(&table);
        let _ = thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison the table");
        })
        .join();

        let error = handle_mutex_poison(table.lock(), LockError).unwrap_err();
        assert!(error.0.contains("mutex poisoned"));
    }

    #[test]
    fn test_poisoned_rwlock_write_becomes_error() {
        let table = Arc::new(RwLock::new(0));
        let clone = Arc::clone(&table);
        let _ = thread::spawn(move || {
            let _guard = clone.write().unwrap();
            panic!("poison the table");
        })
        .join();

        assert!(handle_rwlock_write(table.write(), LockError).is_err());
        assert!(handle_rwlock_read(table.read(), LockError).is_err());
    }

    #[test]
    fn test_rwlock_write_then_read() {
        let table = RwLock::new(1);
        *handle_rwlock_write(table.write(), LockError).unwrap() = 2;
        assert_eq!(*handle_rwlock_read(table.read(), LockError).unwrap(), 2);
    }
}

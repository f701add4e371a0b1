//! Synchronization utilities for robust mutex handling
//!
//! Converts lock poisoning into application-specific errors instead of
//! panicking, so a panic on one lifecycle path cannot cascade through
//! every other caller of the same lock.

use std::sync::{LockResult, MutexGuard, RwLockReadGuard, RwLockWriteGuard};

/// Handle poisoned mutex cases with consistent error handling
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use groupizer::core::sync::handle_mutex_poison;
/// use groupizer::messaging::api::MessagingError;
///
/// let mutex = Mutex::new(42);
/// let guard = handle_mutex_poison(mutex.lock(), |message| {
///     MessagingError::OperationFailed { message }
/// })
/// .unwrap();
/// assert_eq!(*guard, 42);
/// ```
pub fn handle_mutex_poison<T, E>(
    result: LockResult<MutexGuard<'_, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<MutexGuard<'_, T>, E> {
    result.map_err(|poison| {
        error_constructor(format!(
            "Internal synchronisation error (mutex poisoned). This indicates a panic occurred while holding a lock. PoisonError: {:?}",
            poison
        ))
    })
}

/// Handle poisoned RwLock read operations with consistent error handling
pub fn handle_rwlock_read<'a, T, E>(
    result: LockResult<RwLockReadGuard<'a, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<'a, T>, E> {
    result.map_err(|poison| {
        error_constructor(format!(
            "Internal synchronisation error (read lock poisoned). PoisonError: {:?}",
            poison
        ))
    })
}

/// Handle poisoned RwLock write operations with consistent error handling
pub fn handle_rwlock_write<'a, T, E>(
    result: LockResult<RwLockWriteGuard<'a, T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<'a, T>, E> {
    result.map_err(|poison| {
        error_constructor(format!(
            "Internal synchronisation error (write lock poisoned). PoisonError: {:?}",
            poison
        ))
    })
}

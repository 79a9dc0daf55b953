//! Convenience extension traits for the `std::sync` locks, for code where a
//! poisoned lock is a bug in the panicking holder rather than a condition
//! the current caller can recover from.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Extension trait for [`Mutex`].
pub trait MutexExtra {
    /// The guarded value.
    type Value: ?Sized;

    /// Lock, panicking if the lock is poisoned.
    fn lock_unwrap(&self) -> MutexGuard<'_, Self::Value>;
}

impl<T: ?Sized> MutexExtra for Mutex<T> {
    type Value = T;

    fn lock_unwrap(&self) -> MutexGuard<'_, T> {
        self.lock().expect("lock is poisoned")
    }
}

/// Extension trait for [`RwLock`].
pub trait RwLockExtra {
    /// The guarded value.
    type Value: ?Sized;

    /// Take the read lock, panicking if the lock is poisoned.
    fn read_unwrap(&self) -> RwLockReadGuard<'_, Self::Value>;
    /// Take the write lock, panicking if the lock is poisoned.
    fn write_unwrap(&self) -> RwLockWriteGuard<'_, Self::Value>;
}

impl<T: ?Sized> RwLockExtra for RwLock<T> {
    type Value = T;

    fn read_unwrap(&self) -> RwLockReadGuard<'_, T> {
        self.read().expect("lock is poisoned")
    }

    fn write_unwrap(&self) -> RwLockWriteGuard<'_, T> {
        self.write().expect("lock is poisoned")
    }
}

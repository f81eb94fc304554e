//! # Thread-Safe Pool
//!
//! A [`FixedSizePool`] behind a mutex, for objects created on the event
//! thread and released by the render thread.

use parking_lot::{Mutex, MutexGuard};

use super::pool::{FixedSizePool, PoolConfig, PoolKey};

/// Mutex-guarded pool whose keys may be shared between threads.
///
/// Individual allocations and frees take the lock for one operation.
/// Batch access during a frame goes through [`ThreadSafePool::lock`].
pub struct ThreadSafePool<T> {
    inner: Mutex<FixedSizePool<T>>,
}

impl<T> ThreadSafePool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Mutex::new(FixedSizePool::new(config)),
        }
    }

    /// Stores `value` under the lock.
    pub fn allocate_thread_safe(&self, value: T) -> PoolKey {
        self.inner.lock().allocate(value)
    }

    /// Frees `key` under the lock.
    pub fn free_thread_safe(&self, key: PoolKey) -> Option<T> {
        self.inner.lock().free(key)
    }

    /// Runs `f` on the object behind `key`.
    pub fn with<R>(&self, key: PoolKey, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.lock().get(key).map(f)
    }

    /// Runs `f` on the object behind `key` mutably.
    pub fn with_mut<R>(&self, key: PoolKey, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.inner.lock().get_mut(key).map(f)
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if no objects are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Holds the lock for a batch of operations.
    pub fn lock(&self) -> MutexGuard<'_, FixedSizePool<T>> {
        self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_allocate_on_one_thread_free_on_another() {
        let pool = Arc::new(ThreadSafePool::new(PoolConfig::default()));
        let keys: Vec<_> = (0..100_u32).map(|i| pool.allocate_thread_safe(i)).collect();

        let remote = Arc::clone(&pool);
        let freed = thread::spawn(move || {
            keys.into_iter()
                .filter_map(|key| remote.free_thread_safe(key))
                .sum::<u32>()
        })
        .join()
        .expect("free thread panicked");

        assert_eq!(freed, (0..100).sum());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_with_mut_updates_in_place() {
        let pool = ThreadSafePool::new(PoolConfig::default());
        let key = pool.allocate_thread_safe(String::from("node"));
        pool.with_mut(key, |name| name.push_str("-1"));
        assert_eq!(pool.with(key, String::clone).as_deref(), Some("node-1"));
    }
}

//! Request-scoped locks keyed by thread root id.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Set of thread roots currently being wrangled.
///
/// A request locks every root it touches at once, so two requests either
/// share no root and run in parallel, or run one after the other.
#[derive(Debug, Default)]
pub struct ThreadLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every key is free, then take them all.
    pub fn lock<I, S>(&self, keys: I) -> ThreadLockGuard<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();

        let mut held = self.held();
        while keys.iter().any(|k| held.contains(k)) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        held.extend(keys.iter().cloned());

        ThreadLockGuard { locks: self, keys }
    }

    #[cfg(test)]
    fn is_locked(&self, key: &str) -> bool {
        self.held().contains(key)
    }

    fn held(&self) -> MutexGuard<'_, HashSet<String>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct ThreadLockGuard<'a> {
    locks: &'a ThreadLocks,
    keys: Vec<String>,
}

impl ThreadLockGuard<'_> {
    /// Locked roots, sorted and deduplicated.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for ThreadLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held();
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

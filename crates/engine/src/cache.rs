//! Invalidate-on-write, rebuild-on-read caches.

use std::sync::{Arc, RwLock};

use crate::util::{read_lock, write_lock};

/// Validity of a lazily built value.
#[derive(Debug)]
pub(crate) enum Cached<T> {
    Fresh(Arc<T>),
    Stale,
}

/// A single lazily built value behind a read-write lock.
///
/// Reads of a fresh value only take the read lock. The first read after an
/// invalidation rebuilds under the write lock, checking again so concurrent
/// readers build once.
#[derive(Debug)]
pub(crate) struct CacheCell<T> {
    state: RwLock<Cached<T>>,
}

impl<T> CacheCell<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(Cached::Stale),
        }
    }

    pub(crate) fn get_or_build(&self, build: impl FnOnce() -> T) -> Arc<T> {
        if let Cached::Fresh(value) = &*read_lock(&self.state) {
            return Arc::clone(value);
        }

        let mut state = write_lock(&self.state);
        if let Cached::Fresh(value) = &*state {
            return Arc::clone(value);
        }
        let value = Arc::new(build());
        *state = Cached::Fresh(Arc::clone(&value));
        value
    }

    pub(crate) fn invalidate(&self) {
        *write_lock(&self.state) = Cached::Stale;
    }

    #[cfg(test)]
    pub(crate) fn is_fresh(&self) -> bool {
        matches!(&*read_lock(&self.state), Cached::Fresh(_))
    }
}

impl<T> Default for CacheCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

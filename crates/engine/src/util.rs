//! Internal helpers for validation and lock handling.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and lock access so the engine enforces consistent invariants.

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{EngineError, ResultEngine};

/// Read access that survives a poisoned lock.
///
/// Every guarded value in the engine is a cache or a derived value, so the
/// data behind a poisoned lock is still usable.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Trim a required text value and reject empty strings.
pub(crate) fn normalize_required(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidArgument(format!(
            "{label} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Reject identifiers that are not strictly positive.
pub(crate) fn ensure_positive_number(value: i32, label: &str) -> ResultEngine<i32> {
    if value <= 0 {
        return Err(EngineError::InvalidArgument(format!(
            "{label} must be > 0, got {value}"
        )));
    }
    Ok(value)
}

/// Account numbers are stored upper-cased, like the ledger prints them.
pub(crate) fn normalize_account_number(value: &str) -> ResultEngine<String> {
    normalize_required(value, "account number").map(|number| number.to_uppercase())
}

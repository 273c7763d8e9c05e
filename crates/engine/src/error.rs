//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`InvalidArgument`] thrown when a required argument breaks a precondition.
//! - [`InvalidAmount`] thrown when a monetary value is negative or malformed.
//! - [`AccountingMismatch`] thrown when entities of two accountings are mixed.
//! - [`ExistingKey`] thrown when an item with the same identity already exists.
//! - [`KeyNotFound`] thrown when an item is not found.
//! - [`Unsupported`] thrown when an operation is not allowed on the target.
//!
//!  [`InvalidArgument`]: EngineError::InvalidArgument
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`AccountingMismatch`]: EngineError::AccountingMismatch
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Unsupported`]: EngineError::Unsupported
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Accounting mismatch: {0}")]
    AccountingMismatch(String),
    #[error("\"{0}\" already exists!")]
    ExistingKey(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl EngineError {
    /// Returns `true` for the duplicate-key kind.
    #[must_use]
    pub fn is_existing_key(&self) -> bool {
        matches!(self, Self::ExistingKey(_))
    }
}

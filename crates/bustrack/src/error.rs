//! Error types for bustrack.
//!
//! This module defines all error types used throughout the bustrack crate.
//! Conditions the tracking pipeline resolves on its own (a missing record,
//! malformed status text) are not errors and never appear here.

use thiserror::Error;

use crate::record::TrackStatus;

/// The main error type for bustrack operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Store Errors ===
    /// A write to the position store failed.
    #[error("position store write failed: {message}")]
    StoreWrite {
        /// Description of what went wrong.
        message: String,
    },

    /// A write would move the record's status backwards.
    #[error("status cannot move from {from} to {to} without a reset")]
    InvalidTransition {
        /// Status currently held by the store.
        from: TrackStatus,
        /// Status the write attempted to set.
        to: TrackStatus,
    },

    // === Subscription Errors ===
    /// The subscriber fell behind and missed some writes.
    #[error("subscription lagged behind by {skipped} updates")]
    SubscriptionLagged {
        /// Number of writes that were dropped for this subscriber.
        skipped: u64,
    },

    /// The store backing the subscription is gone.
    #[error("subscription closed")]
    SubscriptionClosed,

    /// The tracking session has already shut down.
    #[error("tracking session closed")]
    SessionClosed,

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for bustrack operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new store write error.
    #[must_use]
    pub fn store_write(message: impl Into<String>) -> Self {
        Self::StoreWrite {
            message: message.into(),
        }
    }

    /// Create a new configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if the subscription can keep delivering after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SubscriptionLagged { .. })
    }
}

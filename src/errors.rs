//! Unified error types for the booking core.
//!
//! Every rejection a caller is expected to render (a full slot, a duplicate booking,
//! an empty credit balance) is a variant here rather than a panic or an opaque database
//! failure. [`Error::kind`] collapses the variants onto the public [`ErrorKind`] taxonomy.

use chrono::{NaiveDate, NaiveTime};
use sea_orm::DbErr;
use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tracing::warn;

/// Coarse classification of an [`Error`], stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown session, class, registration or user
    NotFound,
    /// The requested date/time is not a real occurrence of the session
    InvalidSlot,
    /// The user already holds an active booking for the slot
    DuplicateBooking,
    /// No capacity left in the slot
    SlotFull,
    /// Credit debit requested but the balance is too low
    InsufficientCredit,
    /// Malformed or inconsistent input
    Validation,
    /// Store unavailable or conflict retries exhausted; the caller may retry
    Unavailable,
}

impl ErrorKind {
    /// Snake-case name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidSlot => "invalid_slot",
            Self::DuplicateBooking => "duplicate_booking",
            Self::SlotFull => "slot_full",
            Self::InsufficientCredit => "insufficient_credit",
            Self::Validation => "validation_error",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Main error type for the booking core.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced record does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record, e.g. `"session"`
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The date/time does not correspond to an occurrence of the session
    #[error("session {session_id} does not run on {date} at {time}")]
    InvalidSlot {
        /// Session that was requested
        session_id: i64,
        /// Requested calendar date
        date: NaiveDate,
        /// Requested start time
        time: NaiveTime,
    },

    /// The user already holds an active registration for this slot
    #[error("user {user_id} already has an active booking for session {session_id} on {date} at {time}")]
    DuplicateBooking {
        /// Booking user
        user_id: String,
        /// Session of the slot
        session_id: i64,
        /// Date of the slot
        date: NaiveDate,
        /// Time of the slot
        time: NaiveTime,
    },

    /// Capacity for the slot is exhausted
    #[error("slot is full ({active_count}/{capacity} booked)")]
    SlotFull {
        /// Configured maximum capacity
        capacity: i32,
        /// Active registrations currently holding the slot
        active_count: i64,
    },

    /// A debit was requested that the balance cannot cover
    #[error("insufficient {group} credit: {remaining} remaining, {required} required")]
    InsufficientCredit {
        /// Credit group that was charged
        group: String,
        /// Balance at the time of the attempt
        remaining: i64,
        /// Amount the operation needed
        required: i64,
    },

    /// Input failed validation
    #[error("validation error: {message}")]
    Validation {
        /// Human-readable explanation
        message: String,
    },

    /// Store unavailable or transaction conflicts persisted after retry
    #[error("service unavailable: {message}")]
    Unavailable {
        /// Human-readable explanation
        message: String,
    },

    /// Transient write conflict; retried once before surfacing as [`Error::Unavailable`]
    #[error("write conflict: {message}")]
    Conflict {
        /// Human-readable explanation
        message: String,
    },

    /// Startup configuration problem
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable explanation
        message: String,
    },

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    /// I/O failure (binding the listener, reading config)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] with a displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Projects this error onto the public taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidSlot { .. } => ErrorKind::InvalidSlot,
            Self::DuplicateBooking { .. } => ErrorKind::DuplicateBooking,
            Self::SlotFull { .. } => ErrorKind::SlotFull,
            Self::InsufficientCredit { .. } => ErrorKind::InsufficientCredit,
            Self::Validation { .. } | Self::Config { .. } => ErrorKind::Validation,
            Self::Unavailable { .. } | Self::Conflict { .. } | Self::Database(_) | Self::Io(_) => {
                ErrorKind::Unavailable
            }
        }
    }

    /// Whether this is a transient write conflict worth one more attempt.
    ///
    /// Covers unique-key races on lock rows, `SQLite` busy/locked errors and
    /// Postgres serialization or deadlock failures.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        let err = match self {
            Self::Conflict { .. } => return true,
            Self::Database(err) => err,
            _ => return false,
        };
        let message = err.to_string();
        message.contains("database is locked")
            || message.contains("database table is locked")
            || message.contains("40001")
            || message.contains("40P01")
            || message.contains("could not serialize")
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

/// Runs `attempt`, repeating it once if it fails with a transient write conflict.
/// A second conflict surfaces as [`Error::Unavailable`].
pub(crate) async fn with_conflict_retry<T, F, Fut>(
    operation: &'static str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match attempt().await {
        Err(e) if e.is_conflict() => {
            warn!(operation, error = %e, "Write conflict, retrying once");
            match attempt().await {
                Err(e) if e.is_conflict() => Err(Error::Unavailable {
                    message: format!("{operation} kept conflicting: {e}"),
                }),
                other => other,
            }
        }
        other => other,
    }
}

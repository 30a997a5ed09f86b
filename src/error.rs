//! Row-local error taxonomy. No variant here is ever escalated beyond the
//! row that produced it.
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::model::{EntryId, RowId};

/// The snapshot cannot be transmitted as-is.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("duration is not a number")]
    UnparsableDuration,
    #[error("duration must be finite")]
    InfiniteDuration,
    #[error("duration must not be negative (got {0})")]
    NegativeDuration(f64),
}

/// Any network or backend failure on create, update, delete or list.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("backend returned an unusable identifier: {0:?}")]
    MalformedIdentifier(String),
    #[error("invalid response body: {0}")]
    InvalidBody(String),
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

/// A programming invariant was violated.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("row {row} already carries identifier {existing}")]
    IdentifierAlreadyAssigned { row: RowId, existing: EntryId },
    #[error("row {0} is synced but has no identifier")]
    MissingIdentifier(RowId),
    #[error("row {0} has been removed")]
    RowRemoved(RowId),
    #[error("no row {0} in the registry")]
    UnknownRow(RowId),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    State(#[from] StateError),
}

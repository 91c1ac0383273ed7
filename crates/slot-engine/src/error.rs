//! Error types for slot-engine operations.
//!
//! Validation and lifecycle errors are expected domain outcomes. Store errors
//! are transport/persistence failures and are kept distinct so callers can tell
//! "the request was invalid" apart from "the store could not be reached".

use serde::Serialize;
use thiserror::Error;

use crate::ports::CollaboratorError;
use crate::slot::{SlotId, SlotStatus};

/// An IANA zone identifier that could not be resolved. Recoverable: the
/// operation proceeds in UTC and the caller receives this alongside the value,
/// never as an `Err`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Invalid timezone '{zone}', falling back to UTC")]
pub struct ConfigurationError {
    pub zone: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid slot duration: {minutes} minutes")]
    InvalidDuration { slot: SlotId, minutes: i64 },

    #[error("Slot {slot} overlaps existing slot {conflicting}")]
    Overlap { slot: SlotId, conflicting: SlotId },
}

impl ValidationError {
    /// The candidate slot this rejection refers to.
    pub fn slot(&self) -> &SlotId {
        match self {
            ValidationError::InvalidDuration { slot, .. } => slot,
            ValidationError::Overlap { slot, .. } => slot,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Slot {0} is already booked")]
    AlreadyBooked(SlotId),

    #[error("Slot {0} not found")]
    NotFound(SlotId),

    #[error("Slot {0} is not booked")]
    NotBooked(SlotId),

    /// Released slots are never rebooked in place; a new open slot must be created.
    #[error("Slot {0} has been released and cannot be booked")]
    SlotReleased(SlotId),

    #[error("Slot {0} is booked; deleting it requires cascading cancellation")]
    BookedSlotInGroup(SlotId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation timed out")]
    Timeout,

    #[error("Document {0} not found")]
    NotFound(SlotId),

    /// The conditional write did not apply because the slot's status changed.
    #[error("Precondition failed: expected {expected}, found {current}")]
    PreconditionFailed {
        expected: SlotStatus,
        current: SlotStatus,
    },
}

/// Top-level error returned by facade operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A side effect the operation cannot complete without (meeting creation).
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Recurrence error: {0}")]
    Recurrence(String),

    #[error("Invalid configuration file: {0}")]
    Config(String),
}

impl SchedulingError {
    pub fn is_store_failure(&self) -> bool {
        matches!(self, SchedulingError::Store(_))
    }

    pub fn is_validation_failure(&self) -> bool {
        matches!(self, SchedulingError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, SchedulingError>;

use thiserror::Error;

use reservation::model::{OwnerId, Slot};

/// Expected, recoverable admission rejections. Returned as values inside a
/// successful engine call so the caller can render each one distinctly;
/// storage and transport faults travel separately as opaque errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("unknown resource kind")]
    NotFound,

    #[error("this resource kind is inactive and does not accept new reservations")]
    ResourceInactive,

    #[error("you already hold a reservation for this resource on this date")]
    DuplicateOwnerReservation,

    /// Names the slots held by other owners so the caller can offer the rest.
    #[error("time slots already taken by another reservation: {0:?}")]
    SlotConflict(Vec<Slot>),

    #[error("reserving this resource requires naming at least one time slot")]
    EmptySlotRequest,

    #[error("an observation note is required when reserving time slots")]
    MissingObservation,

    #[error("no remaining capacity for this resource on the requested date")]
    CapacityExceeded { held_by: Option<OwnerId> },

    #[error("a concurrent request claimed this resource first; try another date")]
    RaceLost,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CancellationError {
    #[error("reservation not found")]
    NotFound,

    #[error("only the reservation owner or an administrator may cancel a reservation")]
    Unauthorized,

    #[error("the reservation date has passed and can no longer be cancelled")]
    TooLateToCancel,
}

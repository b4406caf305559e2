//! Shared types of the engine's public surface.

use chrono::NaiveDate;

use reservation::model::{KindId, OwnerId, Reservation, Slot, SlotHolder};

use crate::error::{AdmissionError, CancellationError};

/// The current caller as reported by the identity collaborator. The engine
/// trusts both fields as given.
#[derive(Debug, Clone)]
pub struct Requester {
    pub id: OwnerId,
    pub is_admin: bool,
}

impl Requester {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: OwnerId::new(id),
            is_admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: OwnerId::new(id),
            is_admin: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub kind: KindId,
    pub date: NaiveDate,
    pub owner: OwnerId,

    /// Requested time slots; meaningful only for slotted kinds.
    pub slots: Vec<Slot>,
    pub note: Option<String>,
}

impl AdmissionRequest {
    pub fn whole_day(kind: KindId, date: NaiveDate, owner: impl Into<String>) -> Self {
        Self {
            kind,
            date,
            owner: OwnerId::new(owner),
            slots: vec![],
            note: None,
        }
    }

    pub fn slotted(
        kind: KindId,
        date: NaiveDate,
        owner: impl Into<String>,
        slots: Vec<Slot>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            date,
            owner: OwnerId::new(owner),
            slots,
            note: Some(note.into()),
        }
    }

}

/// Result of an admission attempt. Policy rejections are values, not errors:
/// the caller renders each one distinctly.
#[derive(Debug, Clone)]
pub enum AdmissionOutcome {
    Admitted(Reservation),

    /// Slotted no-op: every requested slot was already held by the
    /// requester. Carries one of the existing reservations.
    AlreadyHeld(Reservation),

    Rejected(AdmissionError),
}

impl AdmissionOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionOutcome::Admitted(_))
    }

    pub fn rejection(&self) -> Option<&AdmissionError> {
        match self {
            AdmissionOutcome::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CancelOutcome {
    Cancelled(Reservation),
    Rejected(CancellationError),
}

impl CancelOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CancelOutcome::Cancelled(_))
    }

    pub fn rejection(&self) -> Option<&CancellationError> {
        match self {
            CancelOutcome::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

/// Utilization of one resource kind on one date. Always a stale read:
/// callers re-query after every change event and never treat a positive
/// `remaining` as a hold.
#[derive(Debug, Clone)]
pub struct Availability {
    pub capacity: u32,
    pub used: u32,
    pub remaining: u32,

    /// Occupied slots with their owners; empty for non-slotted kinds.
    pub occupied_slots: Vec<SlotHolder>,
}

/// Source of "now" in institution-local time, injectable so date policy is
/// testable without wall-clock control.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    fn now_ms(&self) -> i64;
}

pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    fn now_ms(&self) -> i64 {
        chrono::Local::now().timestamp_millis()
    }
}

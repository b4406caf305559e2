use serde::{Deserialize, Serialize};

use reservation::model::KindId;

/// A reservable resource kind and its admission policy. Pure configuration
/// data, mutated only by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceKind {
    pub kind: KindId,

    /// Max concurrent reservations of this kind on one calendar date.
    pub capacity_per_day: u32,

    /// True only for the auditorium, which partitions a day into named
    /// time windows.
    pub is_slotted: bool,

    /// Inactive kinds reject new admissions; existing reservations stay
    /// valid until cancelled or the date passes.
    pub is_active: bool,
}

impl ResourceKind {
    /// Whole-day equipment with a per-date capacity (projectors, speakers).
    pub fn equipment(kind: KindId, capacity_per_day: u32) -> Self {
        Self {
            kind,
            capacity_per_day,
            is_slotted: false,
            is_active: true,
        }
    }

    /// The auditorium: one holder per named slot.
    pub fn slotted(kind: KindId) -> Self {
        Self {
            kind,
            capacity_per_day: 1,
            is_slotted: true,
            is_active: true,
        }
    }

    /// A laboratory: exclusive per date, registered dynamically.
    pub fn laboratory(code: &str) -> Self {
        Self {
            kind: KindId::laboratory(code),
            capacity_per_day: 1,
            is_slotted: false,
            is_active: true,
        }
    }

    /// Exclusive kinds admit a single reservation per date, enforced by a
    /// dedicated storage-layer unique index rather than the capacity guard
    /// alone.
    pub fn is_exclusive(&self) -> bool {
        !self.is_slotted && self.capacity_per_day == 1
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type ReservationId = uuid::Uuid;

/// Identifier of a reservable resource kind.
///
/// Well-known ids are `projector`, `speaker` and `auditorium`; laboratories
/// are registered dynamically under `laboratory:<code>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KindId(String);

impl KindId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn projector() -> Self {
        Self::new("projector")
    }

    pub fn speaker() -> Self {
        Self::new("speaker")
    }

    pub fn auditorium() -> Self {
        Self::new("auditorium")
    }

    pub fn laboratory(code: &str) -> Self {
        Self::new(format!("laboratory:{code}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of the user owning a reservation, as reported by the identity
/// collaborator. Opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named sub-day window of the auditorium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Morning,
    Afternoon,
    Evening,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Slot::Morning => "morning",
            Slot::Afternoon => "afternoon",
            Slot::Evening => "evening",
        };
        f.write_str(s)
    }
}

impl FromStr for Slot {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning" => Ok(Slot::Morning),
            "afternoon" => Ok(Slot::Afternoon),
            "evening" => Ok(Slot::Evening),
            other => Err(anyhow::anyhow!("Invalid Slot value: {}", other)),
        }
    }
}

/// One admitted reservation. Append-mostly: rows are created by admission and
/// removed by cancellation or cascading kind deletion, never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub kind: KindId,

    /// Calendar date in institution-local time. Serialized `YYYY-MM-DD`,
    /// never shifted through UTC.
    pub date: NaiveDate,
    pub owner: OwnerId,

    /// Populated only for slotted kinds (the auditorium).
    pub slots: Vec<Slot>,
    pub note: Option<String>,

    /// Server wall clock at admission, for display ordering only. Races are
    /// resolved by insert commit order, never by comparing timestamps.
    pub created_at_ms: i64,

    /// Local calendar date the booking was made; input to the weekend
    /// cancellation grace rule.
    pub booked_on: NaiveDate,
}

/// Occupancy of a single auditorium slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotHolder {
    pub slot: Slot,
    pub owner: OwnerId,
}

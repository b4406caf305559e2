pub mod sqlite_store;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{KindId, OwnerId, Reservation, ReservationId, SlotHolder};

/// Insert failures the caller is expected to handle. Anything else is a
/// storage/transport fault and propagates as `Db`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A storage-layer uniqueness invariant rejected the insert: a concurrent
    /// request committed first for the same key. The sole race signal.
    #[error("a concurrent reservation committed first for this resource and date")]
    RaceLost,

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Persistence boundary for reservations.
///
/// The store, not the caller, owns the concurrency invariants: the two insert
/// operations are atomic at the storage layer, and a rejected insert leaves
/// no partial rows behind.
#[async_trait::async_trait]
pub trait ReservationStore: Send + Sync {
    /// Insert a whole-day reservation, guarded so that at most `capacity`
    /// rows can exist for `(kind, date)`, at most one per owner, and at most
    /// one in total when `exclusive` is set.
    async fn insert_bounded(
        &self,
        reservation: &Reservation,
        capacity: u32,
        exclusive: bool,
    ) -> Result<(), StoreError>;

    /// Insert a slotted reservation plus one slot-assignment row per slot,
    /// all-or-nothing: any slot already taken rolls the whole request back.
    async fn insert_slotted(&self, reservation: &Reservation) -> Result<(), StoreError>;

    async fn get(&self, id: ReservationId) -> anyhow::Result<Option<Reservation>>;

    /// Remove a reservation and its slot assignments. Returns whether a row
    /// existed, so callers can report a second delete as not-found.
    async fn delete(&self, id: ReservationId) -> anyhow::Result<bool>;

    async fn count_for(&self, kind: &KindId, date: NaiveDate) -> anyhow::Result<u32>;

    /// Occupied auditorium slots for a date, with their owners.
    async fn slot_holders(&self, kind: &KindId, date: NaiveDate)
    -> anyhow::Result<Vec<SlotHolder>>;

    /// Whether `owner` already holds a whole-day reservation of this kind on
    /// this date.
    async fn owner_holds(
        &self,
        kind: &KindId,
        date: NaiveDate,
        owner: &OwnerId,
    ) -> anyhow::Result<bool>;

    /// Owners holding reservations for `(kind, date)`, oldest first.
    async fn holders_for(&self, kind: &KindId, date: NaiveDate) -> anyhow::Result<Vec<OwnerId>>;

    /// Every reservation `owner` holds for `(kind, date)`; used by the
    /// slotted no-op path to report the already-held reservation.
    async fn find_owner_day(
        &self,
        kind: &KindId,
        date: NaiveDate,
        owner: &OwnerId,
    ) -> anyhow::Result<Vec<Reservation>>;

    async fn list_for_owner(&self, owner: &OwnerId) -> anyhow::Result<Vec<Reservation>>;

    /// Purge reservations of a kind dated `on_or_after` or later; past rows
    /// are retained for audit. Returns how many rows were removed.
    async fn delete_future_for_kind(
        &self,
        kind: &KindId,
        on_or_after: NaiveDate,
    ) -> anyhow::Result<u64>;
}

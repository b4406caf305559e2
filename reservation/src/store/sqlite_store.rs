//! SqliteReservationStore
//! ----------------------
//! SQLite-backed implementation of the `ReservationStore` trait. Besides
//! durable persistence it carries the concurrency invariants of the whole
//! engine: the schema declares uniqueness at the storage layer so that a race
//! between two admission checks is caught at commit, not silently
//! double-admitted.
//!
//! Declared invariants:
//!
//!  - one whole-day reservation per `(kind, date, owner)` (partial index over
//!    non-slotted rows)
//!  - one reservation per `(kind, date)` for exclusive kinds (laboratories)
//!  - one holder per `(kind, date, slot)` (slot-assignment primary key)
//!  - a capacity guard folded into the whole-day insert statement
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{ReservationStore, StoreError};
use crate::model::{KindId, OwnerId, Reservation, ReservationId, Slot, SlotHolder};

pub struct SqliteReservationStore {
    pool: SqlitePool,
}

impl SqliteReservationStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and ensure the schema exists.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(url).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS reservations (
  id TEXT PRIMARY KEY,
  kind TEXT NOT NULL,
  date TEXT NOT NULL,
  owner_id TEXT NOT NULL,
  note TEXT,
  slotted INTEGER NOT NULL CHECK (slotted IN (0,1)),
  exclusive INTEGER NOT NULL CHECK (exclusive IN (0,1)),
  created_at_ms BIGINT NOT NULL,
  booked_on TEXT NOT NULL
);
"#,
        )
        .execute(pool)
        .await?;

        // An owner may hold one whole-day reservation per kind and date;
        // slotted rows are exempt (several slot bookings may coexist).
        sqlx::query(
            r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_reservations_owner_day
ON reservations(kind, date, owner_id) WHERE slotted = 0;
"#,
        )
        .execute(pool)
        .await?;

        // Exclusive kinds (laboratories) admit a single holder per date.
        sqlx::query(
            r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_reservations_exclusive_day
ON reservations(kind, date) WHERE exclusive = 1;
"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_reservations_kind_date ON reservations(kind, date);"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
CREATE TABLE IF NOT EXISTS slot_assignments (
  kind TEXT NOT NULL,
  date TEXT NOT NULL,
  slot TEXT NOT NULL,
  reservation_id TEXT NOT NULL,
  PRIMARY KEY (kind, date, slot)
);
"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE INDEX IF NOT EXISTS idx_slot_assignments_res ON slot_assignments(reservation_id);"#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn load_slots(&self, id: ReservationId) -> anyhow::Result<Vec<Slot>> {
        let rows = sqlx::query("SELECT slot FROM slot_assignments WHERE reservation_id = ?")
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut slots = Vec::with_capacity(rows.len());
        for row in rows {
            let s: String = row.get("slot");
            slots.push(Slot::from_str(&s)?);
        }
        Ok(slots)
    }
}

fn map_insert_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::RaceLost;
        }
    }
    StoreError::Db(e)
}

fn row_to_reservation(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Reservation> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)?;

    Ok(Reservation {
        id,
        kind: KindId::new(row.get::<String, _>("kind")),
        date: row.get::<NaiveDate, _>("date"),
        owner: OwnerId::new(row.get::<String, _>("owner_id")),
        slots: Vec::new(),
        note: row.get::<Option<String>, _>("note"),
        created_at_ms: row.get::<i64, _>("created_at_ms"),
        booked_on: row.get::<NaiveDate, _>("booked_on"),
    })
}

#[async_trait]
impl ReservationStore for SqliteReservationStore {
    /// The capacity check and the insert execute as one statement, so the
    /// storage layer is the arbiter of "who got the last seat". Zero rows
    /// written, or a unique-index violation, both mean a concurrent request
    /// won.
    async fn insert_bounded(
        &self,
        reservation: &Reservation,
        capacity: u32,
        exclusive: bool,
    ) -> Result<(), StoreError> {
        let done = sqlx::query(
            r#"
INSERT INTO reservations (id, kind, date, owner_id, note, slotted, exclusive, created_at_ms, booked_on)
SELECT ?, ?, ?, ?, ?, 0, ?, ?, ?
WHERE (SELECT COUNT(*) FROM reservations WHERE kind = ? AND date = ?) < ?;
"#,
        )
        .bind(reservation.id.to_string())
        .bind(reservation.kind.as_str())
        .bind(reservation.date)
        .bind(reservation.owner.as_str())
        .bind(&reservation.note)
        .bind(exclusive)
        .bind(reservation.created_at_ms)
        .bind(reservation.booked_on)
        .bind(reservation.kind.as_str())
        .bind(reservation.date)
        .bind(capacity as i64)
        .execute(&self.pool)
        .await
        .map_err(map_insert_err)?;

        if done.rows_affected() == 0 {
            return Err(StoreError::RaceLost);
        }
        Ok(())
    }

    async fn insert_slotted(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::Db)?;

        sqlx::query(
            r#"
INSERT INTO reservations (id, kind, date, owner_id, note, slotted, exclusive, created_at_ms, booked_on)
VALUES (?, ?, ?, ?, ?, 1, 0, ?, ?);
"#,
        )
        .bind(reservation.id.to_string())
        .bind(reservation.kind.as_str())
        .bind(reservation.date)
        .bind(reservation.owner.as_str())
        .bind(&reservation.note)
        .bind(reservation.created_at_ms)
        .bind(reservation.booked_on)
        .execute(&mut *tx)
        .await
        .map_err(map_insert_err)?;

        for slot in &reservation.slots {
            // Dropping the transaction on error rolls every row back; a slot
            // request is admitted whole or not at all.
            sqlx::query(
                r#"INSERT INTO slot_assignments (kind, date, slot, reservation_id) VALUES (?, ?, ?, ?);"#,
            )
            .bind(reservation.kind.as_str())
            .bind(reservation.date)
            .bind(slot.to_string())
            .bind(reservation.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(map_insert_err)?;
        }

        tx.commit().await.map_err(StoreError::Db)?;
        Ok(())
    }

    async fn get(&self, id: ReservationId) -> anyhow::Result<Option<Reservation>> {
        let row = sqlx::query("SELECT * FROM reservations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut reservation = row_to_reservation(&row)?;
                if row.get::<bool, _>("slotted") {
                    reservation.slots = self.load_slots(id).await?;
                }
                Ok(Some(reservation))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, id: ReservationId) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM slot_assignments WHERE reservation_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        let done = sqlx::query("DELETE FROM reservations WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(done.rows_affected() > 0)
    }

    async fn count_for(&self, kind: &KindId, date: NaiveDate) -> anyhow::Result<u32> {
        let row =
            sqlx::query("SELECT COUNT(*) AS cnt FROM reservations WHERE kind = ? AND date = ?")
                .bind(kind.as_str())
                .bind(date)
                .fetch_one(&self.pool)
                .await?;

        Ok(row.get::<i64, _>("cnt") as u32)
    }

    async fn slot_holders(
        &self,
        kind: &KindId,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<SlotHolder>> {
        let rows = sqlx::query(
            r#"
SELECT sa.slot AS slot, r.owner_id AS owner_id
FROM slot_assignments sa
JOIN reservations r ON r.id = sa.reservation_id
WHERE sa.kind = ? AND sa.date = ?
ORDER BY sa.slot;
"#,
        )
        .bind(kind.as_str())
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let mut holders = Vec::with_capacity(rows.len());
        for row in rows {
            let slot: String = row.get("slot");
            holders.push(SlotHolder {
                slot: Slot::from_str(&slot)?,
                owner: OwnerId::new(row.get::<String, _>("owner_id")),
            });
        }
        Ok(holders)
    }

    async fn owner_holds(
        &self,
        kind: &KindId,
        date: NaiveDate,
        owner: &OwnerId,
    ) -> anyhow::Result<bool> {
        let row = sqlx::query(
            "SELECT id FROM reservations WHERE kind = ? AND date = ? AND owner_id = ? LIMIT 1",
        )
        .bind(kind.as_str())
        .bind(date)
        .bind(owner.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn holders_for(&self, kind: &KindId, date: NaiveDate) -> anyhow::Result<Vec<OwnerId>> {
        let rows = sqlx::query(
            "SELECT owner_id FROM reservations WHERE kind = ? AND date = ? ORDER BY created_at_ms",
        )
        .bind(kind.as_str())
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| OwnerId::new(row.get::<String, _>("owner_id")))
            .collect())
    }

    async fn find_owner_day(
        &self,
        kind: &KindId,
        date: NaiveDate,
        owner: &OwnerId,
    ) -> anyhow::Result<Vec<Reservation>> {
        let rows = sqlx::query(
            r#"
SELECT * FROM reservations
WHERE kind = ? AND date = ? AND owner_id = ?
ORDER BY created_at_ms;
"#,
        )
        .bind(kind.as_str())
        .bind(date)
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut reservations = Vec::with_capacity(rows.len());
        for row in rows {
            let mut reservation = row_to_reservation(&row)?;
            if row.get::<bool, _>("slotted") {
                reservation.slots = self.load_slots(reservation.id).await?;
            }
            reservations.push(reservation);
        }
        Ok(reservations)
    }

    async fn list_for_owner(&self, owner: &OwnerId) -> anyhow::Result<Vec<Reservation>> {
        let rows = sqlx::query(
            "SELECT * FROM reservations WHERE owner_id = ? ORDER BY date, created_at_ms",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut reservations = Vec::with_capacity(rows.len());
        for row in rows {
            let mut reservation = row_to_reservation(&row)?;
            if row.get::<bool, _>("slotted") {
                reservation.slots = self.load_slots(reservation.id).await?;
            }
            reservations.push(reservation);
        }
        Ok(reservations)
    }

    async fn delete_future_for_kind(
        &self,
        kind: &KindId,
        on_or_after: NaiveDate,
    ) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM slot_assignments WHERE kind = ? AND date >= ?")
            .bind(kind.as_str())
            .bind(on_or_after)
            .execute(&mut *tx)
            .await?;

        let done = sqlx::query("DELETE FROM reservations WHERE kind = ? AND date >= ?")
            .bind(kind.as_str())
            .bind(on_or_after)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(done.rows_affected())
    }
}

//! The admission controller.
//!
//! Validates a request against policy and current utilization, then inserts
//! through the store's guarded/constrained paths. The pre-checks give callers
//! precise rejections; the storage layer gives correctness. A race that slips
//! past every pre-check is caught at commit and surfaced as `RaceLost`.

use std::sync::Arc;

use anyhow::Context;
use uuid::Uuid;

use catalog::model::ResourceKind;
use catalog::service::CatalogService;
use catalog::store::CatalogStore;
use notify::{ChangeNotifier, Table};
use reservation::model::{OwnerId, Reservation, Slot};
use reservation::store::{ReservationStore, StoreError};

use crate::error::AdmissionError;
use crate::notification::{Action, NotificationSink, deliver_best_effort};
use crate::types::{AdmissionOutcome, AdmissionRequest, Clock};

pub struct AdmissionController<C: CatalogStore, R: ReservationStore> {
    catalog: Arc<CatalogService<C, R>>,
    reservations: Arc<R>,
    notifier: ChangeNotifier,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl<C, R> AdmissionController<C, R>
where
    C: CatalogStore + 'static,
    R: ReservationStore + 'static,
{
    pub fn new(
        catalog: Arc<CatalogService<C, R>>,
        reservations: Arc<R>,
        notifier: ChangeNotifier,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            reservations,
            notifier,
            sink,
            clock,
        }
    }

    /// Validate and commit one reservation request. First violated rule wins.
    pub async fn admit(&self, req: AdmissionRequest) -> anyhow::Result<AdmissionOutcome> {
        let Some(policy) = self.catalog.policy(&req.kind).await? else {
            return Ok(AdmissionOutcome::Rejected(AdmissionError::NotFound));
        };
        if !policy.is_active {
            return Ok(AdmissionOutcome::Rejected(AdmissionError::ResourceInactive));
        }

        if policy.is_slotted {
            self.admit_slotted(req).await
        } else {
            self.admit_whole_day(req, &policy).await
        }
    }

    async fn admit_whole_day(
        &self,
        req: AdmissionRequest,
        policy: &ResourceKind,
    ) -> anyhow::Result<AdmissionOutcome> {
        if self
            .reservations
            .owner_holds(&req.kind, req.date, &req.owner)
            .await?
        {
            return Ok(AdmissionOutcome::Rejected(
                AdmissionError::DuplicateOwnerReservation,
            ));
        }

        let used = self.reservations.count_for(&req.kind, req.date).await?;
        if used >= policy.capacity_per_day {
            let held_by = self.single_holder(&req, policy).await?;
            return Ok(AdmissionOutcome::Rejected(AdmissionError::CapacityExceeded {
                held_by,
            }));
        }

        let reservation = self.build(&req, Vec::new());
        match self
            .reservations
            .insert_bounded(&reservation, policy.capacity_per_day, policy.is_exclusive())
            .await
        {
            Ok(()) => {
                self.committed(&reservation);
                Ok(AdmissionOutcome::Admitted(reservation))
            }
            Err(StoreError::RaceLost) => {
                tracing::debug!(
                    kind = %req.kind,
                    date = %req.date,
                    owner = %req.owner,
                    "whole-day insert lost a concurrent race"
                );
                Ok(AdmissionOutcome::Rejected(AdmissionError::RaceLost))
            }
            Err(StoreError::Db(e)) => Err(e.into()),
        }
    }

    async fn admit_slotted(&self, req: AdmissionRequest) -> anyhow::Result<AdmissionOutcome> {
        if req.slots.is_empty() {
            return Ok(AdmissionOutcome::Rejected(AdmissionError::EmptySlotRequest));
        }

        let holders = self.reservations.slot_holders(&req.kind, req.date).await?;

        // Slots already ours drop out of the request; slots held by anyone
        // else conflict. What remains is what we would actually book.
        let mut wanted: Vec<Slot> = Vec::new();
        let mut conflicts: Vec<Slot> = Vec::new();
        for slot in &req.slots {
            if wanted.contains(slot) || conflicts.contains(slot) {
                continue;
            }
            match holders.iter().find(|h| h.slot == *slot) {
                Some(h) if h.owner == req.owner => {}
                Some(_) => conflicts.push(*slot),
                None => wanted.push(*slot),
            }
        }

        if !conflicts.is_empty() {
            return Ok(AdmissionOutcome::Rejected(AdmissionError::SlotConflict(
                conflicts,
            )));
        }

        if wanted.is_empty() {
            let mine = self
                .reservations
                .find_owner_day(&req.kind, req.date, &req.owner)
                .await?;
            let existing = mine
                .into_iter()
                .find(|r| r.slots.iter().any(|s| req.slots.contains(s)))
                .context("slot assignment exists without a backing reservation")?;
            return Ok(AdmissionOutcome::AlreadyHeld(existing));
        }

        match req.note.as_deref() {
            Some(note) if !note.trim().is_empty() => {}
            _ => {
                return Ok(AdmissionOutcome::Rejected(AdmissionError::MissingObservation));
            }
        }

        let reservation = self.build(&req, wanted);
        match self.reservations.insert_slotted(&reservation).await {
            Ok(()) => {
                self.committed(&reservation);
                Ok(AdmissionOutcome::Admitted(reservation))
            }
            Err(StoreError::RaceLost) => {
                tracing::debug!(
                    kind = %req.kind,
                    date = %req.date,
                    owner = %req.owner,
                    "slotted insert lost a concurrent race"
                );
                Ok(AdmissionOutcome::Rejected(AdmissionError::RaceLost))
            }
            Err(StoreError::Db(e)) => Err(e.into()),
        }
    }

    /// Name the current holder when the kind admits a single reservation per
    /// date; with larger capacities there is no single owner to blame.
    async fn single_holder(
        &self,
        req: &AdmissionRequest,
        policy: &ResourceKind,
    ) -> anyhow::Result<Option<OwnerId>> {
        if policy.capacity_per_day != 1 {
            return Ok(None);
        }
        Ok(self
            .reservations
            .holders_for(&req.kind, req.date)
            .await?
            .into_iter()
            .next())
    }

    fn build(&self, req: &AdmissionRequest, slots: Vec<Slot>) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            kind: req.kind.clone(),
            date: req.date,
            owner: req.owner.clone(),
            slots,
            note: req.note.clone(),
            created_at_ms: self.clock.now_ms(),
            booked_on: self.clock.today(),
        }
    }

    fn committed(&self, reservation: &Reservation) {
        tracing::info!(
            reservation_id = %reservation.id,
            kind = %reservation.kind,
            date = %reservation.date,
            owner = %reservation.owner,
            "reservation admitted"
        );
        self.notifier.publish(Table::Reservations);
        deliver_best_effort(self.sink.clone(), reservation.clone(), Action::Created);
    }
}

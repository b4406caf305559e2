//! Read side of the engine.
//!
//! Computes current utilization from the reservation rows. Deliberately
//! side-effect free, and deliberately a stale read: callers re-invoke it
//! after every change event and before every admission attempt, and the
//! admission path re-validates at commit regardless of what this reported.

use std::sync::Arc;

use chrono::NaiveDate;

use catalog::service::CatalogService;
use catalog::store::CatalogStore;
use reservation::model::KindId;
use reservation::store::ReservationStore;

use crate::types::Availability;

pub struct AvailabilityQuery<C: CatalogStore, R: ReservationStore> {
    catalog: Arc<CatalogService<C, R>>,
    reservations: Arc<R>,
}

impl<C, R> AvailabilityQuery<C, R>
where
    C: CatalogStore + 'static,
    R: ReservationStore + 'static,
{
    pub fn new(catalog: Arc<CatalogService<C, R>>, reservations: Arc<R>) -> Self {
        Self {
            catalog,
            reservations,
        }
    }

    /// Utilization of `kind` on `date`. `None` when the kind is not in the
    /// catalog. Past dates are allowed and simply report historical usage.
    pub async fn availability(
        &self,
        kind: &KindId,
        date: NaiveDate,
    ) -> anyhow::Result<Option<Availability>> {
        let Some(policy) = self.catalog.policy(kind).await? else {
            return Ok(None);
        };

        let used = self.reservations.count_for(kind, date).await?;
        let occupied_slots = if policy.is_slotted {
            self.reservations.slot_holders(kind, date).await?
        } else {
            Vec::new()
        };

        Ok(Some(Availability {
            capacity: policy.capacity_per_day,
            used,
            remaining: policy.capacity_per_day.saturating_sub(used),
            occupied_slots,
        }))
    }
}

//! Cancellation: authorization, the temporal rule, and the weekend grace
//! window. The date policy is a pure function so the boundary cases are
//! testable without wall-clock control.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};

use notify::{ChangeNotifier, Table};
use reservation::model::{Reservation, ReservationId};
use reservation::store::ReservationStore;

use crate::error::CancellationError;
use crate::notification::{Action, NotificationSink, deliver_best_effort};
use crate::types::{CancelOutcome, Clock, Requester};

/// Days past a Monday reservation date during which a weekend-made booking
/// stays cancellable (through Wednesday). Policy constant, pending
/// confirmation with the system owner.
pub const WEEKEND_GRACE_DAYS: i64 = 2;

/// Whether a reservation may still be cancelled on `today`.
///
/// Base rule: anything dated today or later is cancellable. Carve-out: a
/// Monday reservation booked on the immediately preceding Saturday or Sunday
/// stays cancellable through the Wednesday of that week, because Monday was
/// already the weekend booking's first actionable date.
pub fn cancellable_on(date: NaiveDate, booked_on: NaiveDate, today: NaiveDate) -> bool {
    if date >= today {
        return true;
    }
    weekend_grace_applies(date, booked_on, today)
}

fn weekend_grace_applies(date: NaiveDate, booked_on: NaiveDate, today: NaiveDate) -> bool {
    if date.weekday() != Weekday::Mon {
        return false;
    }

    let lead_days = date.signed_duration_since(booked_on).num_days();
    let booked_on_preceding_weekend =
        matches!(booked_on.weekday(), Weekday::Sat | Weekday::Sun) && (1..=2).contains(&lead_days);

    booked_on_preceding_weekend
        && today.signed_duration_since(date).num_days() <= WEEKEND_GRACE_DAYS
}

pub struct CancellationService<R: ReservationStore> {
    reservations: Arc<R>,
    notifier: ChangeNotifier,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl<R: ReservationStore + 'static> CancellationService<R> {
    pub fn new(
        reservations: Arc<R>,
        notifier: ChangeNotifier,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reservations,
            notifier,
            sink,
            clock,
        }
    }

    pub async fn cancel(
        &self,
        id: ReservationId,
        requester: &Requester,
    ) -> anyhow::Result<CancelOutcome> {
        let Some(reservation) = self.reservations.get(id).await? else {
            return Ok(CancelOutcome::Rejected(CancellationError::NotFound));
        };

        if !requester.is_admin && requester.id != reservation.owner {
            return Ok(CancelOutcome::Rejected(CancellationError::Unauthorized));
        }

        // Admins may also clean up reservations whose date has passed.
        if !requester.is_admin
            && !cancellable_on(reservation.date, reservation.booked_on, self.clock.today())
        {
            return Ok(CancelOutcome::Rejected(CancellationError::TooLateToCancel));
        }

        self.remove(reservation).await
    }

    /// Administrative override: no ownership or temporal gating.
    pub async fn admin_cancel(&self, id: ReservationId) -> anyhow::Result<CancelOutcome> {
        let Some(reservation) = self.reservations.get(id).await? else {
            return Ok(CancelOutcome::Rejected(CancellationError::NotFound));
        };
        self.remove(reservation).await
    }

    async fn remove(&self, reservation: Reservation) -> anyhow::Result<CancelOutcome> {
        let removed = self.reservations.delete(reservation.id).await?;
        if !removed {
            // A concurrent cancellation got there first; capacity was freed
            // exactly once.
            return Ok(CancelOutcome::Rejected(CancellationError::NotFound));
        }

        tracing::info!(
            reservation_id = %reservation.id,
            kind = %reservation.kind,
            date = %reservation.date,
            owner = %reservation.owner,
            "reservation cancelled"
        );
        self.notifier.publish(Table::Reservations);
        deliver_best_effort(self.sink.clone(), reservation.clone(), Action::Cancelled);

        Ok(CancelOutcome::Cancelled(reservation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // 2025-03-10 is a Monday; 03-08/03-09 the preceding weekend.

    #[test]
    fn future_and_today_are_cancellable() {
        let today = date(2025, 3, 10);

        assert!(cancellable_on(date(2025, 3, 10), date(2025, 3, 1), today));
        assert!(cancellable_on(date(2025, 3, 24), date(2025, 3, 1), today));
    }

    #[test]
    fn yesterday_is_not_cancellable() {
        let today = date(2025, 3, 10);

        assert!(!cancellable_on(date(2025, 3, 9), date(2025, 3, 1), today));
    }

    #[test]
    fn weekend_booked_monday_stays_cancellable_through_wednesday() {
        let monday = date(2025, 3, 10);

        for booked_on in [date(2025, 3, 8), date(2025, 3, 9)] {
            assert!(cancellable_on(monday, booked_on, date(2025, 3, 11))); // Tue
            assert!(cancellable_on(monday, booked_on, date(2025, 3, 12))); // Wed
            assert!(!cancellable_on(monday, booked_on, date(2025, 3, 13))); // Thu
        }
    }

    #[test]
    fn weekday_booked_monday_gets_no_grace() {
        let monday = date(2025, 3, 10);
        let friday = date(2025, 3, 7);

        assert!(!cancellable_on(monday, friday, date(2025, 3, 11)));
    }

    #[test]
    fn grace_never_applies_to_non_monday_dates() {
        let tuesday = date(2025, 3, 11);
        let sunday = date(2025, 3, 9);

        assert!(!cancellable_on(tuesday, sunday, date(2025, 3, 12)));
    }

    #[test]
    fn grace_requires_the_immediately_preceding_weekend() {
        let monday = date(2025, 3, 10);
        let week_before_sunday = date(2025, 3, 2);

        assert!(!cancellable_on(monday, week_before_sunday, date(2025, 3, 11)));
    }
}

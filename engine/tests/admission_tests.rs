use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use catalog::model::ResourceKind;
use engine::engine::ReservationEngine;
use engine::error::AdmissionError;
use engine::notification::Action;
use engine::retry::RetryPolicy;
use engine::types::{AdmissionOutcome, AdmissionRequest};
use reservation::model::{KindId, OwnerId, Slot};

use mock_store::{FailingSink, FixedClock, InMemoryCatalogStore, InMemoryReservationStore, RecordingSink};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

struct Harness {
    engine: ReservationEngine<InMemoryCatalogStore, InMemoryReservationStore>,
    reservations: Arc<InMemoryReservationStore>,
    sink: Arc<RecordingSink>,
}

fn harness() -> Harness {
    let catalog_store = Arc::new(InMemoryCatalogStore::default());
    let reservations = Arc::new(InMemoryReservationStore::default());
    let sink = Arc::new(RecordingSink::default());
    let clock = Arc::new(FixedClock::on(date(2025, 3, 1)));

    let engine = ReservationEngine::new(
        catalog_store,
        reservations.clone(),
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        },
        16,
        clock,
        sink.clone(),
    );

    Harness {
        engine,
        reservations,
        sink,
    }
}

#[tokio::test]
async fn unknown_kind_is_rejected_as_not_found() -> anyhow::Result<()> {
    let h = harness();

    let outcome = h
        .engine
        .admit(AdmissionRequest::whole_day(
            KindId::new("hologram"),
            date(2025, 3, 10),
            "u1",
        ))
        .await?;

    assert_eq!(outcome.rejection(), Some(&AdmissionError::NotFound));
    Ok(())
}

#[tokio::test]
async fn inactive_kind_rejects_new_admissions() -> anyhow::Result<()> {
    let h = harness();
    h.engine.define_kind(ResourceKind::equipment(KindId::projector(), 4)).await?;
    h.engine.set_kind_active(&KindId::projector(), false).await?;

    let outcome = h
        .engine
        .admit(AdmissionRequest::whole_day(KindId::projector(), date(2025, 3, 10), "u1"))
        .await?;

    assert_eq!(outcome.rejection(), Some(&AdmissionError::ResourceInactive));
    Ok(())
}

#[tokio::test]
async fn owner_cannot_hold_the_same_kind_twice_on_one_date() -> anyhow::Result<()> {
    let h = harness();
    h.engine.define_kind(ResourceKind::equipment(KindId::projector(), 4)).await?;
    let on = date(2025, 3, 10);

    let first = h
        .engine
        .admit(AdmissionRequest::whole_day(KindId::projector(), on, "u1"))
        .await?;
    assert!(first.is_admitted());

    let second = h
        .engine
        .admit(AdmissionRequest::whole_day(KindId::projector(), on, "u1"))
        .await?;
    assert_eq!(
        second.rejection(),
        Some(&AdmissionError::DuplicateOwnerReservation)
    );

    // A different date is fine.
    let other_day = h
        .engine
        .admit(AdmissionRequest::whole_day(KindId::projector(), date(2025, 3, 11), "u1"))
        .await?;
    assert!(other_day.is_admitted());

    Ok(())
}

#[tokio::test]
async fn capacity_is_enforced_per_kind_and_date() -> anyhow::Result<()> {
    let h = harness();
    h.engine.define_kind(ResourceKind::equipment(KindId::speaker(), 2)).await?;
    let on = date(2025, 3, 10);

    for owner in ["u1", "u2"] {
        let outcome = h
            .engine
            .admit(AdmissionRequest::whole_day(KindId::speaker(), on, owner))
            .await?;
        assert!(outcome.is_admitted());
    }

    let third = h
        .engine
        .admit(AdmissionRequest::whole_day(KindId::speaker(), on, "u3"))
        .await?;
    assert!(matches!(
        third.rejection(),
        Some(AdmissionError::CapacityExceeded { .. })
    ));

    Ok(())
}

#[tokio::test]
async fn three_owners_racing_for_two_seats_admit_exactly_two() -> anyhow::Result<()> {
    let h = harness();
    h.engine.define_kind(ResourceKind::equipment(KindId::projector(), 2)).await?;
    let on = date(2025, 3, 10);

    let (a, b, c) = tokio::join!(
        h.engine.admit(AdmissionRequest::whole_day(KindId::projector(), on, "u1")),
        h.engine.admit(AdmissionRequest::whole_day(KindId::projector(), on, "u2")),
        h.engine.admit(AdmissionRequest::whole_day(KindId::projector(), on, "u3")),
    );

    let outcomes = [a?, b?, c?];
    let admitted = outcomes.iter().filter(|o| o.is_admitted()).count();
    let rejected = outcomes
        .iter()
        .filter(|o| {
            matches!(
                o.rejection(),
                Some(AdmissionError::CapacityExceeded { .. }) | Some(AdmissionError::RaceLost)
            )
        })
        .count();

    assert_eq!(admitted, 2);
    assert_eq!(rejected, 1);
    assert_eq!(h.reservations.rows.lock().await.len(), 2);

    Ok(())
}

#[tokio::test]
async fn availability_reflects_an_admission_immediately() -> anyhow::Result<()> {
    let h = harness();
    h.engine.define_kind(ResourceKind::equipment(KindId::projector(), 4)).await?;
    let on = date(2025, 3, 10);

    let before = h.engine.availability(&KindId::projector(), on).await?.unwrap();
    assert_eq!((before.used, before.remaining), (0, 4));

    h.engine
        .admit(AdmissionRequest::whole_day(KindId::projector(), on, "u1"))
        .await?;

    let after = h.engine.availability(&KindId::projector(), on).await?.unwrap();
    assert_eq!((after.used, after.remaining), (1, 3));

    Ok(())
}

#[tokio::test]
async fn slot_requests_are_all_or_nothing() -> anyhow::Result<()> {
    let h = harness();
    h.engine.define_kind(ResourceKind::slotted(KindId::auditorium())).await?;
    let on = date(2025, 3, 10);

    let alice = h
        .engine
        .admit(AdmissionRequest::slotted(
            KindId::auditorium(),
            on,
            "alice",
            vec![Slot::Morning],
            "department assembly",
        ))
        .await?;
    assert!(alice.is_admitted());

    // Bob wants morning + afternoon; morning is taken, so nothing lands.
    let bob = h
        .engine
        .admit(AdmissionRequest::slotted(
            KindId::auditorium(),
            on,
            "bob",
            vec![Slot::Morning, Slot::Afternoon],
            "thesis defense",
        ))
        .await?;
    assert_eq!(
        bob.rejection(),
        Some(&AdmissionError::SlotConflict(vec![Slot::Morning]))
    );

    let avail = h.engine.availability(&KindId::auditorium(), on).await?.unwrap();
    assert_eq!(avail.occupied_slots.len(), 1);
    assert_eq!(avail.occupied_slots[0].owner, OwnerId::new("alice"));

    Ok(())
}

#[tokio::test]
async fn re_requesting_a_held_slot_is_a_noop() -> anyhow::Result<()> {
    let h = harness();
    h.engine.define_kind(ResourceKind::slotted(KindId::auditorium())).await?;
    let on = date(2025, 3, 10);

    h.engine
        .admit(AdmissionRequest::slotted(
            KindId::auditorium(),
            on,
            "alice",
            vec![Slot::Morning],
            "department assembly",
        ))
        .await?;

    let again = h
        .engine
        .admit(AdmissionRequest::slotted(
            KindId::auditorium(),
            on,
            "alice",
            vec![Slot::Morning],
            "department assembly",
        ))
        .await?;

    assert!(matches!(again, AdmissionOutcome::AlreadyHeld(_)));
    assert_eq!(h.reservations.rows.lock().await.len(), 1);

    Ok(())
}

#[tokio::test]
async fn owner_may_extend_a_date_with_further_slots() -> anyhow::Result<()> {
    let h = harness();
    h.engine.define_kind(ResourceKind::slotted(KindId::auditorium())).await?;
    let on = date(2025, 3, 10);

    h.engine
        .admit(AdmissionRequest::slotted(
            KindId::auditorium(),
            on,
            "alice",
            vec![Slot::Morning],
            "department assembly",
        ))
        .await?;

    // Morning is already hers and drops out; only evening is booked anew.
    let extended = h
        .engine
        .admit(AdmissionRequest::slotted(
            KindId::auditorium(),
            on,
            "alice",
            vec![Slot::Morning, Slot::Evening],
            "evening rehearsal",
        ))
        .await?;

    match extended {
        AdmissionOutcome::Admitted(r) => assert_eq!(r.slots, vec![Slot::Evening]),
        other => panic!("expected admission, got {other:?}"),
    }

    let avail = h.engine.availability(&KindId::auditorium(), on).await?.unwrap();
    assert_eq!(avail.occupied_slots.len(), 2);

    Ok(())
}

#[tokio::test]
async fn slotted_requests_need_slots_and_a_note() -> anyhow::Result<()> {
    let h = harness();
    h.engine.define_kind(ResourceKind::slotted(KindId::auditorium())).await?;
    let on = date(2025, 3, 10);

    let no_slots = h
        .engine
        .admit(AdmissionRequest::slotted(KindId::auditorium(), on, "u1", vec![], "a note"))
        .await?;
    assert_eq!(no_slots.rejection(), Some(&AdmissionError::EmptySlotRequest));

    let no_note = h
        .engine
        .admit(AdmissionRequest {
            kind: KindId::auditorium(),
            date: on,
            owner: OwnerId::new("u1"),
            slots: vec![Slot::Morning],
            note: None,
        })
        .await?;
    assert_eq!(no_note.rejection(), Some(&AdmissionError::MissingObservation));

    let blank_note = h
        .engine
        .admit(AdmissionRequest::slotted(
            KindId::auditorium(),
            on,
            "u1",
            vec![Slot::Morning],
            "   ",
        ))
        .await?;
    assert_eq!(blank_note.rejection(), Some(&AdmissionError::MissingObservation));

    // Nothing was written along the way.
    assert!(h.reservations.rows.lock().await.is_empty());

    Ok(())
}

#[tokio::test]
async fn exclusive_laboratory_names_its_holder() -> anyhow::Result<()> {
    let h = harness();
    h.engine.define_kind(ResourceKind::laboratory("chem")).await?;
    let lab = KindId::laboratory("chem");
    let on = date(2025, 3, 10);

    let winner = h
        .engine
        .admit(AdmissionRequest::whole_day(lab.clone(), on, "u1"))
        .await?;
    assert!(winner.is_admitted());

    let loser = h
        .engine
        .admit(AdmissionRequest::whole_day(lab.clone(), on, "u2"))
        .await?;
    assert_eq!(
        loser.rejection(),
        Some(&AdmissionError::CapacityExceeded {
            held_by: Some(OwnerId::new("u1"))
        })
    );

    Ok(())
}

#[tokio::test]
async fn admission_triggers_a_created_notification() -> anyhow::Result<()> {
    let h = harness();
    h.engine.define_kind(ResourceKind::equipment(KindId::projector(), 4)).await?;

    h.engine
        .admit(AdmissionRequest::whole_day(KindId::projector(), date(2025, 3, 10), "u1"))
        .await?;

    // Delivery runs on a detached task.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let deliveries = h.sink.deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].action, Action::Created);
    assert_eq!(deliveries[0].reservation.owner, OwnerId::new("u1"));

    Ok(())
}

#[tokio::test]
async fn notification_failure_never_fails_the_admission() -> anyhow::Result<()> {
    let catalog_store = Arc::new(InMemoryCatalogStore::default());
    let reservations = Arc::new(InMemoryReservationStore::default());
    let clock = Arc::new(FixedClock::on(date(2025, 3, 1)));

    let engine = ReservationEngine::new(
        catalog_store,
        reservations.clone(),
        RetryPolicy::default(),
        16,
        clock,
        Arc::new(FailingSink),
    );

    engine.define_kind(ResourceKind::equipment(KindId::projector(), 4)).await?;
    let outcome = engine
        .admit(AdmissionRequest::whole_day(KindId::projector(), date(2025, 3, 10), "u1"))
        .await?;

    assert!(outcome.is_admitted());
    assert_eq!(reservations.rows.lock().await.len(), 1);

    Ok(())
}

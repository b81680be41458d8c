// libs/appointment-cell/tests/booking_test.rs
mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentError, AppointmentStatus, NewAppointment};
use appointment_cell::services::{
    AppointmentLedger, InMemoryAppointmentLedger, InMemoryPatientDirectory, SchedulingService,
    SlotPosition, TracingNotificationSink,
};
use shared_config::SchedulingConfig;
use common::{booking, hm, june_10, Harness};

/// Delegates to the in-memory ledger but interleaves work just before a move
/// is committed: either lets other tasks run, or cancels the appointment.
struct InterleavingLedger {
    inner: Arc<InMemoryAppointmentLedger>,
    cancel_before_move: bool,
}

#[async_trait]
impl AppointmentLedger for InterleavingLedger {
    async fn insert(&self, appointment: NewAppointment) -> Result<Appointment, AppointmentError> {
        self.inner.insert(appointment).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        self.inner.get(id).await
    }

    async fn list_for_staff_on(
        &self,
        staff_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.inner.list_for_staff_on(staff_id, date).await
    }

    async fn list_on(&self, date: NaiveDate) -> Result<Vec<Appointment>, AppointmentError> {
        self.inner.list_on(date).await
    }

    async fn list_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.inner.list_between(from, to).await
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        target: AppointmentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        self.inner.compare_and_set_status(id, expected, target, now).await
    }

    async fn compare_and_move(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        from: SlotPosition,
        to: SlotPosition,
        now: DateTime<Utc>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        if self.cancel_before_move {
            self.inner
                .compare_and_set_status(id, expected, AppointmentStatus::Cancelled, now)
                .await?;
        } else {
            tokio::task::yield_now().await;
        }
        self.inner.compare_and_move(id, expected, from, to, now).await
    }
}

fn interleaving_service(harness: &Harness, cancel_before_move: bool) -> SchedulingService {
    SchedulingService::new(
        &SchedulingConfig::default(),
        Arc::new(InterleavingLedger {
            inner: harness.ledger.clone(),
            cancel_before_move,
        }),
        harness.staff.clone(),
        Arc::new(InMemoryPatientDirectory::new()),
        Arc::new(TracingNotificationSink),
    )
}

#[tokio::test]
async fn booking_removes_slot_from_availability() {
    let harness = Harness::new();
    let resolver = &harness.service.resolver;

    let before = resolver.compute_available_slots("doc-1", june_10()).await.unwrap();
    assert_eq!(before.len(), 16);

    let appointment = harness
        .service
        .booking
        .book_appointment(booking("patient-1", "doc-1", june_10(), hm(9, 0)))
        .await
        .unwrap();
    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.duration_minutes, 30);

    let after = resolver.compute_available_slots("doc-1", june_10()).await.unwrap();
    assert_eq!(after.len(), 15);
    assert!(!after.contains(&hm(9, 0)));

    // Other staff are unaffected.
    let other = resolver.compute_available_slots("doc-2", june_10()).await.unwrap();
    assert_eq!(other.len(), 16);
}

#[tokio::test]
async fn available_and_occupied_partition_the_grid() {
    let harness = Harness::new();
    let engine = &harness.service.booking;

    for (patient, start) in [("p-1", hm(8, 0)), ("p-2", hm(10, 30)), ("p-3", hm(16, 0))] {
        engine
            .book_appointment(booking(patient, "doc-1", june_10(), start))
            .await
            .unwrap();
    }
    let cancelled = engine
        .book_appointment(booking("p-4", "doc-1", june_10(), hm(14, 0)))
        .await
        .unwrap();
    harness
        .service
        .workflow
        .transition(cancelled.id, AppointmentStatus::Cancelled, None)
        .await
        .unwrap();

    let resolver = &harness.service.resolver;
    let available = resolver.compute_available_slots("doc-1", june_10()).await.unwrap();
    let occupied = resolver.occupied_slots("doc-1", june_10()).await.unwrap();
    let grid = resolver.grid().generate_slots(june_10());

    let available_set: BTreeSet<_> = available.iter().copied().collect();
    let occupied_set: BTreeSet<_> = occupied.iter().copied().collect();
    assert!(available_set.is_disjoint(&occupied_set));
    let union: Vec<_> = available_set.union(&occupied_set).copied().collect();
    assert_eq!(union, grid);
    assert_eq!(occupied, vec![hm(8, 0), hm(10, 30), hm(16, 0)]);
}

#[tokio::test]
async fn concurrent_identical_bookings_have_one_winner() {
    let harness = Harness::new();

    let attempts = (0..8).map(|i| {
        let service = harness.service.clone();
        async move {
            service
                .booking
                .book_appointment(booking(&format!("patient-{}", i), "doc-1", june_10(), hm(9, 0)))
                .await
        }
    });
    let results = join_all(attempts).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(AppointmentError::SlotConflict { start_time, .. }) if *start_time == hm(9, 0));
    }

    let active: Vec<_> = harness
        .service
        .ledger
        .list_for_staff_on("doc-1", june_10())
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.status != AppointmentStatus::Cancelled)
        .collect();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn concurrent_bookings_on_spawned_tasks_have_one_winner() {
    let harness = Harness::new();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = harness.service.clone();
            tokio::spawn(async move {
                service
                    .booking
                    .book_appointment(booking(&format!("p-{}", i), "doc-2", june_10(), hm(15, 30)))
                    .await
            })
        })
        .collect();

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(results.iter().filter(|r| r.as_ref().is_err_and(|e| e.is_conflict())).count(), 3);
}

#[tokio::test]
async fn malformed_bookings_are_validation_errors() {
    let harness = Harness::new();
    let engine = &harness.service.booking;

    let result = engine.book_appointment(booking("", "doc-1", june_10(), hm(9, 0))).await;
    assert_matches!(result, Err(AppointmentError::Validation(_)));

    let result = engine.book_appointment(booking("p-1", "  ", june_10(), hm(9, 0))).await;
    assert_matches!(result, Err(AppointmentError::Validation(_)));

    let result = engine.book_appointment(booking("p-1", "doc-1", june_10(), hm(9, 15))).await;
    assert_matches!(result, Err(AppointmentError::Validation(_)));

    let result = engine.book_appointment(booking("p-1", "doc-1", june_10(), hm(13, 0))).await;
    assert_matches!(result, Err(AppointmentError::Validation(_)));
}

#[tokio::test]
async fn unknown_or_unavailable_staff_cannot_be_booked() {
    let harness = Harness::new();
    let engine = &harness.service.booking;

    let result = engine.book_appointment(booking("p-1", "ghost", june_10(), hm(9, 0))).await;
    assert_matches!(result, Err(AppointmentError::NotFound(_)));

    harness.staff.set_available("doc-2", false).await.unwrap();
    let result = engine.book_appointment(booking("p-1", "doc-2", june_10(), hm(9, 0))).await;
    assert_matches!(result, Err(AppointmentError::Validation(_)));
}

#[tokio::test]
async fn availability_change_does_not_invalidate_existing_booking() {
    let harness = Harness::new();
    let appointment = harness
        .service
        .booking
        .book_appointment(booking("p-1", "doc-1", june_10(), hm(9, 0)))
        .await
        .unwrap();

    harness.staff.set_available("doc-1", false).await.unwrap();

    let confirmed = harness
        .service
        .workflow
        .transition(appointment.id, AppointmentStatus::Confirmed, None)
        .await
        .unwrap();
    assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn cancelled_slot_can_be_booked_again() {
    let harness = Harness::new();
    let engine = &harness.service.booking;

    let first = engine
        .book_appointment(booking("p-1", "doc-1", june_10(), hm(11, 0)))
        .await
        .unwrap();
    assert_matches!(
        engine.book_appointment(booking("p-2", "doc-1", june_10(), hm(11, 0))).await,
        Err(AppointmentError::SlotConflict { .. })
    );

    harness
        .service
        .workflow
        .transition(first.id, AppointmentStatus::Cancelled, Some(AppointmentStatus::Pending))
        .await
        .unwrap();

    let second = engine
        .book_appointment(booking("p-2", "doc-1", june_10(), hm(11, 0)))
        .await
        .unwrap();
    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn reschedule_moves_booking_and_frees_old_slot() {
    let harness = Harness::new();
    let engine = &harness.service.booking;
    let appointment = engine
        .book_appointment(booking("p-1", "doc-1", june_10(), hm(9, 0)))
        .await
        .unwrap();

    let moved = engine
        .reschedule_appointment(appointment.id, june_10(), hm(10, 0))
        .await
        .unwrap();
    assert_eq!(moved.start_time, hm(10, 0));
    assert_eq!(moved.status, AppointmentStatus::Pending);

    let available = harness
        .service
        .resolver
        .compute_available_slots("doc-1", june_10())
        .await
        .unwrap();
    assert!(available.contains(&hm(9, 0)));
    assert!(!available.contains(&hm(10, 0)));
}

#[tokio::test]
async fn reschedule_into_taken_slot_keeps_original() {
    let harness = Harness::new();
    let engine = &harness.service.booking;
    let first = engine
        .book_appointment(booking("p-1", "doc-1", june_10(), hm(9, 0)))
        .await
        .unwrap();
    engine
        .book_appointment(booking("p-2", "doc-1", june_10(), hm(9, 30)))
        .await
        .unwrap();

    let result = engine.reschedule_appointment(first.id, june_10(), hm(9, 30)).await;
    assert_matches!(result, Err(AppointmentError::SlotConflict { .. }));

    let unchanged = engine.get_appointment(first.id).await.unwrap();
    assert_eq!(unchanged.start_time, hm(9, 0));
}

#[tokio::test]
async fn started_appointments_cannot_be_rescheduled() {
    let harness = Harness::new();
    let engine = &harness.service.booking;
    let workflow = &harness.service.workflow;
    let appointment = engine
        .book_appointment(booking("p-1", "doc-1", june_10(), hm(9, 0)))
        .await
        .unwrap();

    workflow.transition(appointment.id, AppointmentStatus::Confirmed, None).await.unwrap();
    // Confirmed may still move.
    engine
        .reschedule_appointment(appointment.id, june_10(), hm(9, 30))
        .await
        .unwrap();

    workflow.transition(appointment.id, AppointmentStatus::CheckedIn, None).await.unwrap();
    let result = engine.reschedule_appointment(appointment.id, june_10(), hm(10, 0)).await;
    assert_matches!(result, Err(AppointmentError::Validation(_)));
}

#[tokio::test]
async fn unknown_appointment_is_not_found() {
    let harness = Harness::new();
    let result = harness
        .service
        .booking
        .reschedule_appointment(uuid::Uuid::new_v4(), june_10(), hm(9, 0))
        .await;
    assert_matches!(result, Err(AppointmentError::NotFound(_)));
}

#[tokio::test]
async fn ledger_outage_aborts_booking() {
    let harness = Harness::new();
    harness.ledger.set_offline(true);

    let result = harness
        .service
        .booking
        .book_appointment(booking("p-1", "doc-1", june_10(), hm(9, 0)))
        .await;
    assert_matches!(result, Err(AppointmentError::Dependency(_)));

    harness.ledger.set_offline(false);
    let day = harness.ledger.list_on(june_10()).await.unwrap();
    assert!(day.is_empty());
}

#[tokio::test]
async fn concurrent_reschedules_into_one_slot_leave_loser_in_place() {
    let harness = Harness::new();
    let first = harness
        .service
        .booking
        .book_appointment(booking("p-1", "doc-1", june_10(), hm(9, 0)))
        .await
        .unwrap();
    let second = harness
        .service
        .booking
        .book_appointment(booking("p-2", "doc-1", june_10(), hm(10, 0)))
        .await
        .unwrap();

    // Both pass the availability check before either commits.
    let racing = interleaving_service(&harness, false);
    let results = join_all([first.id, second.id].map(|id| {
        racing
            .booking
            .reschedule_appointment(id, june_10(), hm(11, 0))
    }))
    .await;

    let winners: Vec<&Appointment> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let losing_error = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .unwrap();
    assert!(losing_error.is_conflict());

    let (loser_id, loser_start) = if winners[0].id == first.id {
        (second.id, hm(10, 0))
    } else {
        (first.id, hm(9, 0))
    };
    let loser = harness.ledger.get(loser_id).await.unwrap().unwrap();
    assert_eq!(loser.start_time, loser_start);
    assert_eq!(loser.status, AppointmentStatus::Pending);

    let day = harness.ledger.list_for_staff_on("doc-1", june_10()).await.unwrap();
    let at_eleven = day.iter().filter(|a| a.start_time == hm(11, 0)).count();
    assert_eq!(at_eleven, 1);
}

#[tokio::test]
async fn concurrent_moves_of_one_appointment_apply_once() {
    let harness = Harness::new();
    let appointment = harness
        .service
        .booking
        .book_appointment(booking("p-1", "doc-1", june_10(), hm(9, 0)))
        .await
        .unwrap();

    let racing = interleaving_service(&harness, false);
    let results = join_all([hm(11, 0), hm(14, 0)].map(|start| {
        racing
            .booking
            .reschedule_appointment(appointment.id, june_10(), start)
    }))
    .await;

    assert!(results[0].is_ok());
    assert_matches!(
        &results[1],
        Err(AppointmentError::ConcurrentModification { appointment_id, .. }) if *appointment_id == appointment.id
    );

    let stored = harness.ledger.get(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.start_time, hm(11, 0));
}

#[tokio::test]
async fn cancel_between_read_and_move_is_a_concurrent_modification() {
    let harness = Harness::new();
    let appointment = harness
        .service
        .booking
        .book_appointment(booking("p-1", "doc-1", june_10(), hm(9, 0)))
        .await
        .unwrap();

    let racing = interleaving_service(&harness, true);
    let result = racing
        .booking
        .reschedule_appointment(appointment.id, june_10(), hm(11, 0))
        .await;
    assert_matches!(
        result,
        Err(AppointmentError::ConcurrentModification { expected: AppointmentStatus::Pending, .. })
    );

    let stored = harness.ledger.get(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Cancelled);
    assert_eq!(stored.start_time, hm(9, 0));
}

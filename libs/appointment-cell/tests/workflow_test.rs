// libs/appointment-cell/tests/workflow_test.rs
mod common;

use assert_matches::assert_matches;
use futures::future::join_all;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentStatus};
use appointment_cell::services::allowed_transitions;
use common::{booking, hm, june_10, Harness};

async fn booked(harness: &Harness) -> Uuid {
    harness
        .service
        .booking
        .book_appointment(booking("p-1", "doc-1", june_10(), hm(9, 0)))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn full_visit_walks_every_state() {
    let harness = Harness::new();
    let id = booked(&harness).await;
    let workflow = &harness.service.workflow;

    for target in [
        AppointmentStatus::Confirmed,
        AppointmentStatus::CheckedIn,
        AppointmentStatus::InProgress,
        AppointmentStatus::Completed,
    ] {
        let updated = workflow.transition(id, target, None).await.unwrap();
        assert_eq!(updated.status, target);
    }

    let (status, next) = workflow.next_states(id).await.unwrap();
    assert_eq!(status, AppointmentStatus::Completed);
    assert!(next.is_empty());
}

#[tokio::test]
async fn pending_cannot_jump_to_completed() {
    let harness = Harness::new();
    let id = booked(&harness).await;

    let result = harness
        .service
        .workflow
        .transition(id, AppointmentStatus::Completed, None)
        .await;
    assert_matches!(
        result,
        Err(AppointmentError::InvalidTransition {
            from: AppointmentStatus::Pending,
            to: AppointmentStatus::Completed
        })
    );
}

#[tokio::test]
async fn cancelling_twice_is_an_invalid_transition() {
    let harness = Harness::new();
    let id = booked(&harness).await;
    let workflow = &harness.service.workflow;

    workflow.transition(id, AppointmentStatus::Cancelled, None).await.unwrap();
    let result = workflow.transition(id, AppointmentStatus::Cancelled, None).await;
    assert_matches!(result, Err(AppointmentError::InvalidTransition { .. }));
}

#[tokio::test]
async fn cancel_is_reachable_until_consultation_starts() {
    let harness = Harness::new();
    let workflow = &harness.service.workflow;
    let engine = &harness.service.booking;

    let paths: [&[AppointmentStatus]; 3] = [
        &[],
        &[AppointmentStatus::Confirmed],
        &[AppointmentStatus::Confirmed, AppointmentStatus::CheckedIn],
    ];
    for (i, path) in paths.iter().enumerate() {
        let appointment = engine
            .book_appointment(booking("p-1", "doc-1", june_10(), hm(8 + i as u32, 0)))
            .await
            .unwrap();
        for step in path.iter() {
            workflow.transition(appointment.id, *step, None).await.unwrap();
        }
        let cancelled = workflow
            .transition(appointment.id, AppointmentStatus::Cancelled, None)
            .await
            .unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    }
}

#[tokio::test]
async fn stale_expected_status_is_a_conflict() {
    let harness = Harness::new();
    let id = booked(&harness).await;
    let workflow = &harness.service.workflow;

    workflow.transition(id, AppointmentStatus::Confirmed, None).await.unwrap();

    // Caller still believes the appointment is pending.
    let result = workflow
        .transition(id, AppointmentStatus::Cancelled, Some(AppointmentStatus::Pending))
        .await;
    assert_matches!(
        result,
        Err(AppointmentError::ConcurrentModification {
            expected: AppointmentStatus::Pending,
            ..
        })
    );
}

#[tokio::test]
async fn concurrent_transitions_have_exactly_one_winner() {
    let harness = Harness::new();
    let id = booked(&harness).await;

    let attempts = [
        AppointmentStatus::Confirmed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Cancelled,
    ]
    .into_iter()
    .map(|target| {
        let service = harness.service.clone();
        async move {
            service
                .workflow
                .transition(id, target, Some(AppointmentStatus::Pending))
                .await
        }
    });
    let results = join_all(attempts).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(AppointmentError::ConcurrentModification { .. }));
    }
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let harness = Harness::new();
    let result = harness
        .service
        .workflow
        .transition(Uuid::new_v4(), AppointmentStatus::Confirmed, None)
        .await;
    assert_matches!(result, Err(AppointmentError::NotFound(_)));
}

#[test]
fn legal_next_states_are_exposed() {
    assert_eq!(
        allowed_transitions(AppointmentStatus::Confirmed),
        &[AppointmentStatus::CheckedIn, AppointmentStatus::Cancelled]
    );
}

use assert_matches::assert_matches;

use consultation_cell::models::{
    CallerRole, ConsultationError, ConsultationStatus, LifecycleAction,
};
use consultation_cell::services::lifecycle::{apply_action, valid_next_statuses};

#[test]
fn test_doctor_starts_scheduled_consultation() {
    let next = apply_action(
        ConsultationStatus::Scheduled,
        LifecycleAction::Start,
        CallerRole::Doctor,
    )
    .unwrap();

    assert_eq!(next, ConsultationStatus::InProgress);
}

#[test]
fn test_doctor_ends_in_progress_consultation() {
    let next = apply_action(
        ConsultationStatus::InProgress,
        LifecycleAction::End,
        CallerRole::Doctor,
    )
    .unwrap();

    assert_eq!(next, ConsultationStatus::Completed);
}

#[test]
fn test_either_party_can_cancel() {
    for role in [CallerRole::Doctor, CallerRole::Patient, CallerRole::Admin] {
        let from_scheduled =
            apply_action(ConsultationStatus::Scheduled, LifecycleAction::Cancel, role).unwrap();
        assert_eq!(from_scheduled, ConsultationStatus::Cancelled);

        let from_in_progress =
            apply_action(ConsultationStatus::InProgress, LifecycleAction::Cancel, role).unwrap();
        assert_eq!(from_in_progress, ConsultationStatus::Cancelled);
    }
}

#[test]
fn test_doctor_marks_no_show() {
    let next = apply_action(
        ConsultationStatus::Scheduled,
        LifecycleAction::MarkNoShow,
        CallerRole::Doctor,
    )
    .unwrap();

    assert_eq!(next, ConsultationStatus::NoShow);
}

#[test]
fn test_patient_cannot_start_end_or_mark_no_show() {
    for action in [
        LifecycleAction::Start,
        LifecycleAction::End,
        LifecycleAction::MarkNoShow,
    ] {
        let result = apply_action(ConsultationStatus::Scheduled, action, CallerRole::Patient);
        assert_matches!(result, Err(ConsultationError::Forbidden));
    }
}

#[test]
fn test_cannot_start_twice() {
    let result = apply_action(
        ConsultationStatus::InProgress,
        LifecycleAction::Start,
        CallerRole::Doctor,
    );

    assert_matches!(result, Err(ConsultationError::InvalidTransition { .. }));
}

#[test]
fn test_cannot_end_without_starting() {
    let result = apply_action(
        ConsultationStatus::Scheduled,
        LifecycleAction::End,
        CallerRole::Doctor,
    );

    assert_matches!(result, Err(ConsultationError::InvalidTransition { .. }));
}

#[test]
fn test_terminal_statuses_admit_no_actions() {
    let terminal = [
        ConsultationStatus::Completed,
        ConsultationStatus::Cancelled,
        ConsultationStatus::NoShow,
    ];
    let actions = [
        LifecycleAction::Start,
        LifecycleAction::End,
        LifecycleAction::Cancel,
        LifecycleAction::MarkNoShow,
    ];

    for status in terminal {
        assert!(valid_next_statuses(status).is_empty());
        for action in actions {
            let result = apply_action(status, action, CallerRole::Doctor);
            assert_matches!(result, Err(ConsultationError::InvalidTransition { .. }));
        }
    }
}

#[test]
fn test_no_show_only_from_scheduled() {
    let result = apply_action(
        ConsultationStatus::InProgress,
        LifecycleAction::MarkNoShow,
        CallerRole::Doctor,
    );

    assert_matches!(result, Err(ConsultationError::InvalidTransition { .. }));
}

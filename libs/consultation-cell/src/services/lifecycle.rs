// libs/consultation-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{CallerRole, ConsultationError, ConsultationStatus, LifecycleAction};

/// Apply a lifecycle action to a consultation status and return the resulting
/// status. This is the single source of truth for status transitions; the REST
/// handlers and the chat status updates both go through it.
///
/// Permission is part of the transition: starting, ending and marking no-show
/// are doctor actions, cancelling is open to either participant.
pub fn apply_action(
    status: ConsultationStatus,
    action: LifecycleAction,
    role: CallerRole,
) -> Result<ConsultationStatus, ConsultationError> {
    debug!("Applying {:?} to {:?} consultation as {:?}", action, status, role);

    if requires_doctor(action) && role == CallerRole::Patient {
        warn!("Patient attempted doctor-only action {:?}", action);
        return Err(ConsultationError::Forbidden);
    }

    let next = match (status, action) {
        (ConsultationStatus::Scheduled, LifecycleAction::Start) => ConsultationStatus::InProgress,
        (ConsultationStatus::Scheduled, LifecycleAction::Cancel) => ConsultationStatus::Cancelled,
        (ConsultationStatus::Scheduled, LifecycleAction::MarkNoShow) => ConsultationStatus::NoShow,
        (ConsultationStatus::InProgress, LifecycleAction::End) => ConsultationStatus::Completed,
        (ConsultationStatus::InProgress, LifecycleAction::Cancel) => ConsultationStatus::Cancelled,
        (from, action) => {
            warn!("Invalid transition: {:?} on {:?}", action, from);
            return Err(ConsultationError::InvalidTransition {
                status: from.as_str().to_string(),
                action: action.as_str().to_string(),
            });
        }
    };

    Ok(next)
}

fn requires_doctor(action: LifecycleAction) -> bool {
    matches!(
        action,
        LifecycleAction::Start | LifecycleAction::End | LifecycleAction::MarkNoShow
    )
}

/// The statuses reachable from `status` in one action, for any role.
pub fn valid_next_statuses(status: ConsultationStatus) -> Vec<ConsultationStatus> {
    match status {
        ConsultationStatus::Scheduled => vec![
            ConsultationStatus::InProgress,
            ConsultationStatus::Cancelled,
            ConsultationStatus::NoShow,
        ],
        ConsultationStatus::InProgress => vec![
            ConsultationStatus::Completed,
            ConsultationStatus::Cancelled,
        ],
        // Terminal states.
        ConsultationStatus::Completed
        | ConsultationStatus::Cancelled
        | ConsultationStatus::NoShow => vec![],
    }
}

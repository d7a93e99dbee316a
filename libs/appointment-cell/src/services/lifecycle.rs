use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// How `DELETE /appointments/{id}` treats an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationMode {
    /// Keep the record, mark it `canceled`.
    SoftCancel,
    /// Remove the record.
    HardDelete,
}

#[derive(Debug, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Statuses reachable through a plain update. `completed` is never
    /// listed; it is only reachable through completion.
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current_status {
            AppointmentStatus::Scheduled => &[
                AppointmentStatus::Upcoming,
                AppointmentStatus::Canceled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Upcoming => &[
                AppointmentStatus::Scheduled,
                AppointmentStatus::Canceled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Completed | AppointmentStatus::Canceled | AppointmentStatus::NoShow => &[],
        }
    }

    /// Setting the current status again is a no-op and always allowed.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if current_status == new_status || self.get_valid_transitions(current_status).contains(&new_status) {
            return Ok(());
        }

        warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
        Err(AppointmentError::InvalidStatusTransition {
            from: current_status,
            to: new_status,
        })
    }

    pub fn validate_completion(&self, current_status: AppointmentStatus) -> Result<(), AppointmentError> {
        match current_status {
            AppointmentStatus::Scheduled | AppointmentStatus::Upcoming => Ok(()),
            other => Err(AppointmentError::InvalidStatusTransition {
                from: other,
                to: AppointmentStatus::Completed,
            }),
        }
    }

    /// Only appointments dated strictly after `today` are kept as canceled
    /// records; anything else is removed outright.
    pub fn cancellation_mode(&self, appointment_date: NaiveDate, today: NaiveDate) -> CancellationMode {
        if appointment_date > today {
            CancellationMode::SoftCancel
        } else {
            CancellationMode::HardDelete
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn active_statuses_swap_and_release() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::Upcoming)
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Upcoming, AppointmentStatus::Scheduled)
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Upcoming, AppointmentStatus::NoShow)
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::Canceled)
            .is_ok());
    }

    #[test]
    fn terminal_statuses_are_final() {
        let lifecycle = AppointmentLifecycleService::new();

        for terminal in [AppointmentStatus::Completed, AppointmentStatus::Canceled, AppointmentStatus::NoShow] {
            assert!(lifecycle.get_valid_transitions(terminal).is_empty());
            assert_matches!(
                lifecycle.validate_status_transition(terminal, AppointmentStatus::Scheduled),
                Err(AppointmentError::InvalidStatusTransition { .. })
            );
        }
    }

    #[test]
    fn completed_is_not_reachable_by_update() {
        let lifecycle = AppointmentLifecycleService::new();
        assert_matches!(
            lifecycle.validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::Completed),
            Err(AppointmentError::InvalidStatusTransition { to: AppointmentStatus::Completed, .. })
        );
    }

    #[test]
    fn completion_requires_active_status() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle.validate_completion(AppointmentStatus::Upcoming).is_ok());
        assert!(lifecycle.validate_completion(AppointmentStatus::Canceled).is_err());
        assert!(lifecycle.validate_completion(AppointmentStatus::Completed).is_err());
    }

    #[test]
    fn only_future_dates_are_soft_canceled() {
        let lifecycle = AppointmentLifecycleService::new();
        let today = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();

        assert_eq!(
            lifecycle.cancellation_mode(today.succ_opt().unwrap(), today),
            CancellationMode::SoftCancel
        );
        assert_eq!(lifecycle.cancellation_mode(today, today), CancellationMode::HardDelete);
        assert_eq!(
            lifecycle.cancellation_mode(today.pred_opt().unwrap(), today),
            CancellationMode::HardDelete
        );
    }
}

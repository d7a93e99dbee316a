use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{collections, AppContext, DocumentStore, Filter, RELEASED_STATUSES};

use crate::models::AppointmentError;

/// Read-side guard against double booking. The scoped unique index on
/// (doctor_id, date, time) is what actually closes the race; this check
/// exists to fail early with a readable error.
pub struct ConflictDetectionService {
    store: Arc<dyn DocumentStore>,
}

impl ConflictDetectionService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            store: ctx.store.clone(),
        }
    }

    /// True when another live appointment holds the slot.
    pub async fn check_conflict(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: &str,
        exclude_appointment_id: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<bool, AppointmentError> {
        debug!("Checking conflicts for doctor {} on {} at {}", doctor_id, date, time);

        let mut filters = vec![
            Filter::eq("doctor_id", doctor_id.to_string()),
            Filter::eq("date", date.to_string()),
            Filter::eq("time", time),
            Filter::not_in("status", RELEASED_STATUSES),
        ];
        if let Some(exclude) = exclude_appointment_id {
            filters.push(Filter::neq("id", exclude.to_string()));
        }

        let existing = self
            .store
            .find(collections::APPOINTMENTS, &filters, auth_token)
            .await?;

        Ok(!existing.is_empty())
    }

    pub async fn ensure_slot_free(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: &str,
        exclude_appointment_id: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<(), AppointmentError> {
        if self
            .check_conflict(doctor_id, date, time, exclude_appointment_id, auth_token)
            .await?
        {
            warn!("Conflict detected for doctor {} on {} at {}", doctor_id, date, time);
            return Err(AppointmentError::SlotAlreadyBooked);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use shared_config::AppConfig;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    async fn seed(ctx: &AppContext, id: Uuid, doctor_id: Uuid, status: &str) {
        ctx.store
            .insert(
                collections::APPOINTMENTS,
                json!({
                    "id": id.to_string(),
                    "doctor_id": doctor_id.to_string(),
                    "date": "2030-01-07",
                    "time": "09:30",
                    "status": status,
                }),
                None,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn live_appointment_conflicts() {
        let ctx = AppContext::in_memory(AppConfig::default());
        let service = ConflictDetectionService::new(&ctx);
        let doctor_id = Uuid::new_v4();
        seed(&ctx, Uuid::new_v4(), doctor_id, "upcoming").await;

        assert!(service.check_conflict(doctor_id, date(), "09:30", None, None).await.unwrap());
        assert!(!service.check_conflict(doctor_id, date(), "10:00", None, None).await.unwrap());
        assert_matches!(
            service.ensure_slot_free(doctor_id, date(), "09:30", None, None).await,
            Err(AppointmentError::SlotAlreadyBooked)
        );
    }

    #[tokio::test]
    async fn released_appointment_does_not_conflict() {
        let ctx = AppContext::in_memory(AppConfig::default());
        let service = ConflictDetectionService::new(&ctx);
        let doctor_id = Uuid::new_v4();
        seed(&ctx, Uuid::new_v4(), doctor_id, "canceled").await;

        assert!(!service.check_conflict(doctor_id, date(), "09:30", None, None).await.unwrap());
    }

    #[tokio::test]
    async fn appointment_does_not_conflict_with_itself() {
        let ctx = AppContext::in_memory(AppConfig::default());
        let service = ConflictDetectionService::new(&ctx);
        let doctor_id = Uuid::new_v4();
        let appointment_id = Uuid::new_v4();
        seed(&ctx, appointment_id, doctor_id, "scheduled").await;

        assert!(!service
            .check_conflict(doctor_id, date(), "09:30", Some(appointment_id), None)
            .await
            .unwrap());
    }
}

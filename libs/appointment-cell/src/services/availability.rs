use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::{DayOfWeek, Doctor};
use doctor_cell::services::{generate_slots, DoctorService, SlotError};
use shared_database::{collections, AppContext, DocumentStore, Filter, RELEASED_STATUSES};

use crate::models::{AppointmentError, AvailableSlots};

/// Computes a doctor's open slots for a calendar day. Reads are
/// point-in-time; nothing is reserved.
pub struct AvailabilityService {
    store: Arc<dyn DocumentStore>,
    doctor_service: DoctorService,
    slot_duration: u32,
}

impl AvailabilityService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            store: ctx.store.clone(),
            doctor_service: DoctorService::new(ctx),
            slot_duration: ctx.config.slot_duration(),
        }
    }

    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<(Doctor, AvailableSlots), AppointmentError> {
        let doctor = self.doctor_service.get_doctor(doctor_id, auth_token).await?;
        let slots = self.slots_for_doctor(&doctor, date, auth_token).await?;
        Ok((doctor, slots))
    }

    pub async fn slots_for_doctor(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<AvailableSlots, AppointmentError> {
        debug!("Resolving availability for doctor {} on {}", doctor.id, date);

        let Some(candidates) = offered_slots(doctor, date, self.slot_duration)? else {
            return Ok(AvailableSlots {
                date,
                slots: Vec::new(),
                note: Some(format!("Doctor is not available on {}", DayOfWeek::from_date(date))),
            });
        };

        let booked = self.booked_times(doctor.id, date, auth_token).await?;
        Ok(AvailableSlots {
            date,
            slots: subtract_booked(candidates, &booked),
            note: None,
        })
    }

    /// Times on `date` held by appointments that have not been released.
    pub async fn booked_times(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<HashSet<String>, AppointmentError> {
        let filters = [
            Filter::eq("doctor_id", doctor_id.to_string()),
            Filter::eq("date", date.to_string()),
            Filter::not_in("status", RELEASED_STATUSES),
        ];

        let booked = self
            .store
            .find(collections::APPOINTMENTS, &filters, auth_token)
            .await?
            .into_iter()
            .filter_map(|document| match document.get("time") {
                Some(Value::String(time)) => Some(time.clone()),
                _ => None,
            })
            .collect();

        Ok(booked)
    }

    pub fn slot_duration(&self) -> u32 {
        self.slot_duration
    }
}

/// Slots generated from the doctor's window for `date`'s weekday, or `None`
/// when the doctor does not work that day.
pub fn offered_slots(doctor: &Doctor, date: NaiveDate, duration_minutes: u32) -> Result<Option<Vec<String>>, SlotError> {
    match doctor.availability_on(DayOfWeek::from_date(date)) {
        Some(window) => generate_slots(&window.start_time, &window.end_time, duration_minutes).map(Some),
        None => Ok(None),
    }
}

/// Candidates minus booked times, keeping generation order.
pub fn subtract_booked(candidates: Vec<String>, booked: &HashSet<String>) -> Vec<String> {
    candidates.into_iter().filter(|slot| !booked.contains(slot)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use doctor_cell::models::WeeklyAvailability;
    use serde_json::json;
    use shared_config::AppConfig;

    fn monday_doctor() -> Doctor {
        let now = Utc::now();
        Doctor {
            id: Uuid::new_v4(),
            user_id: "doc-account".into(),
            first_name: "Ada".into(),
            last_name: "Byron".into(),
            email: "ada@example.com".into(),
            specialty: "Cardiology".into(),
            license_number: "LIC-1".into(),
            weekly_availability: vec![WeeklyAvailability {
                day: DayOfWeek::Monday,
                start_time: "09:00".into(),
                end_time: "10:30".into(),
            }],
            accepting_appointments: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    async fn seed_appointment(ctx: &AppContext, doctor_id: Uuid, time: &str, status: &str) {
        ctx.store
            .insert(
                collections::APPOINTMENTS,
                json!({
                    "id": Uuid::new_v4().to_string(),
                    "doctor_id": doctor_id.to_string(),
                    "patient_id": Uuid::new_v4().to_string(),
                    "date": "2030-01-07",
                    "time": time,
                    "status": status,
                }),
                None,
            )
            .await
            .unwrap();
    }

    #[test]
    fn booked_times_are_removed_in_order() {
        let candidates = vec!["09:00".to_string(), "09:30".to_string(), "10:00".to_string()];
        let booked = HashSet::from(["09:30".to_string()]);

        assert_eq!(subtract_booked(candidates, &booked), vec!["09:00", "10:00"]);
    }

    #[test]
    fn no_window_means_no_candidates() {
        let tuesday = monday().succ_opt().unwrap();
        assert_eq!(offered_slots(&monday_doctor(), tuesday, 30).unwrap(), None);
        assert_eq!(
            offered_slots(&monday_doctor(), monday(), 30).unwrap(),
            Some(vec!["09:00".to_string(), "09:30".to_string(), "10:00".to_string()])
        );
    }

    #[tokio::test]
    async fn canceled_appointments_release_their_slot() {
        let ctx = AppContext::in_memory(AppConfig::default());
        let service = AvailabilityService::new(&ctx);
        let doctor = monday_doctor();

        seed_appointment(&ctx, doctor.id, "09:30", "scheduled").await;
        seed_appointment(&ctx, doctor.id, "10:00", "canceled").await;
        seed_appointment(&ctx, doctor.id, "09:00", "no-show").await;

        let slots = service.slots_for_doctor(&doctor, monday(), None).await.unwrap();
        assert_eq!(slots.slots, vec!["09:00", "10:00"]);
        assert_eq!(slots.note, None);
    }

    #[tokio::test]
    async fn day_off_yields_note_not_error() {
        let ctx = AppContext::in_memory(AppConfig::default());
        let service = AvailabilityService::new(&ctx);
        let saturday = NaiveDate::from_ymd_opt(2030, 1, 12).unwrap();

        let slots = service.slots_for_doctor(&monday_doctor(), saturday, None).await.unwrap();
        assert!(slots.slots.is_empty());
        assert_eq!(slots.note.as_deref(), Some("Doctor is not available on Saturday"));
    }

    #[tokio::test]
    async fn other_doctors_bookings_are_ignored() {
        let ctx = AppContext::in_memory(AppConfig::default());
        let service = AvailabilityService::new(&ctx);
        let doctor = monday_doctor();

        seed_appointment(&ctx, Uuid::new_v4(), "09:00", "scheduled").await;

        let slots = service.slots_for_doctor(&doctor, monday(), None).await.unwrap();
        assert_eq!(slots.slots.len(), 3);
    }
}

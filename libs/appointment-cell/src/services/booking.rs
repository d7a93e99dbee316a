use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::models::Doctor;
use doctor_cell::services::DoctorService;
use patient_cell::services::PatientService;
use shared_config::AppConfig;
use shared_database::{collections, AppContext, DocumentStore, Filter};
use shared_models::auth::{Role, User};
use shared_models::validation::{Validate, ValidationErrors};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, CancelOutcome,
    CompleteAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::availability::{offered_slots, AvailabilityService};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::{AppointmentLifecycleService, CancellationMode};

/// Accounts that own an appointment, resolved through its patient and
/// doctor records. A side is `None` when its record no longer exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentParties {
    pub patient_user_id: Option<String>,
    pub doctor_user_id: Option<String>,
}

pub struct AppointmentBookingService {
    store: Arc<dyn DocumentStore>,
    config: Arc<AppConfig>,
    doctor_service: DoctorService,
    patient_service: PatientService,
    availability_service: AvailabilityService,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            store: ctx.store.clone(),
            config: ctx.config.clone(),
            doctor_service: DoctorService::new(ctx),
            patient_service: PatientService::new(ctx),
            availability_service: AvailabilityService::new(ctx),
            conflict_service: ConflictDetectionService::new(ctx),
            lifecycle_service: AppointmentLifecycleService::new(),
        }
    }

    /// Creates a `scheduled` appointment for `patient_id`.
    #[instrument(skip(self, request, auth_token), fields(doctor_id = %request.doctor_id, date = %request.date, time = %request.time))]
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        request.validate()?;
        let date = request.parsed_date()?;

        self.patient_service.get_patient(patient_id, auth_token).await?;
        let doctor = self.doctor_service.get_doctor(request.doctor_id, auth_token).await?;
        if !doctor.accepting_appointments {
            warn!("Doctor {} is not accepting appointments", doctor.id);
            return Err(AppointmentError::DoctorNotAccepting);
        }

        self.ensure_bookable(&doctor, date, &request.time, None, auth_token).await?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: doctor.id,
            date,
            time: request.time,
            status: AppointmentStatus::Scheduled,
            appointment_type: request.appointment_type,
            reason: request.reason,
            diagnosis: None,
            treatment_plan: None,
            prescriptions: Vec::new(),
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .store
            .insert(collections::APPOINTMENTS, serde_json::to_value(&appointment)?, auth_token)
            .await
            .inspect_err(|e| warn!("Appointment insert rejected: {}", e))?;

        let appointment: Appointment = serde_json::from_value(stored)?;
        info!("Appointment {} booked for patient {}", appointment.id, patient_id);
        Ok(appointment)
    }

    /// Books on behalf of the patient profile linked to `user_id`.
    pub async fn book_for_account(
        &self,
        user_id: &str,
        request: BookAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let patient = self
            .patient_service
            .find_by_user(user_id, auth_token)
            .await?
            .ok_or(AppointmentError::PatientNotFound)?;

        self.book_appointment(patient.id, request, auth_token).await
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let document = self
            .store
            .find_by_id(collections::APPOINTMENTS, &appointment_id.to_string(), auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        Ok(serde_json::from_value(document)?)
    }

    pub async fn parties(
        &self,
        appointment: &Appointment,
        auth_token: Option<&str>,
    ) -> Result<AppointmentParties, AppointmentError> {
        let patient = self
            .store
            .find_by_id(collections::PATIENTS, &appointment.patient_id.to_string(), auth_token)
            .await?;
        let doctor = self
            .store
            .find_by_id(collections::DOCTORS, &appointment.doctor_id.to_string(), auth_token)
            .await?;

        let owner = |document: Option<Value>| {
            document.and_then(|d| d.get("user_id").and_then(Value::as_str).map(str::to_string))
        };

        Ok(AppointmentParties {
            patient_user_id: owner(patient),
            doctor_user_id: owner(doctor),
        })
    }

    /// Appointments visible to `actor`, ordered by date then time. Accounts
    /// without a profile see nothing.
    pub async fn list_for_actor(
        &self,
        actor: &User,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let filter = match actor.app_role() {
            Role::Admin => None,
            Role::Doctor => match self.doctor_service.find_by_user(&actor.id, auth_token).await? {
                Some(doctor) => Some(Filter::eq("doctor_id", doctor.id.to_string())),
                None => return Ok(Vec::new()),
            },
            Role::Patient => match self.patient_service.find_by_user(&actor.id, auth_token).await? {
                Some(patient) => Some(Filter::eq("patient_id", patient.id.to_string())),
                None => return Ok(Vec::new()),
            },
        };

        let filters: Vec<Filter> = filter.into_iter().collect();
        let mut appointments = self
            .store
            .find(collections::APPOINTMENTS, &filters, auth_token)
            .await?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()?;

        appointments.sort_by(|a, b| (a.date, &a.time).cmp(&(b.date, &b.time)));
        Ok(appointments)
    }

    /// Partial update. Moving to another slot re-runs the booking checks
    /// unless the appointment is being canceled in the same request.
    #[instrument(skip(self, current, request, auth_token), fields(appointment_id = %current.id))]
    pub async fn update_appointment(
        &self,
        current: &Appointment,
        request: UpdateAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        request.validate()?;

        let new_status = request.status.unwrap_or(current.status);
        if request.status.is_some() {
            self.lifecycle_service
                .validate_status_transition(current.status, new_status)?;
        }

        let new_date = request.parsed_date()?.unwrap_or(current.date);
        let new_time = request.time.clone().unwrap_or_else(|| current.time.clone());

        if request.reschedules(current)? && new_status != AppointmentStatus::Canceled {
            let doctor = self.doctor_service.get_doctor(current.doctor_id, auth_token).await?;
            self.ensure_bookable(&doctor, new_date, &new_time, Some(current.id), auth_token)
                .await?;
        }

        let mut update_data = serde_json::Map::new();

        if request.date.is_some() {
            update_data.insert("date".to_string(), json!(new_date));
        }
        if request.time.is_some() {
            update_data.insert("time".to_string(), json!(new_time));
        }
        if let Some(status) = request.status {
            update_data.insert("status".to_string(), json!(status));
        }
        if let Some(appointment_type) = request.appointment_type {
            update_data.insert("appointment_type".to_string(), json!(appointment_type));
        }
        if let Some(reason) = request.reason {
            update_data.insert("reason".to_string(), json!(reason));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self
            .store
            .update(collections::APPOINTMENTS, &current.id.to_string(), Value::Object(update_data), auth_token)
            .await?;

        let updated: Appointment = serde_json::from_value(updated)?;
        if updated.status != current.status {
            info!("Appointment {} moved from {} to {}", updated.id, current.status, updated.status);
        }
        Ok(updated)
    }

    #[instrument(skip(self, current, request, auth_token), fields(appointment_id = %current.id))]
    pub async fn complete_appointment(
        &self,
        current: &Appointment,
        request: CompleteAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        request.validate()?;
        self.lifecycle_service.validate_completion(current.status)?;

        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(AppointmentStatus::Completed));
        update_data.insert("diagnosis".to_string(), json!(request.diagnosis.trim()));
        update_data.insert("prescriptions".to_string(), serde_json::to_value(&request.prescriptions)?);
        if let Some(treatment_plan) = request.treatment_plan {
            update_data.insert("treatment_plan".to_string(), json!(treatment_plan));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self
            .store
            .update(collections::APPOINTMENTS, &current.id.to_string(), Value::Object(update_data), auth_token)
            .await?;

        info!("Appointment {} completed", current.id);
        Ok(serde_json::from_value(updated)?)
    }

    /// Future appointments are kept and marked `canceled`; appointments
    /// dated today or earlier are deleted.
    #[instrument(skip(self, current, auth_token), fields(appointment_id = %current.id))]
    pub async fn cancel_appointment(
        &self,
        current: &Appointment,
        auth_token: Option<&str>,
    ) -> Result<CancelOutcome, AppointmentError> {
        let today = self.config.clinic_today();

        match self.lifecycle_service.cancellation_mode(current.date, today) {
            CancellationMode::SoftCancel => {
                self.lifecycle_service
                    .validate_status_transition(current.status, AppointmentStatus::Canceled)?;

                let update = json!({
                    "status": AppointmentStatus::Canceled,
                    "updated_at": Utc::now(),
                });
                let updated = self
                    .store
                    .update(collections::APPOINTMENTS, &current.id.to_string(), update, auth_token)
                    .await?;

                info!("Appointment {} canceled", current.id);
                Ok(CancelOutcome::Canceled(serde_json::from_value(updated)?))
            }
            CancellationMode::HardDelete => {
                // Removes the visit history too; kept until product decides otherwise.
                warn!(
                    "Hard-deleting appointment {} dated {} (today is {}, status {})",
                    current.id, current.date, today, current.status
                );
                self.store
                    .delete(collections::APPOINTMENTS, &current.id.to_string(), auth_token)
                    .await?;
                Ok(CancelOutcome::Deleted)
            }
        }
    }

    /// Date not in the past, time among the doctor's slots for that day,
    /// and no live appointment already holding it.
    async fn ensure_bookable(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
        time: &str,
        exclude_appointment_id: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<(), AppointmentError> {
        let today = self.config.clinic_today();
        if date < today {
            return Err(ValidationErrors::single("date", "cannot book a date in the past").into());
        }

        let offered = offered_slots(doctor, date, self.availability_service.slot_duration())?;
        if !offered.is_some_and(|slots| slots.iter().any(|slot| slot == time)) {
            warn!("Rejected booking outside the schedule of doctor {}: {} {}", doctor.id, date, time);
            return Err(AppointmentError::SlotUnavailable {
                date,
                time: time.to_string(),
            });
        }

        self.conflict_service
            .ensure_slot_free(doctor.id, date, time, exclude_appointment_id, auth_token)
            .await
    }
}

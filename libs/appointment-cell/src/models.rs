use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use doctor_cell::services::SlotError;
use patient_cell::models::PatientError;
use shared_database::DatabaseError;
use shared_models::validation::{Validate, ValidationErrors};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    /// `"HH:MM"`, one of the doctor's generated slots for `date`.
    pub time: String,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub diagnosis: Option<String>,
    pub treatment_plan: Option<String>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    Upcoming,
    Completed,
    Canceled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Upcoming => "upcoming",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Canceled => "canceled",
            AppointmentStatus::NoShow => "no-show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
    #[default]
    Consultation,
    FollowUp,
    CheckUp,
    Emergency,
    Procedure,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prescription {
    pub medication: String,
    pub dosage: String,
    pub frequency: Option<String>,
    pub duration: Option<String>,
}

/// Open slots for one doctor on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableSlots {
    pub date: NaiveDate,
    pub slots: Vec<String>,
    pub note: Option<String>,
}

/// Result of `DELETE /appointments/{id}`.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Canceled(Appointment),
    Deleted,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBookAppointmentRequest {
    pub patient_id: Uuid,
    #[serde(flatten)]
    pub booking: BookAppointmentRequest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub date: Option<String>,
    pub time: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    #[serde(default)]
    pub diagnosis: String,
    pub treatment_plan: Option<String>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: Option<String>,
}

/// Parses an ISO `YYYY-MM-DD` calendar date.
pub fn parse_calendar_date(field: &str, value: &str) -> Result<NaiveDate, ValidationErrors> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationErrors::single(field, "must be a YYYY-MM-DD date"))
}

impl BookAppointmentRequest {
    pub fn parsed_date(&self) -> Result<NaiveDate, ValidationErrors> {
        parse_calendar_date("date", &self.date)
    }
}

impl UpdateAppointmentRequest {
    pub fn parsed_date(&self) -> Result<Option<NaiveDate>, ValidationErrors> {
        self.date
            .as_deref()
            .map(|date| parse_calendar_date("date", date))
            .transpose()
    }

    /// Whether the request moves the appointment to a different slot.
    pub fn reschedules(&self, current: &Appointment) -> Result<bool, ValidationErrors> {
        let date_changed = self.parsed_date()?.is_some_and(|date| date != current.date);
        let time_changed = self.time.as_ref().is_some_and(|time| *time != current.time);
        Ok(date_changed || time_changed)
    }
}

fn validate_prescriptions(prescriptions: &[Prescription], errors: &mut ValidationErrors) {
    for (i, prescription) in prescriptions.iter().enumerate() {
        let field = format!("prescriptions[{}]", i);
        errors.check(
            !prescription.medication.trim().is_empty() && !prescription.dosage.trim().is_empty(),
            &field,
            "medication and dosage are required",
        );
    }
}

impl Validate for BookAppointmentRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if parse_calendar_date("date", &self.date).is_err() {
            errors.add("date", "must be a YYYY-MM-DD date");
        }
        errors.require_clock_time("time", &self.time);
        errors.into_result()
    }
}

impl Validate for UpdateAppointmentRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.parsed_date().is_err() {
            errors.add("date", "must be a YYYY-MM-DD date");
        }
        if let Some(time) = &self.time {
            errors.require_clock_time("time", time);
        }
        errors.check(
            self.status != Some(AppointmentStatus::Completed),
            "status",
            "use the complete endpoint to finish an appointment",
        );
        errors.into_result()
    }
}

impl Validate for CompleteAppointmentRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(!self.diagnosis.trim().is_empty(), "diagnosis", "diagnosis is required");
        validate_prescriptions(&self.prescriptions, &mut errors);
        errors.into_result()
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("This time slot is already booked")]
    SlotAlreadyBooked,

    #[error("Doctor is not accepting appointments")]
    DoctorNotAccepting,

    #[error("{time} is not an available slot for this doctor on {date}")]
    SlotUnavailable { date: NaiveDate, time: String },

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Doctor schedule is malformed: {0}")]
    Schedule(#[from] SlotError),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for AppointmentError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(_) => AppointmentError::NotFound,
            DatabaseError::UniqueViolation(_) => AppointmentError::SlotAlreadyBooked,
            other => AppointmentError::Database(other),
        }
    }
}

impl From<serde_json::Error> for AppointmentError {
    fn from(err: serde_json::Error) -> Self {
        AppointmentError::Database(DatabaseError::from(err))
    }
}

impl From<DoctorError> for AppointmentError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppointmentError::DoctorNotFound,
            DoctorError::Validation(errors) => AppointmentError::Validation(errors),
            DoctorError::Database(e) => AppointmentError::Database(e),
            other => AppointmentError::Database(DatabaseError::Request(other.to_string())),
        }
    }
}

impl From<PatientError> for AppointmentError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppointmentError::PatientNotFound,
            PatientError::Validation(errors) => AppointmentError::Validation(errors),
            PatientError::Database(e) => AppointmentError::Database(e),
            other => AppointmentError::Database(DatabaseError::Request(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn statuses_use_kebab_case_names() {
        assert_eq!(serde_json::to_value(AppointmentStatus::NoShow).unwrap(), "no-show");
        let status: AppointmentStatus = serde_json::from_value(json!("upcoming")).unwrap();
        assert_eq!(status, AppointmentStatus::Upcoming);
        assert_eq!(AppointmentStatus::NoShow.to_string(), "no-show");
    }

    #[test]
    fn appointment_types_use_kebab_case_names() {
        let kind: AppointmentType = serde_json::from_value(json!("follow-up")).unwrap();
        assert_eq!(kind, AppointmentType::FollowUp);
        assert_eq!(serde_json::to_value(AppointmentType::CheckUp).unwrap(), "check-up");
    }

    #[test]
    fn released_statuses_match_store_filter() {
        let released = [AppointmentStatus::Canceled, AppointmentStatus::NoShow].map(|s| s.as_str());
        assert_eq!(released, shared_database::RELEASED_STATUSES);
    }

    #[test]
    fn booking_request_checks_date_and_time() {
        let request = BookAppointmentRequest {
            doctor_id: Uuid::new_v4(),
            date: "07/01/2030".into(),
            time: "9:30".into(),
            appointment_type: AppointmentType::default(),
            reason: None,
            notes: None,
        };

        let errors = request.validate().unwrap_err();
        let fields: Vec<_> = errors.fields().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["date", "time"]);
    }

    #[test]
    fn admin_request_flattens_booking_fields() {
        let request: AdminBookAppointmentRequest = serde_json::from_value(json!({
            "patient_id": Uuid::nil(),
            "doctor_id": Uuid::nil(),
            "date": "2030-01-07",
            "time": "09:30"
        }))
        .unwrap();

        assert_eq!(request.booking.time, "09:30");
        assert_eq!(request.booking.appointment_type, AppointmentType::Consultation);
    }

    #[test]
    fn completion_requires_diagnosis() {
        let request = CompleteAppointmentRequest { diagnosis: "   ".into(), ..Default::default() };
        assert_eq!(request.validate().unwrap_err().fields()[0].field, "diagnosis");
    }

    #[test]
    fn update_cannot_set_completed() {
        let request = UpdateAppointmentRequest {
            status: Some(AppointmentStatus::Completed),
            ..Default::default()
        };
        assert_eq!(request.validate().unwrap_err().fields()[0].field, "status");
    }
}

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::validation::{Validate, ValidationErrors};

use crate::services::slots::parse_clock_time;

// ==============================================================================
// CORE DOCTOR MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    pub license_number: String,
    #[serde(default)]
    pub weekly_availability: Vec<WeeklyAvailability>,
    pub accepting_appointments: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Working window for `day`. Only the first entry for a day counts.
    pub fn availability_on(&self, day: DayOfWeek) -> Option<&WeeklyAvailability> {
        self.weekly_availability.iter().find(|window| window.day == day)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

/// Indexed by days since Sunday.
const DAYS_FROM_SUNDAY: [DayOfWeek; 7] = [
    DayOfWeek::Sunday,
    DayOfWeek::Monday,
    DayOfWeek::Tuesday,
    DayOfWeek::Wednesday,
    DayOfWeek::Thursday,
    DayOfWeek::Friday,
    DayOfWeek::Saturday,
];

impl DayOfWeek {
    /// Weekday of a calendar date. The date carries no timezone, so the
    /// result does not depend on the server's locale or offset.
    pub fn from_date(date: NaiveDate) -> Self {
        DAYS_FROM_SUNDAY[date.weekday().num_days_from_sunday() as usize]
    }

    pub fn name(&self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "Sunday",
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Recurring working hours, `"HH:MM"` on both ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyAvailability {
    pub day: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    /// Account to attach the profile to. Only honoured for admins; doctors
    /// always register themselves.
    pub user_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: String,
    pub license_number: String,
    #[serde(default)]
    pub weekly_availability: Vec<WeeklyAvailability>,
    pub accepting_appointments: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub specialty: Option<String>,
    pub license_number: Option<String>,
    pub weekly_availability: Option<Vec<WeeklyAvailability>>,
    pub accepting_appointments: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorQuery {
    pub specialty: Option<String>,
}

fn validate_windows(windows: &[WeeklyAvailability], errors: &mut ValidationErrors) {
    for (i, window) in windows.iter().enumerate() {
        let field = format!("weekly_availability[{}]", i);
        match (parse_clock_time(&window.start_time), parse_clock_time(&window.end_time)) {
            (Ok(start), Ok(end)) => {
                errors.check(start < end, &field, "start_time must be before end_time");
            }
            _ => errors.add(&field, "times must be 24-hour HH:MM values"),
        }
    }
}

impl Validate for CreateDoctorRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_non_empty("first_name", &self.first_name);
        errors.require_non_empty("last_name", &self.last_name);
        errors.require_email("email", &self.email);
        errors.require_non_empty("specialty", &self.specialty);
        errors.require_non_empty("license_number", &self.license_number);
        validate_windows(&self.weekly_availability, &mut errors);
        errors.into_result()
    }
}

impl Validate for UpdateDoctorRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(first_name) = &self.first_name {
            errors.require_non_empty("first_name", first_name);
        }
        if let Some(last_name) = &self.last_name {
            errors.require_non_empty("last_name", last_name);
        }
        if let Some(email) = &self.email {
            errors.require_email("email", email);
        }
        if let Some(specialty) = &self.specialty {
            errors.require_non_empty("specialty", specialty);
        }
        if let Some(license_number) = &self.license_number {
            errors.require_non_empty("license_number", license_number);
        }
        if let Some(windows) = &self.weekly_availability {
            validate_windows(windows, &mut errors);
        }
        errors.into_result()
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("A doctor profile already exists for this account")]
    AlreadyRegistered,

    #[error("License number is already registered")]
    LicenseNumberTaken,

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for DoctorError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(_) => DoctorError::NotFound,
            DatabaseError::UniqueViolation(index) if index.contains("license_number") => {
                DoctorError::LicenseNumberTaken
            }
            DatabaseError::UniqueViolation(_) => DoctorError::AlreadyRegistered,
            other => DoctorError::Database(other),
        }
    }
}

impl From<serde_json::Error> for DoctorError {
    fn from(err: serde_json::Error) -> Self {
        DoctorError::Database(DatabaseError::from(err))
    }
}

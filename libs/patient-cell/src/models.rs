use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate};

use shared_database::DatabaseError;
use shared_models::validation::{Validate, ValidationErrors};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub medical_info: MedicalInfo,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedicalInfo {
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub chronic_conditions: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    /// Honoured only when an admin registers a patient on someone's behalf.
    pub user_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub medical_info: MedicalInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub medical_info: Option<MedicalInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientSearchQuery {
    pub email: Option<String>,
}

fn check_birth_date(date_of_birth: Option<NaiveDate>, errors: &mut ValidationErrors) {
    if let Some(dob) = date_of_birth {
        errors.check(dob <= Utc::now().date_naive(), "date_of_birth", "cannot be in the future");
    }
}

impl Validate for CreatePatientRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_non_empty("first_name", &self.first_name);
        errors.require_non_empty("last_name", &self.last_name);
        errors.require_email("email", &self.email);
        check_birth_date(self.date_of_birth, &mut errors);
        errors.into_result()
    }
}

impl Validate for UpdatePatientRequest {
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
        check_birth_date(self.date_of_birth, &mut errors);
        errors.into_result()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("A patient profile already exists for this account")]
    AlreadyRegistered,

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl From<DatabaseError> for PatientError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(_) => PatientError::NotFound,
            DatabaseError::UniqueViolation(_) => PatientError::AlreadyRegistered,
            other => PatientError::Database(other),
        }
    }
}

impl From<serde_json::Error> for PatientError {
    fn from(err: serde_json::Error) -> Self {
        PatientError::Database(DatabaseError::from(err))
    }
}

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{collections, AppContext, DocumentStore, Filter};
use shared_models::validation::Validate;

use crate::models::{CreateDoctorRequest, Doctor, DoctorError, DoctorQuery, UpdateDoctorRequest};

pub struct DoctorService {
    store: Arc<dyn DocumentStore>,
}

impl DoctorService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            store: ctx.store.clone(),
        }
    }

    pub async fn create_doctor(
        &self,
        user_id: &str,
        request: CreateDoctorRequest,
        auth_token: Option<&str>,
    ) -> Result<Doctor, DoctorError> {
        request.validate()?;
        debug!("Registering doctor profile for account {}", user_id);

        let now = Utc::now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email,
            specialty: request.specialty.trim().to_string(),
            license_number: request.license_number.trim().to_string(),
            weekly_availability: request.weekly_availability,
            accepting_appointments: request.accepting_appointments.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .store
            .insert(collections::DOCTORS, serde_json::to_value(&doctor)?, auth_token)
            .await?;

        let doctor: Doctor = serde_json::from_value(stored)?;
        info!("Doctor profile created with ID: {}", doctor.id);
        Ok(doctor)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        let document = self
            .store
            .find_by_id(collections::DOCTORS, &doctor_id.to_string(), auth_token)
            .await?
            .ok_or(DoctorError::NotFound)?;

        Ok(serde_json::from_value(document)?)
    }

    pub async fn find_by_user(&self, user_id: &str, auth_token: Option<&str>) -> Result<Option<Doctor>, DoctorError> {
        let mut found = self
            .store
            .find(collections::DOCTORS, &[Filter::eq("user_id", user_id)], auth_token)
            .await?;

        if found.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(found.swap_remove(0))?))
    }

    pub async fn list_doctors(&self, query: DoctorQuery, auth_token: Option<&str>) -> Result<Vec<Doctor>, DoctorError> {
        let mut filters = Vec::new();
        if let Some(specialty) = query.specialty.filter(|s| !s.trim().is_empty()) {
            filters.push(Filter::eq("specialty", specialty));
        }

        let documents = self.store.find(collections::DOCTORS, &filters, auth_token).await?;
        let mut doctors = documents
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Doctor>, _>>()?;

        doctors.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(doctors)
    }

    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        auth_token: Option<&str>,
    ) -> Result<Doctor, DoctorError> {
        request.validate()?;
        debug!("Updating doctor: {}", doctor_id);

        let mut update_data = serde_json::Map::new();

        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name.trim()));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name.trim()));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(specialty) = request.specialty {
            update_data.insert("specialty".to_string(), json!(specialty.trim()));
        }
        if let Some(license_number) = request.license_number {
            update_data.insert("license_number".to_string(), json!(license_number.trim()));
        }
        if let Some(windows) = request.weekly_availability {
            update_data.insert("weekly_availability".to_string(), serde_json::to_value(windows)?);
        }
        if let Some(accepting) = request.accepting_appointments {
            update_data.insert("accepting_appointments".to_string(), json!(accepting));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self
            .store
            .update(collections::DOCTORS, &doctor_id.to_string(), Value::Object(update_data), auth_token)
            .await?;

        Ok(serde_json::from_value(updated)?)
    }

    /// Removes the profile. Appointments referencing the doctor are left
    /// untouched.
    pub async fn delete_doctor(&self, doctor_id: Uuid, auth_token: Option<&str>) -> Result<(), DoctorError> {
        self.store
            .delete(collections::DOCTORS, &doctor_id.to_string(), auth_token)
            .await?;

        info!("Doctor {} deleted", doctor_id);
        Ok(())
    }
}

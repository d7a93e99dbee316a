use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{collections, AppContext, DocumentStore, Filter};
use shared_models::validation::Validate;

use crate::models::{CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest};

pub struct PatientService {
    store: Arc<dyn DocumentStore>,
}

impl PatientService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            store: ctx.store.clone(),
        }
    }

    pub async fn create_patient(
        &self,
        user_id: &str,
        request: CreatePatientRequest,
        auth_token: Option<&str>,
    ) -> Result<Patient, PatientError> {
        request.validate()?;
        debug!("Creating patient profile for account {}", user_id);

        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email,
            phone_number: request.phone_number,
            date_of_birth: request.date_of_birth,
            gender: request.gender,
            address: request.address,
            medical_info: request.medical_info,
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .store
            .insert(collections::PATIENTS, serde_json::to_value(&patient)?, auth_token)
            .await?;

        let patient: Patient = serde_json::from_value(stored)?;
        info!("Patient profile created with ID: {}", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: Uuid, auth_token: Option<&str>) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        let document = self
            .store
            .find_by_id(collections::PATIENTS, &patient_id.to_string(), auth_token)
            .await?
            .ok_or(PatientError::NotFound)?;

        Ok(serde_json::from_value(document)?)
    }

    /// Profile linked to an account, if the account has registered one.
    pub async fn find_by_user(&self, user_id: &str, auth_token: Option<&str>) -> Result<Option<Patient>, PatientError> {
        let mut found = self
            .store
            .find(collections::PATIENTS, &[Filter::eq("user_id", user_id)], auth_token)
            .await?;

        if found.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(found.swap_remove(0))?))
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: Option<&str>,
    ) -> Result<Patient, PatientError> {
        request.validate()?;
        debug!("Updating patient profile: {}", patient_id);

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
        if let Some(phone_number) = request.phone_number {
            update_data.insert("phone_number".to_string(), json!(phone_number));
        }
        if let Some(date_of_birth) = request.date_of_birth {
            update_data.insert("date_of_birth".to_string(), json!(date_of_birth));
        }
        if let Some(gender) = request.gender {
            update_data.insert("gender".to_string(), json!(gender));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(medical_info) = request.medical_info {
            update_data.insert("medical_info".to_string(), serde_json::to_value(medical_info)?);
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self
            .store
            .update(collections::PATIENTS, &patient_id.to_string(), Value::Object(update_data), auth_token)
            .await?;

        Ok(serde_json::from_value(updated)?)
    }

    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        auth_token: Option<&str>,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Searching patients with query: {:?}", query);

        let mut filters = Vec::new();
        if let Some(email) = query.email.filter(|e| !e.trim().is_empty()) {
            filters.push(Filter::eq("email", email));
        }

        let mut patients = self
            .store
            .find(collections::PATIENTS, &filters, auth_token)
            .await?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Patient>, _>>()?;

        patients.sort_by(|a, b| (&a.last_name, &a.first_name).cmp(&(&b.last_name, &b.first_name)));
        Ok(patients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MedicalInfo;
    use assert_matches::assert_matches;
    use shared_config::AppConfig;

    fn request() -> CreatePatientRequest {
        CreatePatientRequest {
            user_id: None,
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: "jane@example.com".into(),
            phone_number: None,
            date_of_birth: None,
            gender: None,
            address: None,
            medical_info: MedicalInfo {
                allergies: vec!["penicillin".into()],
                ..MedicalInfo::default()
            },
        }
    }

    #[tokio::test]
    async fn account_links_to_exactly_one_patient() {
        let ctx = AppContext::in_memory(AppConfig::default());
        let service = PatientService::new(&ctx);

        let patient = service.create_patient("acct-1", request(), None).await.unwrap();
        assert_eq!(service.find_by_user("acct-1", None).await.unwrap(), Some(patient));
        assert_matches!(
            service.create_patient("acct-1", request(), None).await,
            Err(PatientError::AlreadyRegistered)
        );
    }

    #[tokio::test]
    async fn update_keeps_untouched_fields() {
        let ctx = AppContext::in_memory(AppConfig::default());
        let service = PatientService::new(&ctx);
        let patient = service.create_patient("acct-1", request(), None).await.unwrap();

        let updated = service
            .update_patient(
                patient.id,
                UpdatePatientRequest { phone_number: Some("555-0100".into()), ..Default::default() },
                None,
            )
            .await
            .unwrap();

        assert_eq!(updated.phone_number.as_deref(), Some("555-0100"));
        assert_eq!(updated.medical_info.allergies, vec!["penicillin".to_string()]);
        assert_eq!(updated.email, patient.email);
    }
}

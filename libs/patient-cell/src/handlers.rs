use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::{extract::WithRejection, TypedHeader};
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_database::AppContext;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_models::validation::ValidationErrors;
use shared_utils::extractor::{AppJson, AppPath, AppQuery};
use shared_utils::policy::{authorize, require_role, Capability, Ownership};

use crate::models::{CreatePatientRequest, PatientError, PatientSearchQuery, UpdatePatientRequest};
use crate::services::PatientService;

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound("Patient not found".to_string()),
            PatientError::AlreadyRegistered => AppError::Conflict(err.to_string()),
            PatientError::Validation(errors) => AppError::ValidationError(errors),
            PatientError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

#[axum::debug_handler]
pub async fn create_patient(
    State(ctx): State<Arc<AppContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): AppJson<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Patient, Role::Admin])?;

    let owner = if user.is_admin() {
        request
            .user_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ValidationErrors::single("user_id", "user_id is required when an admin registers a patient"))?
    } else {
        user.id.clone()
    };

    let patient = PatientService::new(&ctx)
        .create_patient(&owner, request, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": patient,
        "message": "Patient profile created successfully"
    })))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Query(query), _): AppQuery<PatientSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor, Role::Admin])?;
    debug!("Patient search by {}", user.id);

    let patients = PatientService::new(&ctx)
        .search_patients(query, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(ctx): State<Arc<AppContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient = PatientService::new(&ctx)
        .find_by_user(&user.id, Some(auth.token()))
        .await?
        .ok_or_else(|| AppError::NotFound("Patient profile not found".to_string()))?;

    Ok(Json(json!({ "success": true, "data": patient })))
}

/// Owners and admins, plus any doctor since clinicians need the record to
/// treat the patient.
#[axum::debug_handler]
pub async fn get_patient(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Path(patient_id), _): AppPath<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient = PatientService::new(&ctx)
        .get_patient(patient_id, Some(auth.token()))
        .await?;

    if user.app_role() != Role::Doctor {
        authorize(&user, &Ownership::patient(&patient.user_id), Capability::View)?;
    }

    Ok(Json(json!({ "success": true, "data": patient })))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Path(patient_id), _): AppPath<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): AppJson<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&ctx);
    let token = Some(auth.token());

    let patient = service.get_patient(patient_id, token).await?;
    authorize(&user, &Ownership::patient(&patient.user_id), Capability::Modify)?;

    let updated = service.update_patient(patient_id, request, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": updated,
        "message": "Patient profile updated successfully"
    })))
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::{extract::WithRejection, TypedHeader};
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_database::AppContext;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_models::validation::ValidationErrors;
use shared_utils::extractor::{AppJson, AppPath, AppQuery};
use shared_utils::policy::{authorize, require_role, Capability, Ownership};

use crate::models::{CreateDoctorRequest, DoctorError, DoctorQuery, UpdateDoctorRequest};
use crate::services::DoctorService;

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
            DoctorError::AlreadyRegistered | DoctorError::LicenseNumberTaken => {
                AppError::Conflict(err.to_string())
            }
            DoctorError::Validation(errors) => AppError::ValidationError(errors),
            DoctorError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Query(query), _): AppQuery<DoctorQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = DoctorService::new(&ctx).list_doctors(query, None).await?;

    Ok(Json(json!({
        "success": true,
        "data": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Path(doctor_id), _): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&ctx).get_doctor(doctor_id, None).await?;

    Ok(Json(json!({ "success": true, "data": doctor })))
}

// ==============================================================================
// AUTHENTICATED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(ctx): State<Arc<AppContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): AppJson<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor, Role::Admin])?;

    let owner = if user.is_admin() {
        request
            .user_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ValidationErrors::single("user_id", "user_id is required when an admin registers a doctor"))?
    } else {
        user.id.clone()
    };

    let doctor = DoctorService::new(&ctx)
        .create_doctor(&owner, request, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": doctor,
        "message": "Doctor profile created successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_my_profile(
    State(ctx): State<Arc<AppContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor = DoctorService::new(&ctx)
        .find_by_user(&user.id, Some(auth.token()))
        .await?
        .ok_or_else(|| AppError::NotFound("Doctor profile not found".to_string()))?;

    Ok(Json(json!({ "success": true, "data": doctor })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Path(doctor_id), _): AppPath<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): AppJson<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&ctx);
    let token = Some(auth.token());

    let doctor = service.get_doctor(doctor_id, token).await?;
    authorize(&user, &Ownership::doctor(&doctor.user_id), Capability::Modify)?;

    let updated = service.update_doctor(doctor_id, request, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": updated,
        "message": "Doctor profile updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Path(doctor_id), _): AppPath<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    DoctorService::new(&ctx).delete_doctor(doctor_id, Some(auth.token())).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Doctor deleted successfully"
    })))
}

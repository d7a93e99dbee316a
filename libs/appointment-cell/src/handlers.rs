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

use crate::models::{
    parse_calendar_date, AdminBookAppointmentRequest, Appointment, AppointmentError, AvailableSlotsQuery,
    BookAppointmentRequest, CancelOutcome, CompleteAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::{AppointmentBookingService, AvailabilityService};

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
            AppointmentError::PatientNotFound => AppError::NotFound("Patient profile not found".to_string()),
            AppointmentError::SlotAlreadyBooked => AppError::Conflict(err.to_string()),
            AppointmentError::DoctorNotAccepting
            | AppointmentError::SlotUnavailable { .. }
            | AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(err.to_string()),
            AppointmentError::Validation(errors) => AppError::ValidationError(errors),
            AppointmentError::Schedule(e) => AppError::Internal(e.to_string()),
            AppointmentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}

/// Loads the appointment and checks `capability` against its owners.
async fn load_authorized(
    service: &AppointmentBookingService,
    appointment_id: Uuid,
    user: &User,
    capability: Capability,
    token: Option<&str>,
) -> Result<Appointment, AppError> {
    let appointment = service.get_appointment(appointment_id, token).await?;

    if !user.is_admin() {
        let parties = service.parties(&appointment, token).await?;
        let ownership = Ownership {
            patient_user_id: parties.patient_user_id.as_deref(),
            doctor_user_id: parties.doctor_user_id.as_deref(),
        };
        authorize(user, &ownership, capability)?;
    }

    Ok(appointment)
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Path(doctor_id), _): AppPath<Uuid>,
    WithRejection(Query(query), _): AppQuery<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let date = match query.date.as_deref().map(str::trim) {
        Some(date) if !date.is_empty() => parse_calendar_date("date", date)?,
        _ => return Err(ValidationErrors::single("date", "date query parameter is required (YYYY-MM-DD)").into()),
    };

    let (doctor, availability) = AvailabilityService::new(&ctx)
        .available_slots(doctor_id, date, None)
        .await?;

    let mut data = json!({
        "date": availability.date,
        "doctor": {
            "id": doctor.id,
            "name": doctor.full_name(),
            "specialty": doctor.specialty,
        },
        "availableSlots": availability.slots,
    });
    if let Some(note) = availability.note {
        data["note"] = json!(note);
    }

    Ok(Json(json!({ "success": true, "data": data })))
}

// ==============================================================================
// AUTHENTICATED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(ctx): State<Arc<AppContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): AppJson<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Patient])?;

    let appointment = AppointmentBookingService::new(&ctx)
        .book_for_account(&user.id, request, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn admin_book_appointment(
    State(ctx): State<Arc<AppContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): AppJson<AdminBookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Admin])?;

    let appointment = AppointmentBookingService::new(&ctx)
        .book_appointment(request.patient_id, request.booking, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(ctx): State<Arc<AppContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = AppointmentBookingService::new(&ctx)
        .list_for_actor(&user, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Path(appointment_id), _): AppPath<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&ctx);
    let appointment = load_authorized(&service, appointment_id, &user, Capability::View, Some(auth.token())).await?;

    Ok(Json(json!({ "success": true, "data": appointment })))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Path(appointment_id), _): AppPath<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): AppJson<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&ctx);
    let token = Some(auth.token());

    let current = load_authorized(&service, appointment_id, &user, Capability::Modify, token).await?;
    let updated = service.update_appointment(&current, request, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": updated,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Path(appointment_id), _): AppPath<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    WithRejection(Json(request), _): AppJson<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &[Role::Doctor, Role::Admin])?;

    let service = AppointmentBookingService::new(&ctx);
    let token = Some(auth.token());

    let current = load_authorized(&service, appointment_id, &user, Capability::Complete, token).await?;
    let completed = service.complete_appointment(&current, request, token).await?;

    Ok(Json(json!({
        "success": true,
        "data": completed,
        "message": "Appointment completed successfully"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(ctx): State<Arc<AppContext>>,
    WithRejection(Path(appointment_id), _): AppPath<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentBookingService::new(&ctx);
    let token = Some(auth.token());

    let current = load_authorized(&service, appointment_id, &user, Capability::Remove, token).await?;

    let body = match service.cancel_appointment(&current, token).await? {
        CancelOutcome::Canceled(appointment) => json!({
            "success": true,
            "data": appointment,
            "message": "Appointment canceled successfully"
        }),
        CancelOutcome::Deleted => json!({
            "success": true,
            "message": "Appointment deleted successfully"
        }),
    };

    Ok(Json(body))
}

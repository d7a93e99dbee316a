use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, AppointmentType, BookAppointmentRequest};
use appointment_cell::services::AppointmentBookingService;
use shared_config::AppConfig;
use shared_database::AppContext;

fn context_for(server: &MockServer) -> Arc<AppContext> {
    Arc::new(AppContext::from_config(AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        ..AppConfig::default()
    }))
}

async fn mount_profiles(server: &MockServer, patient_id: Uuid, doctor_id: Uuid) {
    let now = Utc::now();
    let windows: Vec<_> = ["Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"]
        .iter()
        .map(|day| json!({ "day": day, "start_time": "09:00", "end_time": "17:00" }))
        .collect();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": patient_id,
            "user_id": "patient-account",
            "first_name": "Jane",
            "last_name": "Doe",
            "email": "jane@example.com",
            "created_at": now,
            "updated_at": now
        }])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": doctor_id,
            "user_id": "doctor-account",
            "first_name": "Gregory",
            "last_name": "House",
            "email": "house@example.com",
            "specialty": "Diagnostics",
            "license_number": "MD-1",
            "weekly_availability": windows,
            "accepting_appointments": true,
            "created_at": now,
            "updated_at": now
        }])))
        .mount(server)
        .await;
}

fn request(doctor_id: Uuid, config: &AppConfig) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id,
        date: (config.clinic_today() + Duration::days(7)).to_string(),
        time: "09:00".into(),
        appointment_type: AppointmentType::Consultation,
        reason: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_guard_queries_live_appointments_for_the_slot() {
    let server = MockServer::start().await;
    let ctx = context_for(&server);
    let (patient_id, doctor_id) = (Uuid::new_v4(), Uuid::new_v4());
    mount_profiles(&server, patient_id, doctor_id).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("time", "eq.09:00"))
        .and(query_param("status", "not.in.(\"canceled\",\"no-show\")"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4(), "time": "09:00" }])))
        .expect(1)
        .mount(&server)
        .await;

    let result = AppointmentBookingService::new(&ctx)
        .book_appointment(patient_id, request(doctor_id, &ctx.config), Some("user-jwt"))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotAlreadyBooked));
}

#[tokio::test]
async fn test_unique_index_violation_is_reported_as_booked_slot() {
    let server = MockServer::start().await;
    let ctx = context_for(&server);
    let (patient_id, doctor_id) = (Uuid::new_v4(), Uuid::new_v4());
    mount_profiles(&server, patient_id, doctor_id).await;

    // The read-side check sees a free slot; a concurrent insert won the index.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_live_slot_unique\""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = AppointmentBookingService::new(&ctx)
        .book_appointment(patient_id, request(doctor_id, &ctx.config), Some("user-jwt"))
        .await;

    assert_matches!(result, Err(AppointmentError::SlotAlreadyBooked));
}

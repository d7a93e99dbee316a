use std::sync::Arc;

use tracing::{info, warn};

use shared_config::AppConfig;

use crate::memory::MemoryStore;
use crate::store::{DocumentStore, Filter, UniqueIndex};
use crate::supabase::SupabaseClient;

pub mod collections {
    pub const DOCTORS: &str = "doctors";
    pub const PATIENTS: &str = "patients";
    pub const APPOINTMENTS: &str = "appointments";
}

/// Appointment statuses that no longer hold their slot.
pub const RELEASED_STATUSES: [&str; 2] = ["canceled", "no-show"];

/// Everything a handler needs, built once at startup and shared as axum
/// state.
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppContext {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Remote store when Supabase is configured, in-process store otherwise.
    pub fn from_config(config: AppConfig) -> Self {
        if config.is_database_configured() {
            info!("Using Supabase document store at {}", config.supabase_url);
            let store = Arc::new(SupabaseClient::new(&config));
            Self::new(config, store)
        } else {
            warn!("Supabase not configured, records will only live in memory");
            Self::in_memory(config)
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        let store = default_unique_indexes()
            .into_iter()
            .fold(MemoryStore::new(), MemoryStore::with_unique_index);
        Self::new(config, Arc::new(store))
    }

    /// Neither store owns a background task or an open handle; the reqwest
    /// pool closes once the last `Arc` is dropped.
    pub fn shutdown(&self) {
        info!("Releasing application context");
    }
}

/// Mirrors `migrations/001_appointment_slot_unique.sql`.
pub fn default_unique_indexes() -> Vec<UniqueIndex> {
    vec![
        UniqueIndex::new(
            "appointments_live_slot_unique",
            collections::APPOINTMENTS,
            &["doctor_id", "date", "time"],
        )
        .scoped(Filter::not_in("status", RELEASED_STATUSES)),
        UniqueIndex::new("doctors_license_number_unique", collections::DOCTORS, &["license_number"]),
        UniqueIndex::new("doctors_user_id_unique", collections::DOCTORS, &["user_id"]),
        UniqueIndex::new("patients_user_id_unique", collections::PATIENTS, &["user_id"]),
    ]
}

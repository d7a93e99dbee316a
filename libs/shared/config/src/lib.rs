use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use tracing::warn;

pub const DEFAULT_SLOT_DURATION_MINUTES: u32 = 30;
pub const MAX_SLOT_DURATION_MINUTES: u32 = 24 * 60;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub port: u16,
    pub slot_duration_minutes: u32,
    /// Offset from UTC used to decide what "today" is for the clinic.
    pub clinic_utc_offset_minutes: i32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using in-memory document store");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            port: parse_or_default("PORT", DEFAULT_PORT),
            slot_duration_minutes: parse_or_default("SLOT_DURATION_MINUTES", DEFAULT_SLOT_DURATION_MINUTES),
            clinic_utc_offset_minutes: parse_or_default("CLINIC_UTC_OFFSET_MINUTES", 0),
        };

        if !(1..=MAX_SLOT_DURATION_MINUTES).contains(&config.slot_duration_minutes) {
            warn!(
                "SLOT_DURATION_MINUTES must be between 1 and {}, falling back to {}",
                MAX_SLOT_DURATION_MINUTES, DEFAULT_SLOT_DURATION_MINUTES
            );
        }

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// True when a remote PostgREST store should back the application.
    pub fn is_database_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn slot_duration(&self) -> u32 {
        if (1..=MAX_SLOT_DURATION_MINUTES).contains(&self.slot_duration_minutes) {
            self.slot_duration_minutes
        } else {
            DEFAULT_SLOT_DURATION_MINUTES
        }
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        self.clinic_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                warn!("CLINIC_UTC_OFFSET_MINUTES out of range, using UTC");
                Utc.fix()
            })
    }

    /// Current calendar date in the clinic's timezone.
    pub fn clinic_today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.clinic_offset()).date_naive()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            port: DEFAULT_PORT,
            slot_duration_minutes: DEFAULT_SLOT_DURATION_MINUTES,
            clinic_utc_offset_minutes: 0,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

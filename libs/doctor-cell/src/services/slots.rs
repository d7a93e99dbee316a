use thiserror::Error;

use shared_config::MAX_SLOT_DURATION_MINUTES;
use shared_models::validation::is_valid_clock_time;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("'{0}' is not a 24-hour HH:MM time")]
    InvalidTime(String),

    #[error("Slot duration must be between 1 and {} minutes", MAX_SLOT_DURATION_MINUTES)]
    InvalidDuration,
}

/// Minutes since midnight for an `"HH:MM"` label.
pub fn parse_clock_time(value: &str) -> Result<u32, SlotError> {
    if !is_valid_clock_time(value) {
        return Err(SlotError::InvalidTime(value.to_string()));
    }

    let (hours, minutes) = value
        .split_once(':')
        .ok_or_else(|| SlotError::InvalidTime(value.to_string()))?;
    let hours: u32 = hours.parse().map_err(|_| SlotError::InvalidTime(value.to_string()))?;
    let minutes: u32 = minutes.parse().map_err(|_| SlotError::InvalidTime(value.to_string()))?;

    Ok(hours * 60 + minutes)
}

pub fn format_clock_time(minutes_since_midnight: u32) -> String {
    format!("{:02}:{:02}", minutes_since_midnight / 60, minutes_since_midnight % 60)
}

/// Bookable labels in `[start, end)`, `duration_minutes` apart.
///
/// A slot is only offered when it ends by `end`, so a window that is not a
/// multiple of the duration leaves its trailing gap unused.
pub fn generate_slots(start: &str, end: &str, duration_minutes: u32) -> Result<Vec<String>, SlotError> {
    if duration_minutes == 0 || duration_minutes > MAX_SLOT_DURATION_MINUTES {
        return Err(SlotError::InvalidDuration);
    }

    let start = parse_clock_time(start)?;
    let end = parse_clock_time(end)?;

    let mut slots = Vec::new();
    let mut current = start;
    while let Some(slot_end) = current.checked_add(duration_minutes).filter(|slot_end| *slot_end <= end) {
        slots.push(format_clock_time(current));
        current = slot_end;
    }

    Ok(slots)
}

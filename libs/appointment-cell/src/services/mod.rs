pub mod availability;
pub mod booking;
pub mod conflict;
pub mod lifecycle;

pub use availability::AvailabilityService;
pub use booking::{AppointmentBookingService, AppointmentParties};
pub use conflict::ConflictDetectionService;
pub use lifecycle::{AppointmentLifecycleService, CancellationMode};

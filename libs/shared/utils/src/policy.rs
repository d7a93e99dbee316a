use shared_models::auth::{Role, User};
use shared_models::error::AppError;

/// What the caller wants to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    View,
    Modify,
    Remove,
    /// Clinical sign-off; never granted to the owning patient.
    Complete,
}

impl Capability {
    fn verb(self) -> &'static str {
        match self {
            Capability::View => "view",
            Capability::Modify => "update",
            Capability::Remove => "delete",
            Capability::Complete => "complete",
        }
    }
}

/// Accounts attached to a resource. Either side may be absent, e.g. a
/// patient record has no assigned doctor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ownership<'a> {
    pub patient_user_id: Option<&'a str>,
    pub doctor_user_id: Option<&'a str>,
}

impl<'a> Ownership<'a> {
    pub fn appointment(patient_user_id: &'a str, doctor_user_id: &'a str) -> Self {
        Self {
            patient_user_id: Some(patient_user_id),
            doctor_user_id: Some(doctor_user_id),
        }
    }

    pub fn patient(patient_user_id: &'a str) -> Self {
        Self { patient_user_id: Some(patient_user_id), doctor_user_id: None }
    }

    pub fn doctor(doctor_user_id: &'a str) -> Self {
        Self { patient_user_id: None, doctor_user_id: Some(doctor_user_id) }
    }
}

/// Single ownership-or-admin rule shared by every route.
pub fn authorize(actor: &User, resource: &Ownership<'_>, capability: Capability) -> Result<(), AppError> {
    let role = actor.app_role();
    if role == Role::Admin {
        return Ok(());
    }

    let is_owner = |owner: Option<&str>| owner == Some(actor.id.as_str());
    let is_patient = role == Role::Patient && is_owner(resource.patient_user_id);
    let is_doctor = role == Role::Doctor && is_owner(resource.doctor_user_id);

    let allowed = match capability {
        Capability::View | Capability::Modify | Capability::Remove => is_patient || is_doctor,
        Capability::Complete => is_doctor,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Not authorized to {} this resource", capability.verb())))
    }
}

/// Role gate for routes that are not tied to one resource.
pub fn require_role(actor: &User, allowed: &[Role]) -> Result<(), AppError> {
    let role = actor.app_role();
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("Role {} cannot perform this action", role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestUser;
    use assert_matches::assert_matches;

    #[test]
    fn owning_patient_and_assigned_doctor_can_view() {
        let patient = TestUser::patient("p@example.com").to_user();
        let doctor = TestUser::doctor("d@example.com").to_user();
        let resource = Ownership::appointment(&patient.id, &doctor.id);

        assert!(authorize(&patient, &resource, Capability::View).is_ok());
        assert!(authorize(&doctor, &resource, Capability::Modify).is_ok());
    }

    #[test]
    fn patient_cannot_complete_even_when_owner() {
        let patient = TestUser::patient("p@example.com").to_user();
        let resource = Ownership::appointment(&patient.id, "someone-else");

        assert_matches!(
            authorize(&patient, &resource, Capability::Complete),
            Err(AppError::Forbidden(_))
        );
    }

    #[test]
    fn strangers_are_forbidden_and_admins_are_not() {
        let stranger = TestUser::doctor("other@example.com").to_user();
        let admin = TestUser::admin("admin@example.com").to_user();
        let resource = Ownership::appointment("patient-1", "doctor-1");

        assert!(authorize(&stranger, &resource, Capability::View).is_err());
        assert!(authorize(&admin, &resource, Capability::Remove).is_ok());
        assert!(authorize(&admin, &resource, Capability::Complete).is_ok());
    }

    #[test]
    fn doctor_id_matching_patient_slot_does_not_grant_access() {
        let doctor = TestUser::doctor("d@example.com").to_user();
        let resource = Ownership::patient(&doctor.id);

        assert!(authorize(&doctor, &resource, Capability::View).is_err());
    }

    #[test]
    fn require_role_checks_membership() {
        let patient = TestUser::patient("p@example.com").to_user();
        assert!(require_role(&patient, &[Role::Patient]).is_ok());
        assert!(require_role(&patient, &[Role::Doctor, Role::Admin]).is_err());
    }
}

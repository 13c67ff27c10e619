//! Well-known role tags used in step `required_role` sets.

pub const ROLE_SYSTEM: &str = "system";
pub const ROLE_LAB_TECHNICIAN: &str = "lab-technician";
pub const ROLE_LAB_MANAGER: &str = "lab-manager";
pub const ROLE_PATHOLOGIST: &str = "pathologist";

/// Whether `held` contains at least one of `required`.
pub fn holds_any(held: &[String], required: &[String]) -> bool {
    required.iter().any(|r| held.iter().any(|h| h == r))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matching_role_is_accepted() {
        assert!(holds_any(
            &roles(&[ROLE_LAB_MANAGER]),
            &roles(&[ROLE_LAB_TECHNICIAN, ROLE_LAB_MANAGER]),
        ));
    }

    #[test]
    fn disjoint_roles_are_rejected() {
        assert!(!holds_any(&roles(&[ROLE_LAB_TECHNICIAN]), &roles(&[ROLE_PATHOLOGIST])));
    }

    #[test]
    fn empty_holder_is_rejected() {
        assert!(!holds_any(&[], &roles(&[ROLE_SYSTEM])));
    }
}

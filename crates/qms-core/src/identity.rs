use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Role;

/// Authenticated caller, as reported by the external authentication capability.
///
/// Carries data only; verifying who the caller is happens before a request
/// reaches the engine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub roles: Vec<Role>,
}

impl Caller {
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// True when the caller holds at least one of `roles`.
    #[must_use]
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_role_matches() {
        let caller = Caller {
            user_id: "usr-00000001".into(),
            roles: vec![Role::Reviewer],
        };
        assert!(caller.has_any_role(&[Role::Admin, Role::Reviewer]));
        assert!(!caller.has_any_role(&[Role::Admin, Role::Auditor]));
        assert!(!caller.has_any_role(&[]));
    }
}

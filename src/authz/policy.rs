//! Pure authorization rules shared by single and bulk actions.

use std::collections::HashSet;

use crate::models::permission::{PermissionObtained, PermissionRequired};
use crate::models::role::{HierarchyKind, Role};

/// True when at least one required permission is not among the obtained ones.
/// An empty rule set never blocks.
pub fn missing_permissions(
    required: &[PermissionRequired],
    obtained: &[PermissionObtained],
) -> bool {
    let held: HashSet<&str> = obtained.iter().map(|p| p.name.as_str()).collect();
    required.iter().any(|rule| !held.contains(rule.name.as_str()))
}

/// An exemption from the actor-side PROMOTE permission check, keyed on the
/// target's current role. The actor qualifies by holding a course or by its
/// own rank name. Entries are additive policy data, evaluated in order.
pub struct PromotionBypass {
    pub actor_course: Option<&'static str>,
    pub actor_role: Option<&'static str>,
    pub target_role: &'static str,
}

pub const PROMOTION_BYPASSES: &[PromotionBypass] = &[
    PromotionBypass {
        actor_course: Some("CApEx"),
        actor_role: None,
        target_role: "Soldado",
    },
    PromotionBypass {
        actor_course: None,
        actor_role: Some("Aspirante a Oficial"),
        target_role: "Soldado",
    },
];

pub fn promotion_bypass_applies(
    actor_role: &str,
    actor_permissions: &[PermissionObtained],
    target_role: &str,
) -> bool {
    PROMOTION_BYPASSES.iter().any(|bypass| {
        if bypass.target_role != target_role {
            return false;
        }
        if let Some(course) = bypass.actor_course {
            if !actor_permissions.iter().any(|p| p.name == course) {
                return false;
            }
        }
        if let Some(role) = bypass.actor_role {
            if actor_role != role {
                return false;
            }
        }
        true
    })
}

/// Effective power inside the specialization department. An assignment at
/// power 3 or above stands on its own; below that, rank and held courses can
/// raise it. Later rules overwrite earlier ones.
pub fn effective_power(role: &Role, permissions: &[PermissionObtained], assigned: i64) -> i64 {
    if assigned >= 3 {
        return assigned;
    }

    let holds = |name: &str| permissions.iter().any(|p| p.name == name);
    let mut power = assigned;

    if (role.hierarchy_kind == HierarchyKind::Military && role.hierarchy_position >= 4)
        || (role.hierarchy_position >= 3 && holds("ESgt"))
    {
        power = 2;
    }
    if role.hierarchy_position >= 4 && holds("ESbt") {
        power = 3;
    }
    if role.hierarchy_kind == HierarchyKind::Military && role.hierarchy_position >= 5 {
        power = 3;
    }
    if role.hierarchy_kind == HierarchyKind::Executive && (holds("CFO") || holds("CApEx")) {
        power = 3;
    }

    power
}

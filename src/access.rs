//! Role/Tier capability checks — pure functions, evaluated server-side.
//!
//! The auth layer (external) verifies identity and hands us a role and a
//! plan tier; nothing here trusts client-held flags like an `isAdmin` bit.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Pro,
    Agency,
}

impl Role {
    pub fn parse_or_default(s: Option<&str>) -> Role {
        match s {
            Some("admin") => Role::Admin,
            _ => Role::Member,
        }
    }
}

impl Tier {
    pub fn parse_or_default(s: Option<&str>) -> Tier {
        match s {
            Some("pro") => Tier::Pro,
            Some("agency") => Tier::Agency,
            _ => Tier::Free,
        }
    }

    /// How many shows this tier may track. `None` means unlimited.
    pub fn show_limit(self) -> Option<u64> {
        match self {
            Tier::Free => Some(10),
            Tier::Pro => Some(200),
            Tier::Agency => None,
        }
    }
}

/// Whether the caller may author or deactivate templates.
pub fn can_manage_templates(role: Role, tier: Tier) -> bool {
    role == Role::Admin || tier != Tier::Free
}

/// Whether the caller may read the admin dashboard aggregates.
pub fn can_view_admin_dashboard(role: Role) -> bool {
    role == Role::Admin
}

//! Caller authorization context.
//!
//! `CallerContext` is the authenticated member together with its rank,
//! obtained permissions and department assignments, loaded once at the
//! request boundary and passed by value into every engine entry point.

pub mod policy;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::bearer_token;
use crate::models::department::HeldDepartmentRole;
use crate::models::member::fetch_member_with_role;
use crate::models::permission::{fetch_obtained, PermissionObtained};
use crate::models::role::Role;

/// Ranks with unlimited department power, query access over every member's
/// entries, and exemption from bulk actions.
pub const TOP_RANKS: [&str; 2] = ["Supremo", "Conselheiro"];

pub const UNLIMITED_POWER: i64 = 1000;

/// Entry-level rank: never a valid target of demote/warn and never an actor.
pub const ENTRY_ROLE: &str = "Recruta";

/// Lowest demotable ranks per ladder; one step below is out of the ladder.
pub const DEMOTION_FLOORS: [&str; 2] = ["Soldado", "Estagiário"];

/// Pseudo-actor that authors cascade entries.
pub const SYSTEM_AUTHOR: &str = "PME System";

pub const HR_DEPARTMENT: &str = "RH";

/// Department whose effective power is partially derived from the member's
/// rank and held courses instead of the assigned role alone.
pub const SPECIALIZATION_DEPARTMENT: &str = "ESP";

#[derive(Debug, Clone)]
pub struct CallerContext {
    pub id: Uuid,
    pub nick: String,
    pub is_admin: bool,
    pub role: Role,
    pub permissions: Vec<PermissionObtained>,
    pub department_roles: Vec<HeldDepartmentRole>,
}

impl CallerContext {
    pub async fn load(pool: &SqlitePool, nick: &str) -> AppResult<Self> {
        let with_role = fetch_member_with_role(pool, nick)
            .await?
            .ok_or_else(|| AppError::unauthorized("Sessão inválida."))?;

        let permissions = fetch_obtained(pool, with_role.member.id).await?;

        let department_roles = sqlx::query_as::<_, HeldDepartmentRole>(
            "SELECT dr.department, dr.name AS role_name, dr.power_level \
             FROM member_department_roles mdr \
             JOIN department_roles dr ON dr.id = mdr.department_role_id \
             WHERE mdr.member_id = ?",
        )
        .bind(with_role.member.id)
        .fetch_all(pool)
        .await?;

        Ok(Self {
            id: with_role.member.id,
            nick: with_role.member.nick,
            is_admin: with_role.member.is_admin,
            role: with_role.role,
            permissions,
            department_roles,
        })
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.iter().any(|p| p.name == name)
    }

    pub fn is_top_rank(&self) -> bool {
        TOP_RANKS.contains(&self.role.name.as_str())
    }

    pub fn has_hr_role(&self) -> bool {
        self.department_roles
            .iter()
            .any(|held| held.department == HR_DEPARTMENT)
    }

    /// The caller's power within one department, or `None` when it holds no
    /// role there. Top ranks get unlimited power; the specialization
    /// department derives extra power from rank and courses.
    pub fn department_power(&self, department: &str) -> Option<i64> {
        if self.is_top_rank() {
            return Some(UNLIMITED_POWER);
        }

        let held = self
            .department_roles
            .iter()
            .find(|held| held.department == department)?;

        if department == SPECIALIZATION_DEPARTMENT {
            Some(policy::effective_power(
                &self.role,
                &self.permissions,
                held.power_level,
            ))
        } else {
            Some(held.power_level)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CallerContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.jwt.decode(token)?;

        CallerContext::load(&state.pool, &claims.nick).await
    }
}

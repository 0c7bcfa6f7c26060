use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::role::HierarchyKind;

/// Personnel actions gated by required permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionAction {
    BePromoted,
    Promote,
    Demote,
    Fire,
    Warn,
}

/// COURSE grants are revoked en masse on demotion/promotion; OTHER grants
/// persist until explicitly removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionKind {
    Course,
    Other,
}

/// A catalog rule: to perform (or undergo) `action`, holders of `role_name`
/// or members of `hierarchy_kind` must have obtained permission `name`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PermissionRequired {
    pub id: i64,
    pub action: PermissionAction,
    pub name: String,
    pub kind: PermissionKind,
    pub role_name: Option<String>,
    pub hierarchy_kind: Option<HierarchyKind>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PermissionObtained {
    pub id: i64,
    pub member_id: Uuid,
    pub name: String,
    pub full_name: String,
    pub kind: PermissionKind,
    pub created_at: DateTime<Utc>,
}

/// Rules applicable to a role: the ones naming it directly or covering its
/// whole hierarchy kind.
pub async fn fetch_required(
    pool: &sqlx::SqlitePool,
    action: PermissionAction,
    role_name: &str,
    hierarchy_kind: HierarchyKind,
) -> Result<Vec<PermissionRequired>, sqlx::Error> {
    sqlx::query_as::<_, PermissionRequired>(
        "SELECT id, action, name, kind, role_name, hierarchy_kind FROM permissions_required \
         WHERE action = ? AND (role_name = ? OR hierarchy_kind = ?)",
    )
    .bind(action)
    .bind(role_name)
    .bind(hierarchy_kind)
    .fetch_all(pool)
    .await
}

pub async fn fetch_obtained(
    pool: &sqlx::SqlitePool,
    member_id: Uuid,
) -> Result<Vec<PermissionObtained>, sqlx::Error> {
    sqlx::query_as::<_, PermissionObtained>(
        "SELECT id, member_id, name, full_name, kind, created_at FROM permissions_obtained \
         WHERE member_id = ?",
    )
    .bind(member_id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PermissionRuleCreateRequest {
    pub action: PermissionAction,
    pub name: String,
    pub kind: PermissionKind,
    pub role_name: Option<String>,
    pub hierarchy_kind: Option<HierarchyKind>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantPermissionRequest {
    pub nick: String,
    pub name: String,
    pub full_name: String,
    pub kind: PermissionKind,
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// The two parallel rank ladders. Every role belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HierarchyKind {
    Military,
    Executive,
}

/// A rank in the catalog. `hierarchy_position` is unique within a kind and
/// adjacent positions are the only valid promotion/demotion steps. The four
/// `*_until_role_position` thresholds cap the position of targets a holder of
/// this role may act on.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Role {
    pub name: String,
    pub hierarchy_kind: HierarchyKind,
    pub hierarchy_position: i64,
    pub promotes_until_role_position: i64,
    pub demote_until_role_position: i64,
    pub fire_until_role_position: i64,
    pub gratify_until_role_position: i64,
    pub days_to_be_promoted: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct RoleSummary {
    pub name: String,
    pub hierarchy_kind: HierarchyKind,
    pub hierarchy_position: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleCreateRequest {
    pub name: String,
    pub hierarchy_kind: HierarchyKind,
    pub hierarchy_position: i64,
    pub promotes_until_role_position: i64,
    pub demote_until_role_position: i64,
    pub fire_until_role_position: i64,
    pub gratify_until_role_position: i64,
    #[serde(default)]
    pub days_to_be_promoted: i64,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A department-scoped title. `power_level` is a department-local seniority
/// scale, unrelated to hierarchy positions.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DepartmentRole {
    pub id: i64,
    pub acronym: String,
    pub name: String,
    pub department: String,
    pub power_level: i64,
}

/// A member's assignment within one department, as attached to the caller
/// context and listing endpoints.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct HeldDepartmentRole {
    pub department: String,
    pub role_name: String,
    pub power_level: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Course {
    pub acronym: String,
    pub name: String,
    pub document: String,
    pub department: String,
    pub power_needed: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Class {
    pub id: i64,
    pub course_acronym: String,
    pub author: String,
    pub approved: String,
    pub failed: String,
    pub room: String,
    pub department: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct DepartmentMember {
    pub nick: String,
    pub role_name: String,
    pub power_level: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub role_name: String,
    pub nick: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RemoveRoleRequest {
    pub department: String,
    pub nick: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostClassRequest {
    pub course_acronym: String,
    pub approved: Vec<String>,
    #[serde(default)]
    pub failed: Vec<String>,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub description: String,
}

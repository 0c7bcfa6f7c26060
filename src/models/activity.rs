use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Promotion,
    Demotion,
    Fire,
    Warning,
    Approvation,
    Contract,
    Change,
}

/// Immutable audit record. `is_active` only matters for WARNING entries: the
/// three-warning cascade flips them off so they cannot count twice.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ActivityEntry {
    pub id: i64,
    pub author: String,
    pub target_id: Uuid,
    pub action: ActionType,
    pub description: String,
    pub new_role: Option<String>,
    pub bonus_in_role: Option<i64>,
    pub course_acronym: Option<String>,
    pub multiple_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Listing row joined with the target's nick.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ActivityRow {
    pub id: i64,
    pub author: String,
    pub target_nick: String,
    pub action: ActionType,
    pub description: String,
    pub new_role: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct BonificationRow {
    pub id: i64,
    pub author: String,
    pub target_nick: String,
    pub reason: String,
    pub gains: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct WeeklyBonified {
    pub nick: String,
    pub total_gains: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SingleActionRequest {
    pub nick: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkActionRequest {
    pub nicks: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BonifyRequest {
    pub nick: String,
    pub reason: String,
}

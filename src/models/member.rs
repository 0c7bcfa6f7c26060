use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::role::Role;

/// Current state of one organization member. Never hard-deleted: firing
/// deactivates the account and resets the rank to the floor.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Member {
    pub id: Uuid,
    pub nick: String,
    pub discord: Option<String>,
    pub is_admin: bool,
    pub is_account_active: bool,
    pub role_name: String,
    pub warnings: i64,
    pub bonus_in_role: i64,
    pub total_bonus: i64,
    pub last_promoted: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Member joined with its current rank; the shape every action evaluates.
#[derive(Debug, Clone, FromRow)]
pub struct MemberWithRole {
    #[sqlx(flatten)]
    pub member: Member,
    #[sqlx(flatten)]
    pub role: Role,
}

pub const MEMBER_COLUMNS: &str = "m.id, m.nick, m.discord, m.is_admin, m.is_account_active, \
     m.role_name, m.warnings, m.bonus_in_role, m.total_bonus, m.last_promoted, \
     m.created_at, m.updated_at";

pub const ROLE_COLUMNS: &str = "r.name, r.hierarchy_kind, r.hierarchy_position, \
     r.promotes_until_role_position, r.demote_until_role_position, \
     r.fire_until_role_position, r.gratify_until_role_position, r.days_to_be_promoted";

/// Fetch a member and its role by nick, or `None` when unknown.
pub async fn fetch_member_with_role(
    pool: &sqlx::SqlitePool,
    nick: &str,
) -> Result<Option<MemberWithRole>, sqlx::Error> {
    let sql = format!(
        "SELECT {MEMBER_COLUMNS}, {ROLE_COLUMNS} \
         FROM members m JOIN roles r ON r.name = m.role_name WHERE m.nick = ?"
    );

    sqlx::query_as::<_, MemberWithRole>(&sql)
        .bind(nick)
        .fetch_optional(pool)
        .await
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContractRequest {
    pub nick: String,
    pub role: String,
    #[serde(rename = "type")]
    pub action: super::activity::ActionType,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActivateRequest {
    pub nick: String,
    pub password: String,
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeDiscordRequest {
    pub discord: String,
}

//! Member-facing endpoints: profiles, account activation, password change,
//! contracting.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{CallerContext, ENTRY_ROLE, TOP_RANKS};
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::activity::ActivityEntry;
use crate::models::member::{
    ActivateRequest, ChangeDiscordRequest, ContractRequest, Member,
};
use crate::models::permission::{fetch_obtained, PermissionObtained};
use crate::utils::{hash_password, utc_now, validate_password};

#[derive(Debug, Serialize, ToSchema)]
pub struct MemberProfile {
    pub nick: String,
    pub role_name: String,
    pub is_account_active: bool,
    pub warnings: i64,
    pub discord: Option<String>,
    pub last_promoted: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub permissions: Vec<PermissionObtained>,
    pub history: Vec<ActivityEntry>,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct SimilarNick {
    pub nick: String,
    pub is_account_active: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileSuggestions {
    pub message: String,
    pub suggestions: Vec<SimilarNick>,
}

#[utoipa::path(
    get,
    path = "/users/recent",
    tag = "Users",
    responses((status = 200, description = "Five most recent members", body = Vec<String>))
)]
pub async fn recent(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let nicks = sqlx::query_scalar::<_, String>(
        "SELECT nick FROM members ORDER BY created_at DESC LIMIT 5",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(nicks))
}

#[utoipa::path(
    get,
    path = "/users/by-role/{role}",
    tag = "Users",
    params(("role" = String, Path, description = "Role name")),
    responses((status = 200, description = "Members holding the role", body = Vec<String>))
)]
pub async fn by_role(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    let nicks =
        sqlx::query_scalar::<_, String>("SELECT nick FROM members WHERE role_name = ? ORDER BY nick")
            .bind(&role)
            .fetch_all(&state.pool)
            .await?;

    Ok(Json(nicks))
}

#[utoipa::path(
    get,
    path = "/users/permissions",
    tag = "Users",
    responses((status = 200, description = "Caller's obtained permissions", body = Vec<PermissionObtained>)),
    security(("bearerAuth" = []))
)]
pub async fn my_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<PermissionObtained>>> {
    let permissions = fetch_obtained(&state.pool, auth.member_id).await?;

    Ok(Json(permissions))
}

/// Profile by nick. Unknown nicks answer 404 with up to ten similar nicks so
/// the frontend can suggest corrections.
#[utoipa::path(
    get,
    path = "/users/profile/{nick}",
    tag = "Users",
    params(("nick" = String, Path, description = "Member nick")),
    responses(
        (status = 200, description = "Member profile", body = MemberProfile),
        (status = 404, description = "Unknown nick, similar nicks suggested", body = ProfileSuggestions)
    )
)]
pub async fn profile(
    State(state): State<AppState>,
    Path(nick): Path<String>,
) -> AppResult<Response> {
    let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE nick = ?")
        .bind(&nick)
        .fetch_optional(&state.pool)
        .await?;

    let Some(member) = member else {
        let suggestions = sqlx::query_as::<_, SimilarNick>(
            "SELECT nick, is_account_active FROM members \
             WHERE nick LIKE ? COLLATE NOCASE \
             ORDER BY is_account_active DESC LIMIT 10",
        )
        .bind(format!("%{nick}%"))
        .fetch_all(&state.pool)
        .await?;

        let body = ProfileSuggestions {
            message: "Usuário não encontrado.".to_string(),
            suggestions,
        };

        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    };

    let (permissions, history) = tokio::try_join!(
        fetch_obtained(&state.pool, member.id),
        sqlx::query_as::<_, ActivityEntry>(
            "SELECT id, author, target_id, action, description, new_role, bonus_in_role, \
             course_acronym, multiple_id, is_active, created_at \
             FROM activity_log WHERE target_id = ? ORDER BY created_at DESC",
        )
        .bind(member.id)
        .fetch_all(&state.pool),
    )?;

    let profile = MemberProfile {
        nick: member.nick,
        role_name: member.role_name,
        is_account_active: member.is_account_active,
        warnings: member.warnings,
        discord: member.discord,
        last_promoted: member.last_promoted,
        created_at: member.created_at,
        permissions,
        history,
    };

    Ok(Json(profile).into_response())
}

/// Mission code of a live session, or a rejection when unknown or expired.
async fn session_code(state: &AppState, session_id: Uuid) -> AppResult<String> {
    let row: Option<(String, DateTime<Utc>)> =
        sqlx::query_as("SELECT code, expires_at FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&state.pool)
            .await?;

    let (code, expires_at) = row.ok_or_else(|| AppError::bad_request("Sessão inválida"))?;

    if expires_at < utc_now() {
        return Err(AppError::bad_request(
            "Sessão expirada! Um novo código de missão foi gerado.",
        ));
    }

    Ok(code)
}

async fn member_by_nick(state: &AppState, nick: &str) -> AppResult<Member> {
    sqlx::query_as::<_, Member>("SELECT * FROM members WHERE nick = ?")
        .bind(nick)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| {
            AppError::bad_request(
                "Usuário inexistente. Você provavelmente ainda não se alistou, \
                 procure nossa base no Habbo Hotel!",
            )
        })
}

fn ensure_strong_password(password: &str) -> AppResult<()> {
    let errors = validate_password(password);
    if !errors.is_empty() {
        return Err(AppError::bad_request(errors.join(" ")));
    }

    Ok(())
}

/// Account activation: the member proves nick ownership by setting the
/// session's mission code in their Habbo motto.
#[utoipa::path(
    post,
    path = "/users/activate",
    tag = "Users",
    request_body = ActivateRequest,
    responses(
        (status = 200, description = "Account activated"),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn activate(
    State(state): State<AppState>,
    Json(req): Json<ActivateRequest>,
) -> AppResult<StatusCode> {
    let member = member_by_nick(&state, &req.nick).await?;

    if member.role_name == ENTRY_ROLE {
        return Err(AppError::bad_request("Você precisa se alistar antes de ativar a conta"));
    }
    if member.is_account_active {
        return Err(AppError::bad_request("Usuário já ativo."));
    }

    ensure_strong_password(&req.password)?;

    let code = session_code(&state, req.session_id).await?;

    let habbo = state.resolver.resolve(&req.nick).await?;
    let expected = format!("PME{code}");
    if !habbo.motto.contains(&expected) {
        return Err(AppError::bad_request(format!(
            "Missão incorreta! Lembre-se de trocar sua missão para {expected}"
        )));
    }

    let password_hash = hash_password(&req.password)?;

    sqlx::query(
        "UPDATE members SET password_hash = ?, is_account_active = 1, updated_at = ? WHERE id = ?",
    )
    .bind(password_hash)
    .bind(utc_now())
    .bind(member.id)
    .execute(&state.pool)
    .await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/users/password",
    tag = "Users",
    request_body = ActivateRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    Json(req): Json<ActivateRequest>,
) -> AppResult<StatusCode> {
    let member = member_by_nick(&state, &req.nick).await?;

    if member.role_name == ENTRY_ROLE {
        return Err(AppError::bad_request("Você precisa se alistar antes de ativar a conta"));
    }
    if !member.is_account_active {
        return Err(AppError::bad_request("Usuário inativo. Ative sua conta primeiro"));
    }

    ensure_strong_password(&req.password)?;

    let code = session_code(&state, req.session_id).await?;

    let habbo = state.resolver.resolve(&req.nick).await?;
    let expected = format!("PMETROCAR{code}");
    if !habbo.motto.contains(&expected) {
        return Err(AppError::bad_request(format!(
            "Missão incorreta! Lembre-se de trocar sua missão para {expected}"
        )));
    }

    let password_hash = hash_password(&req.password)?;

    sqlx::query("UPDATE members SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(utc_now())
        .bind(member.id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    patch,
    path = "/users/discord",
    tag = "Users",
    request_body = ChangeDiscordRequest,
    responses((status = 200, description = "Discord handle updated")),
    security(("bearerAuth" = []))
)]
pub async fn change_discord(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChangeDiscordRequest>,
) -> AppResult<StatusCode> {
    sqlx::query("UPDATE members SET discord = ?, updated_at = ? WHERE id = ?")
        .bind(&req.discord)
        .bind(utc_now())
        .bind(auth.member_id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::OK)
}

/// Direct hire into a role by the top two ranks. Creates the member when the
/// nick is new, otherwise moves it. Contracting into a top rank is reserved
/// for site administrators.
#[utoipa::path(
    post,
    path = "/users/contract",
    tag = "Users",
    request_body = ContractRequest,
    responses(
        (status = 200, description = "Member contracted"),
        (status = 401, description = "Caller lacks standing")
    ),
    security(("bearerAuth" = []))
)]
pub async fn contract(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<ContractRequest>,
) -> AppResult<StatusCode> {
    if !caller.is_top_rank() {
        return Err(AppError::unauthorized("Você não tem permissão para contratar."));
    }
    if TOP_RANKS.contains(&req.role.as_str()) && !caller.is_admin {
        return Err(AppError::unauthorized(
            "Apenas administradores do site podem contratar um supremo ou conselheiro",
        ));
    }

    let role_exists: Option<String> = sqlx::query_scalar("SELECT name FROM roles WHERE name = ?")
        .bind(&req.role)
        .fetch_optional(&state.pool)
        .await?;
    if role_exists.is_none() {
        return Err(AppError::not_found("Cargo inexistente."));
    }

    let mut tx = state.pool.begin().await?;

    let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM members WHERE nick = ?")
        .bind(&req.nick)
        .fetch_optional(&mut *tx)
        .await?;

    let member_id = match existing {
        Some(id) => {
            sqlx::query("UPDATE members SET role_name = ?, updated_at = ? WHERE id = ?")
                .bind(&req.role)
                .bind(utc_now())
                .bind(id)
                .execute(&mut *tx)
                .await?;
            id
        }
        None => {
            let id = Uuid::new_v4();
            sqlx::query("INSERT INTO members (id, nick, role_name) VALUES (?, ?, ?)")
                .bind(id)
                .bind(&req.nick)
                .bind(&req.role)
                .execute(&mut *tx)
                .await?;
            id
        }
    };

    sqlx::query(
        "INSERT INTO activity_log (author, target_id, action, description, new_role) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&caller.nick)
    .bind(member_id)
    .bind(req.action)
    .bind(&req.description)
    .bind(&req.role)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(StatusCode::OK)
}

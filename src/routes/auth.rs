//! Authentication and catalog administration endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::CallerContext;
use crate::errors::{AppError, AppResult};
use crate::models::department::HeldDepartmentRole;
use crate::models::member::fetch_member_with_role;
use crate::models::permission::{
    GrantPermissionRequest, PermissionObtained, PermissionRuleCreateRequest,
};
use crate::models::role::{RoleCreateRequest, RoleSummary};
use crate::utils::{mission_code, utc_now, verify_password};

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub nick: String,
    pub password: String,
}

/// Token plus the caller graph the frontend renders from.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub nick: String,
    pub role_name: String,
    pub permissions: Vec<PermissionObtained>,
    pub department_roles: Vec<HeldDepartmentRole>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

fn ensure_admin(caller: &CallerContext) -> AppResult<()> {
    if !caller.is_admin {
        return Err(AppError::unauthorized("Sem permissão para realizar essa ação."));
    }

    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials or inactive account")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let member = fetch_member_with_role(&state.pool, &payload.nick)
        .await?
        .filter(|member| member.member.is_account_active)
        .ok_or_else(|| {
            AppError::unauthorized(
                "Sua conta ainda está inativa, tente ativar na aba \"ATIVAR CONTA\"",
            )
        })?;

    let password_hash: Option<String> =
        sqlx::query_scalar("SELECT password_hash FROM members WHERE id = ?")
            .bind(member.member.id)
            .fetch_one(&state.pool)
            .await?;

    let password_hash = password_hash
        .ok_or_else(|| AppError::unauthorized("Combinação de usuário/senha inexistente."))?;

    if !verify_password(&payload.password, &password_hash)? {
        return Err(AppError::unauthorized("Combinação de usuário/senha inexistente."));
    }

    let caller = CallerContext::load(&state.pool, &member.member.nick).await?;
    let token = state.jwt.encode(caller.id, &caller.nick)?;

    Ok(Json(LoginResponse {
        token,
        nick: caller.nick,
        role_name: caller.role.name,
        permissions: caller.permissions,
        department_roles: caller.department_roles,
    }))
}

#[utoipa::path(
    get,
    path = "/auth/roles",
    tag = "Auth",
    responses((status = 200, description = "Role ladder", body = Vec<RoleSummary>))
)]
pub async fn list_roles(State(state): State<AppState>) -> AppResult<Json<Vec<RoleSummary>>> {
    let roles = sqlx::query_as::<_, RoleSummary>(
        "SELECT name, hierarchy_kind, hierarchy_position FROM roles \
         ORDER BY hierarchy_position ASC",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(roles))
}

/// Ten-minute mission-code session for account activation and password
/// change.
#[utoipa::path(
    post,
    path = "/auth/session",
    tag = "Auth",
    responses((status = 201, description = "Session created", body = SessionResponse))
)]
pub async fn create_session(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    let id = Uuid::new_v4();
    let code = mission_code();
    let expires_at = utc_now() + Duration::minutes(10);

    sqlx::query("INSERT INTO sessions (id, code, expires_at) VALUES (?, ?, ?)")
        .bind(id)
        .bind(&code)
        .bind(expires_at)
        .execute(&state.pool)
        .await?;

    Ok((StatusCode::CREATED, Json(SessionResponse { id, code, expires_at })))
}

#[utoipa::path(
    post,
    path = "/auth/roles",
    tag = "Auth",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created"),
        (status = 401, description = "Not an administrator")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<RoleCreateRequest>,
) -> AppResult<StatusCode> {
    ensure_admin(&caller)?;

    sqlx::query(
        "INSERT INTO roles (name, hierarchy_kind, hierarchy_position, \
         promotes_until_role_position, demote_until_role_position, \
         fire_until_role_position, gratify_until_role_position, days_to_be_promoted) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&req.name)
    .bind(req.hierarchy_kind)
    .bind(req.hierarchy_position)
    .bind(req.promotes_until_role_position)
    .bind(req.demote_until_role_position)
    .bind(req.fire_until_role_position)
    .bind(req.gratify_until_role_position)
    .bind(req.days_to_be_promoted)
    .execute(&state.pool)
    .await?;

    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    post,
    path = "/auth/permissions",
    tag = "Auth",
    request_body = PermissionRuleCreateRequest,
    responses(
        (status = 201, description = "Rule created"),
        (status = 401, description = "Not an administrator")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_permission_rule(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<PermissionRuleCreateRequest>,
) -> AppResult<StatusCode> {
    ensure_admin(&caller)?;

    sqlx::query(
        "INSERT INTO permissions_required (action, name, kind, role_name, hierarchy_kind) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(req.action)
    .bind(&req.name)
    .bind(req.kind)
    .bind(&req.role_name)
    .bind(req.hierarchy_kind)
    .execute(&state.pool)
    .await?;

    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    post,
    path = "/auth/permissions/grant",
    tag = "Auth",
    request_body = GrantPermissionRequest,
    responses(
        (status = 201, description = "Permission granted"),
        (status = 400, description = "Member not registered"),
        (status = 401, description = "Not an administrator")
    ),
    security(("bearerAuth" = []))
)]
pub async fn grant_permission(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<GrantPermissionRequest>,
) -> AppResult<StatusCode> {
    ensure_admin(&caller)?;

    let profile = state.resolver.resolve(&req.nick).await?;

    let member_id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM members WHERE nick = ?")
        .bind(&profile.name)
        .fetch_optional(&state.pool)
        .await?;

    let member_id = member_id.ok_or_else(|| AppError::bad_request("Usuário não existente"))?;

    sqlx::query(
        "INSERT INTO permissions_obtained (member_id, name, full_name, kind) VALUES (?, ?, ?, ?)",
    )
    .bind(member_id)
    .bind(&req.name)
    .bind(&req.full_name)
    .bind(req.kind)
    .execute(&state.pool)
    .await?;

    Ok(StatusCode::CREATED)
}

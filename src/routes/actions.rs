//! Personnel action endpoints. Handlers are thin wrappers over the engine in
//! `crate::actions`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::actions::bulk::{self, BulkOutcome};
use crate::actions::query::{self, ActionQuery, ActionsPage, BonificationQuery, BonificationsPage};
use crate::actions::{self, ActionOutcome};
use crate::app::AppState;
use crate::authz::CallerContext;
use crate::errors::AppResult;
use crate::models::activity::{BonifyRequest, BulkActionRequest, SingleActionRequest, WeeklyBonified};

#[utoipa::path(
    post,
    path = "/actions/promote",
    tag = "Actions",
    request_body = SingleActionRequest,
    responses(
        (status = 200, description = "Member promoted", body = ActionOutcome),
        (status = 401, description = "Caller lacks standing"),
        (status = 403, description = "Target not eligible")
    ),
    security(("bearerAuth" = []))
)]
pub async fn promote(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<SingleActionRequest>,
) -> AppResult<Json<ActionOutcome>> {
    let outcome = actions::promote(
        &state.pool,
        state.resolver.as_ref(),
        &caller,
        &req.nick,
        &req.description,
    )
    .await?;

    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/actions/demote",
    tag = "Actions",
    request_body = SingleActionRequest,
    responses(
        (status = 200, description = "Member demoted", body = ActionOutcome),
        (status = 401, description = "Caller lacks standing")
    ),
    security(("bearerAuth" = []))
)]
pub async fn demote(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<SingleActionRequest>,
) -> AppResult<Json<ActionOutcome>> {
    let outcome = actions::demote(
        &state.pool,
        state.resolver.as_ref(),
        &caller,
        &req.nick,
        &req.description,
    )
    .await?;

    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/actions/fire",
    tag = "Actions",
    request_body = SingleActionRequest,
    responses(
        (status = 200, description = "Member fired", body = ActionOutcome),
        (status = 401, description = "Caller lacks standing")
    ),
    security(("bearerAuth" = []))
)]
pub async fn fire(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<SingleActionRequest>,
) -> AppResult<Json<ActionOutcome>> {
    let outcome = actions::fire(
        &state.pool,
        state.resolver.as_ref(),
        &caller,
        &req.nick,
        &req.description,
    )
    .await?;

    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/actions/warn",
    tag = "Actions",
    request_body = SingleActionRequest,
    responses(
        (status = 200, description = "Member warned", body = ActionOutcome),
        (status = 401, description = "Caller lacks standing")
    ),
    security(("bearerAuth" = []))
)]
pub async fn warn(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<SingleActionRequest>,
) -> AppResult<Json<ActionOutcome>> {
    let outcome = actions::warn(
        &state.pool,
        state.resolver.as_ref(),
        &caller,
        &req.nick,
        &req.description,
    )
    .await?;

    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/actions/bonify",
    tag = "Actions",
    request_body = BonifyRequest,
    responses(
        (status = 200, description = "Bonus recorded"),
        (status = 400, description = "Policy violated")
    ),
    security(("bearerAuth" = []))
)]
pub async fn bonify(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<BonifyRequest>,
) -> AppResult<StatusCode> {
    actions::bonify(&state.pool, &caller, &req.nick, &req.reason).await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/actions/demote-many",
    tag = "Actions",
    request_body = BulkActionRequest,
    responses((status = 200, description = "Batch applied", body = BulkOutcome)),
    security(("bearerAuth" = []))
)]
pub async fn demote_many(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<BulkActionRequest>,
) -> AppResult<Json<BulkOutcome>> {
    let outcome = bulk::demote_many(
        &state.pool,
        state.resolver.as_ref(),
        &caller,
        &req.nicks,
        &req.description,
    )
    .await?;

    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/actions/fire-many",
    tag = "Actions",
    request_body = BulkActionRequest,
    responses((status = 200, description = "Batch applied", body = BulkOutcome)),
    security(("bearerAuth" = []))
)]
pub async fn fire_many(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<BulkActionRequest>,
) -> AppResult<Json<BulkOutcome>> {
    let outcome = bulk::fire_many(
        &state.pool,
        state.resolver.as_ref(),
        &caller,
        &req.nicks,
        &req.description,
    )
    .await?;

    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/actions/warn-many",
    tag = "Actions",
    request_body = BulkActionRequest,
    responses((status = 200, description = "Batch applied", body = BulkOutcome)),
    security(("bearerAuth" = []))
)]
pub async fn warn_many(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<BulkActionRequest>,
) -> AppResult<Json<BulkOutcome>> {
    let outcome = bulk::warn_many(
        &state.pool,
        state.resolver.as_ref(),
        &caller,
        &req.nicks,
        &req.description,
    )
    .await?;

    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/actions",
    tag = "Actions",
    params(ActionQuery),
    responses(
        (status = 200, description = "Activity entries", body = ActionsPage),
        (status = 401, description = "Scope not allowed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_actions(
    State(state): State<AppState>,
    caller: CallerContext,
    Query(q): Query<ActionQuery>,
) -> AppResult<Json<ActionsPage>> {
    let page = query::get_actions(&state.pool, &caller, &q).await?;

    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/actions/bonifications",
    tag = "Actions",
    params(BonificationQuery),
    responses(
        (status = 200, description = "Bonification entries", body = BonificationsPage),
        (status = 401, description = "Scope not allowed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_bonifications(
    State(state): State<AppState>,
    caller: CallerContext,
    Query(q): Query<BonificationQuery>,
) -> AppResult<Json<BonificationsPage>> {
    let page = query::get_bonifications(&state.pool, &caller, &q).await?;

    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/actions/bonifications/weekly-top",
    tag = "Actions",
    responses((status = 200, description = "Top bonified this week", body = Vec<WeeklyBonified>))
)]
pub async fn weekly_top(State(state): State<AppState>) -> AppResult<Json<Vec<WeeklyBonified>>> {
    let top = query::weekly_top(&state.pool).await?;

    Ok(Json(top))
}

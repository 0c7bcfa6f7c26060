//! Activity-log and bonification queries.
//!
//! Listing across all members needs elevated standing (top rank or an HR
//! department role); everyone else only sees entries they authored. Filters
//! resolve once into a SQL predicate through a single mapping function.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::{IntoParams, ToSchema};

use crate::authz::CallerContext;
use crate::errors::{AppError, AppResult};
use crate::models::activity::{ActionType, ActivityRow, BonificationRow, WeeklyBonified};
use crate::utils;

const PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueryScope {
    #[default]
    Mine,
    All,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ActionQuery {
    pub action: ActionType,
    #[serde(default)]
    pub scope: QueryScope,
    pub search: Option<String>,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BonificationQuery {
    #[serde(default)]
    pub scope: QueryScope,
    pub search: Option<String>,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActionsPage {
    pub total: i64,
    pub rows: Vec<ActivityRow>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BonificationsPage {
    pub total: i64,
    pub rows: Vec<BonificationRow>,
}

fn ensure_scope(caller: &CallerContext, scope: QueryScope) -> AppResult<()> {
    if scope == QueryScope::All && !caller.is_top_rank() && !caller.has_hr_role() {
        return Err(AppError::unauthorized(
            "Você só pode ver suas próprias postagens.",
        ));
    }

    Ok(())
}

/// Free-text term matched against author, text column and target nick, plus
/// a DD/MM/YYYY creation-day window and an exact numeric id when parseable.
fn push_search(qb: &mut QueryBuilder<'_, Sqlite>, text_column: &str, search: &str) {
    let pattern = format!("%{search}%");

    qb.push(" AND (a.author LIKE ").push_bind(pattern.clone());
    qb.push(format!(" OR a.{text_column} LIKE ")).push_bind(pattern.clone());
    qb.push(" OR m.nick LIKE ").push_bind(pattern);

    if let Ok(date) = NaiveDate::parse_from_str(search, "%d/%m/%Y") {
        let (begin, end) = utils::local_day_bounds(date);
        qb.push(" OR (a.created_at >= ").push_bind(begin);
        qb.push(" AND a.created_at < ").push_bind(end);
        qb.push(")");
    }

    if let Ok(id) = search.parse::<i64>() {
        qb.push(" OR a.id = ").push_bind(id);
    }

    qb.push(")");
}

fn push_action_filters(qb: &mut QueryBuilder<'_, Sqlite>, caller: &CallerContext, query: &ActionQuery) {
    qb.push(" WHERE a.action = ").push_bind(query.action);

    if query.scope == QueryScope::Mine {
        qb.push(" AND a.author = ").push_bind(caller.nick.clone());
    }

    if let Some(search) = query.search.as_deref().filter(|term| !term.is_empty()) {
        push_search(qb, "description", search);
    }
}

pub async fn get_actions(
    pool: &SqlitePool,
    caller: &CallerContext,
    query: &ActionQuery,
) -> AppResult<ActionsPage> {
    ensure_scope(caller, query.scope)?;

    let mut count_qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM activity_log a JOIN members m ON m.id = a.target_id",
    );
    push_action_filters(&mut count_qb, caller, query);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new(
        "SELECT a.id, a.author, m.nick AS target_nick, a.action, a.description, \
         a.new_role, a.created_at \
         FROM activity_log a JOIN members m ON m.id = a.target_id",
    );
    push_action_filters(&mut qb, caller, query);
    qb.push(" ORDER BY a.created_at DESC LIMIT ").push_bind(PAGE_SIZE);
    qb.push(" OFFSET ").push_bind(query.offset.max(0));

    let rows = qb.build_query_as::<ActivityRow>().fetch_all(pool).await?;

    Ok(ActionsPage { total, rows })
}

fn push_bonification_filters(
    qb: &mut QueryBuilder<'_, Sqlite>,
    caller: &CallerContext,
    query: &BonificationQuery,
) {
    qb.push(" WHERE 1 = 1");

    if query.scope == QueryScope::Mine {
        qb.push(" AND a.author = ").push_bind(caller.nick.clone());
    }

    if let Some(search) = query.search.as_deref().filter(|term| !term.is_empty()) {
        push_search(qb, "reason", search);
    }
}

pub async fn get_bonifications(
    pool: &SqlitePool,
    caller: &CallerContext,
    query: &BonificationQuery,
) -> AppResult<BonificationsPage> {
    ensure_scope(caller, query.scope)?;

    let mut count_qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM bonifications a JOIN members m ON m.id = a.target_id",
    );
    push_bonification_filters(&mut count_qb, caller, query);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new(
        "SELECT a.id, a.author, m.nick AS target_nick, a.reason, a.gains, a.created_at \
         FROM bonifications a JOIN members m ON m.id = a.target_id",
    );
    push_bonification_filters(&mut qb, caller, query);
    qb.push(" ORDER BY a.created_at DESC LIMIT ").push_bind(PAGE_SIZE);
    qb.push(" OFFSET ").push_bind(query.offset.max(0));

    let rows = qb.build_query_as::<BonificationRow>().fetch_all(pool).await?;

    Ok(BonificationsPage { total, rows })
}

/// Top five bonus earners since the start of the current week.
pub async fn weekly_top(pool: &SqlitePool) -> AppResult<Vec<WeeklyBonified>> {
    let rows = sqlx::query_as::<_, WeeklyBonified>(
        "SELECT m.nick, CAST(SUM(b.gains) AS INTEGER) AS total_gains \
         FROM bonifications b JOIN members m ON m.id = b.target_id \
         WHERE b.created_at >= ? \
         GROUP BY m.nick ORDER BY total_gains DESC LIMIT 5",
    )
    .bind(utils::start_of_week())
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

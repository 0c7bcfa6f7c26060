//! Action engine: promote, demote, fire, warn and bonify.
//!
//! Each entry point validates against the role catalog, the permission
//! catalog and the target's current state, then executes the mutations and
//! the activity-log entries inside one transaction. The `apply_*` helpers
//! contain the mutation halves so the bulk module can reuse them verbatim
//! under its own per-member transactions.

pub mod bulk;
pub mod query;

use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{policy, CallerContext, DEMOTION_FLOORS, ENTRY_ROLE, SYSTEM_AUTHOR};
use crate::errors::{AppError, AppResult};
use crate::habbo::IdentityResolver;
use crate::models::activity::ActionType;
use crate::models::member::{fetch_member_with_role, MemberWithRole};
use crate::models::permission::{fetch_obtained, fetch_required, PermissionAction};
use crate::models::role::{HierarchyKind, Role};
use crate::utils;

pub const RECRUITMENT_REASON: &str = "Recrutamento";
pub const INTERACTION_REASON: &str = "Atividade de Interação";

/// Milestone rank: promotion into it keeps earlier courses except `ECb`.
const MILESTONE_ROLE: &str = "Sargento";
const MILESTONE_REVOKED_COURSE: &str = "ECb";

const DAILY_BONUS_LIMIT: i64 = 3;
const BONUS_COOLDOWN_MINUTES: i64 = 30;

#[derive(Debug, Serialize, ToSchema)]
pub struct ActionOutcome {
    pub nick: String,
    pub new_role: Option<String>,
}

/// Fields of one activity-log entry; every accepted action writes at least
/// one before its transaction commits.
struct LogEntry<'a> {
    author: &'a str,
    target_id: Uuid,
    action: ActionType,
    description: &'a str,
    new_role: Option<&'a str>,
    bonus_in_role: Option<i64>,
    multiple_id: Option<Uuid>,
}

async fn insert_log(tx: &mut Transaction<'_, Sqlite>, entry: LogEntry<'_>) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO activity_log \
         (author, target_id, action, description, new_role, bonus_in_role, multiple_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.author)
    .bind(entry.target_id)
    .bind(entry.action)
    .bind(entry.description)
    .bind(entry.new_role)
    .bind(entry.bonus_in_role)
    .bind(entry.multiple_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn role_at(
    pool: &SqlitePool,
    kind: HierarchyKind,
    position: i64,
) -> AppResult<Option<Role>> {
    let role = sqlx::query_as::<_, Role>(
        "SELECT name, hierarchy_kind, hierarchy_position, promotes_until_role_position, \
         demote_until_role_position, fire_until_role_position, gratify_until_role_position, \
         days_to_be_promoted FROM roles WHERE hierarchy_kind = ? AND hierarchy_position = ?",
    )
    .bind(kind)
    .bind(position)
    .fetch_optional(pool)
    .await?;

    Ok(role)
}

/// Normalize the nick through the identity resolver, then load the member.
async fn resolve_target(
    pool: &SqlitePool,
    resolver: &dyn IdentityResolver,
    nick: &str,
) -> AppResult<Option<MemberWithRole>> {
    let profile = resolver.resolve(nick).await?;

    Ok(fetch_member_with_role(pool, &profile.name).await?)
}

/// Guard for role transitions: the target's pre-image is part of the UPDATE
/// predicate, so a concurrent mutation of the same member surfaces as a
/// conflict instead of a silent lost update.
fn ensure_updated(result: sqlx::sqlite::SqliteQueryResult) -> AppResult<()> {
    if result.rows_affected() == 0 {
        return Err(AppError::conflict(
            "O usuário foi modificado por outra operação. Tente novamente.",
        ));
    }

    Ok(())
}

pub async fn promote(
    pool: &SqlitePool,
    resolver: &dyn IdentityResolver,
    caller: &CallerContext,
    nick: &str,
    description: &str,
) -> AppResult<ActionOutcome> {
    let target = resolve_target(pool, resolver, nick).await?;

    let target = match target {
        Some(target)
            if target.role.name != ENTRY_ROLE
                && target.role.hierarchy_position <= caller.role.promotes_until_role_position =>
        {
            target
        }
        _ => return Err(AppError::unauthorized("Você não pode promover esse usuário.")),
    };

    if !target.member.is_account_active {
        return Err(AppError::bad_request(
            "Ajude-o a ativar a conta no system antes de promovê-lo.",
        ));
    }

    let days_in_role = (utils::utc_now() - target.member.last_promoted).num_days();
    if days_in_role < target.role.days_to_be_promoted {
        return Err(AppError::forbidden(
            "Esse usuário ainda não atingiu o tempo mínimo para ser promovido.",
        ));
    }

    let (target_rules, caller_rules, target_obtained) = tokio::try_join!(
        fetch_required(
            pool,
            PermissionAction::BePromoted,
            &target.role.name,
            target.role.hierarchy_kind,
        ),
        fetch_required(
            pool,
            PermissionAction::Promote,
            &caller.role.name,
            caller.role.hierarchy_kind,
        ),
        fetch_obtained(pool, target.member.id),
    )?;

    if policy::missing_permissions(&target_rules, &target_obtained) {
        return Err(AppError::forbidden(
            "Esse usuário ainda não tem os cursos/permissões necessárias para ser promovido.",
        ));
    }

    let bypassed =
        policy::promotion_bypass_applies(&caller.role.name, &caller.permissions, &target.role.name);
    if !bypassed && policy::missing_permissions(&caller_rules, &caller.permissions) {
        return Err(AppError::unauthorized("Você ainda não pode promover."));
    }

    let next_role = role_at(
        pool,
        target.role.hierarchy_kind,
        target.role.hierarchy_position + 1,
    )
    .await?
    .ok_or_else(|| AppError::forbidden("Esse usuário não pode ser promovido."))?;

    let mut tx = pool.begin().await?;

    if next_role.name == MILESTONE_ROLE {
        sqlx::query("DELETE FROM permissions_obtained WHERE member_id = ? AND name = ?")
            .bind(target.member.id)
            .bind(MILESTONE_REVOKED_COURSE)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query("DELETE FROM permissions_obtained WHERE member_id = ? AND kind = 'COURSE'")
            .bind(target.member.id)
            .execute(&mut *tx)
            .await?;
    }

    let now = utils::utc_now();
    let updated = sqlx::query(
        "UPDATE members SET role_name = ?, bonus_in_role = 0, last_promoted = ?, updated_at = ? \
         WHERE nick = ? AND role_name = ?",
    )
    .bind(&next_role.name)
    .bind(now)
    .bind(now)
    .bind(&target.member.nick)
    .bind(&target.member.role_name)
    .execute(&mut *tx)
    .await?;
    ensure_updated(updated)?;

    insert_log(
        &mut tx,
        LogEntry {
            author: &caller.nick,
            target_id: target.member.id,
            action: ActionType::Promotion,
            description,
            new_role: Some(&next_role.name),
            bonus_in_role: Some(target.member.bonus_in_role),
            multiple_id: None,
        },
    )
    .await?;

    tx.commit().await?;

    Ok(ActionOutcome {
        nick: target.member.nick,
        new_role: Some(next_role.name),
    })
}

/// Actor-side gate shared by demote/fire/warn: the permission rules for
/// `action` applicable to the caller's role, all of which must be held.
async fn require_actor_permissions(
    pool: &SqlitePool,
    caller: &CallerContext,
    action: PermissionAction,
    message: &str,
) -> AppResult<()> {
    let rules = fetch_required(pool, action, &caller.role.name, caller.role.hierarchy_kind).await?;

    if policy::missing_permissions(&rules, &caller.permissions) {
        return Err(AppError::forbidden(message));
    }

    Ok(())
}

pub async fn demote(
    pool: &SqlitePool,
    resolver: &dyn IdentityResolver,
    caller: &CallerContext,
    nick: &str,
    description: &str,
) -> AppResult<ActionOutcome> {
    let target = resolve_target(pool, resolver, nick).await?;

    let target = match target {
        Some(target) if demotable(&target, caller) => target,
        _ => return Err(AppError::unauthorized("Você não pode rebaixar esse usuário.")),
    };

    require_actor_permissions(
        pool,
        caller,
        PermissionAction::Demote,
        "Você ainda não tem permissão para rebaixar.",
    )
    .await?;

    let next_role = role_at(
        pool,
        target.role.hierarchy_kind,
        target.role.hierarchy_position - 1,
    )
    .await?
    .ok_or_else(|| AppError::forbidden("Esse usuário não pode ser rebaixado."))?;

    let mut tx = pool.begin().await?;
    apply_demotion(&mut tx, &target, &next_role.name, &caller.nick, description, None).await?;
    tx.commit().await?;

    Ok(ActionOutcome {
        nick: target.member.nick,
        new_role: Some(next_role.name),
    })
}

pub(crate) fn demotable(target: &MemberWithRole, caller: &CallerContext) -> bool {
    !DEMOTION_FLOORS.contains(&target.role.name.as_str())
        && target.role.name != ENTRY_ROLE
        && target.role.hierarchy_position <= caller.role.demote_until_role_position
}

/// Demotion mutation: one step down, courses revoked, in-role bonus reset.
pub(crate) async fn apply_demotion(
    tx: &mut Transaction<'_, Sqlite>,
    target: &MemberWithRole,
    new_role: &str,
    author: &str,
    description: &str,
    multiple_id: Option<Uuid>,
) -> AppResult<()> {
    sqlx::query("DELETE FROM permissions_obtained WHERE member_id = ? AND kind = 'COURSE'")
        .bind(target.member.id)
        .execute(&mut **tx)
        .await?;

    let updated = sqlx::query(
        "UPDATE members SET role_name = ?, bonus_in_role = 0, updated_at = ? \
         WHERE nick = ? AND role_name = ?",
    )
    .bind(new_role)
    .bind(utils::utc_now())
    .bind(&target.member.nick)
    .bind(&target.member.role_name)
    .execute(&mut **tx)
    .await?;
    ensure_updated(updated)?;

    insert_log(
        tx,
        LogEntry {
            author,
            target_id: target.member.id,
            action: ActionType::Demotion,
            description,
            new_role: Some(new_role),
            bonus_in_role: None,
            multiple_id,
        },
    )
    .await
}

pub async fn fire(
    pool: &SqlitePool,
    resolver: &dyn IdentityResolver,
    caller: &CallerContext,
    nick: &str,
    description: &str,
) -> AppResult<ActionOutcome> {
    let target = resolve_target(pool, resolver, nick).await?;

    let target = match target {
        Some(target)
            if target.role.hierarchy_position <= caller.role.fire_until_role_position =>
        {
            target
        }
        _ => return Err(AppError::unauthorized("Você não pode demitir esse usuário.")),
    };

    require_actor_permissions(
        pool,
        caller,
        PermissionAction::Fire,
        "Você ainda não tem permissão para demitir.",
    )
    .await?;

    let mut tx = pool.begin().await?;
    apply_fire(&mut tx, &target, &caller.nick, description, None).await?;
    tx.commit().await?;

    Ok(ActionOutcome {
        nick: target.member.nick,
        new_role: Some(ENTRY_ROLE.to_string()),
    })
}

/// Firing is a full reset: back to the entry role, account deactivated, every
/// permission and department assignment removed.
pub(crate) async fn apply_fire(
    tx: &mut Transaction<'_, Sqlite>,
    target: &MemberWithRole,
    author: &str,
    description: &str,
    multiple_id: Option<Uuid>,
) -> AppResult<()> {
    sqlx::query("DELETE FROM permissions_obtained WHERE member_id = ?")
        .bind(target.member.id)
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM member_department_roles WHERE member_id = ?")
        .bind(target.member.id)
        .execute(&mut **tx)
        .await?;

    let updated = sqlx::query(
        "UPDATE members SET role_name = ?, is_account_active = 0, bonus_in_role = 0, \
         warnings = 0, updated_at = ? WHERE nick = ? AND role_name = ?",
    )
    .bind(ENTRY_ROLE)
    .bind(utils::utc_now())
    .bind(&target.member.nick)
    .bind(&target.member.role_name)
    .execute(&mut **tx)
    .await?;
    ensure_updated(updated)?;

    insert_log(
        tx,
        LogEntry {
            author,
            target_id: target.member.id,
            action: ActionType::Fire,
            description,
            new_role: Some(ENTRY_ROLE),
            bonus_in_role: None,
            multiple_id,
        },
    )
    .await
}

pub async fn warn(
    pool: &SqlitePool,
    resolver: &dyn IdentityResolver,
    caller: &CallerContext,
    nick: &str,
    description: &str,
) -> AppResult<ActionOutcome> {
    let target = resolve_target(pool, resolver, nick).await?;

    let target = match target {
        Some(target) if warnable(&target, caller) => target,
        _ => return Err(AppError::unauthorized("Você não pode advertir esse usuário.")),
    };

    require_actor_permissions(
        pool,
        caller,
        PermissionAction::Warn,
        "Você ainda não tem permissão para advertir.",
    )
    .await?;

    // The cascade's destination is read before opening the transaction so a
    // missing catalog row rejects without side effects.
    let cascade = if target.member.warnings == 2 {
        Some(cascade_outcome(pool, &target).await?)
    } else {
        None
    };

    let mut tx = pool.begin().await?;
    let new_role = apply_warn(&mut tx, &target, cascade, &caller.nick, description, None).await?;
    tx.commit().await?;

    Ok(ActionOutcome {
        nick: target.member.nick,
        new_role,
    })
}

pub(crate) fn warnable(target: &MemberWithRole, caller: &CallerContext) -> bool {
    target.role.name != ENTRY_ROLE
        && target.role.hierarchy_position <= caller.role.demote_until_role_position
}

/// What the third warning turns into: firing at the ladder floor, otherwise
/// one demotion step.
#[derive(Debug, Clone)]
pub(crate) enum CascadeOutcome {
    Fire,
    Demote(Role),
}

pub(crate) async fn cascade_outcome(
    pool: &SqlitePool,
    target: &MemberWithRole,
) -> AppResult<CascadeOutcome> {
    if DEMOTION_FLOORS.contains(&target.role.name.as_str()) {
        return Ok(CascadeOutcome::Fire);
    }

    role_at(
        pool,
        target.role.hierarchy_kind,
        target.role.hierarchy_position - 1,
    )
    .await?
    .map(CascadeOutcome::Demote)
    .ok_or_else(|| AppError::forbidden("Esse usuário não pode ser advertido."))
}

/// Warning mutation. The WARNING entry is always written first; when
/// `cascade` is set the demotion-or-fire follows in the same transaction and
/// every WARNING entry of the target is deactivated.
pub(crate) async fn apply_warn(
    tx: &mut Transaction<'_, Sqlite>,
    target: &MemberWithRole,
    cascade: Option<CascadeOutcome>,
    author: &str,
    description: &str,
    multiple_id: Option<Uuid>,
) -> AppResult<Option<String>> {
    insert_log(
        tx,
        LogEntry {
            author,
            target_id: target.member.id,
            action: ActionType::Warning,
            description,
            new_role: None,
            bonus_in_role: None,
            multiple_id,
        },
    )
    .await?;

    let Some(cascade) = cascade else {
        let updated = sqlx::query(
            "UPDATE members SET warnings = warnings + 1, updated_at = ? \
             WHERE nick = ? AND warnings = ?",
        )
        .bind(utils::utc_now())
        .bind(&target.member.nick)
        .bind(target.member.warnings)
        .execute(&mut **tx)
        .await?;
        ensure_updated(updated)?;

        return Ok(None);
    };

    let new_role = match &cascade {
        CascadeOutcome::Fire => {
            sqlx::query("DELETE FROM permissions_obtained WHERE member_id = ?")
                .bind(target.member.id)
                .execute(&mut **tx)
                .await?;

            sqlx::query("DELETE FROM member_department_roles WHERE member_id = ?")
                .bind(target.member.id)
                .execute(&mut **tx)
                .await?;

            let updated = sqlx::query(
                "UPDATE members SET role_name = ?, is_account_active = 0, warnings = 0, \
                 bonus_in_role = 0, updated_at = ? WHERE nick = ? AND role_name = ?",
            )
            .bind(ENTRY_ROLE)
            .bind(utils::utc_now())
            .bind(&target.member.nick)
            .bind(&target.member.role_name)
            .execute(&mut **tx)
            .await?;
            ensure_updated(updated)?;

            ENTRY_ROLE.to_string()
        }
        CascadeOutcome::Demote(next_role) => {
            let updated = sqlx::query(
                "UPDATE members SET role_name = ?, warnings = 0, updated_at = ? \
                 WHERE nick = ? AND role_name = ?",
            )
            .bind(&next_role.name)
            .bind(utils::utc_now())
            .bind(&target.member.nick)
            .bind(&target.member.role_name)
            .execute(&mut **tx)
            .await?;
            ensure_updated(updated)?;

            next_role.name.clone()
        }
    };

    insert_log(
        tx,
        LogEntry {
            author: SYSTEM_AUTHOR,
            target_id: target.member.id,
            action: match cascade {
                CascadeOutcome::Fire => ActionType::Fire,
                CascadeOutcome::Demote(_) => ActionType::Demotion,
            },
            description: "Acúmulo de 3 advertências.",
            new_role: Some(&new_role),
            bonus_in_role: None,
            multiple_id,
        },
    )
    .await?;

    // Spent warnings no longer count toward the next cascade.
    sqlx::query("UPDATE activity_log SET is_active = 0 WHERE target_id = ? AND action = 'WARNING'")
        .bind(target.member.id)
        .execute(&mut **tx)
        .await?;

    Ok(Some(new_role))
}

pub async fn bonify(
    pool: &SqlitePool,
    caller: &CallerContext,
    nick: &str,
    reason: &str,
) -> AppResult<()> {
    let target = fetch_member_with_role(pool, nick).await?;

    let target = match target {
        Some(target)
            if target.role.hierarchy_position <= caller.role.gratify_until_role_position
                || reason == RECRUITMENT_REASON =>
        {
            target
        }
        _ => return Err(AppError::bad_request("Você não pode bonificar esse usuário.")),
    };

    let today: Vec<(String, chrono::DateTime<chrono::Utc>)> = sqlx::query_as(
        "SELECT reason, created_at FROM bonifications \
         WHERE target_id = ? AND created_at >= ? ORDER BY created_at DESC",
    )
    .bind(target.member.id)
    .bind(utils::start_of_today())
    .fetch_all(pool)
    .await?;

    if today.len() as i64 >= DAILY_BONUS_LIMIT {
        return Err(AppError::bad_request("O policial já foi gratificado 3x hoje."));
    }

    if !today.is_empty() && reason != RECRUITMENT_REASON {
        let last_counted = today.iter().find(|(reason, _)| reason != RECRUITMENT_REASON);
        if let Some((_, created_at)) = last_counted {
            if (utils::utc_now() - *created_at).num_minutes() < BONUS_COOLDOWN_MINUTES {
                return Err(AppError::bad_request(
                    "Aguarde 30 minutos após a última bonificação deste policial antes de postar uma nova.",
                ));
            }
        }
    }

    let gains = if reason == RECRUITMENT_REASON || reason == INTERACTION_REASON {
        10
    } else {
        5
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE members SET bonus_in_role = bonus_in_role + ?, total_bonus = total_bonus + ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(gains)
    .bind(gains)
    .bind(utils::utc_now())
    .bind(target.member.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO bonifications (target_id, author, reason, gains) VALUES (?, ?, ?, ?)")
        .bind(target.member.id)
        .bind(&caller.nick)
        .bind(reason)
        .bind(gains)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

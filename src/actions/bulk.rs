//! Bulk demote/fire/warn.
//!
//! Fail-closed: every nickname is resolved and validated before any mutation
//! starts, and one bad entry rejects the whole batch. Execution then runs one
//! transaction per member, tagged with a shared correlation id and preceded
//! by a pre-image snapshot. Per-member failures after validation are logged
//! and counted, not rolled back across members.

use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::task::JoinSet;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    apply_demotion, apply_fire, apply_warn, cascade_outcome, demotable, require_actor_permissions,
    role_at, warnable, CascadeOutcome,
};
use crate::authz::{CallerContext, TOP_RANKS};
use crate::errors::{AppError, AppResult};
use crate::habbo::IdentityResolver;
use crate::models::member::{fetch_member_with_role, MemberWithRole};
use crate::models::permission::PermissionAction;

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkOutcome {
    pub multiple_id: Uuid,
    pub applied: usize,
    pub failed: usize,
}

enum PlannedMutation {
    Demote { new_role: String },
    Fire,
    Warn { cascade: Option<CascadeOutcome> },
}

struct PlannedTarget {
    target: MemberWithRole,
    mutation: PlannedMutation,
}

/// Resolve and load every non-blank nickname, rejecting the batch on the
/// first unknown member or exempt top rank.
async fn load_targets(
    pool: &SqlitePool,
    resolver: &dyn IdentityResolver,
    nicks: &[String],
) -> AppResult<Vec<MemberWithRole>> {
    let mut targets = Vec::with_capacity(nicks.len());

    for nick in nicks {
        let nick = nick.trim();
        if nick.is_empty() {
            continue;
        }

        let profile = resolver.resolve(nick).await?;
        let target = fetch_member_with_role(pool, &profile.name)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Usuário {nick} não encontrado.")))?;

        if TOP_RANKS.contains(&target.role.name.as_str()) {
            return Err(AppError::unauthorized(format!(
                "{nick} não pode ser alvo de ações em massa."
            )));
        }

        targets.push(target);
    }

    Ok(targets)
}

pub async fn demote_many(
    pool: &SqlitePool,
    resolver: &dyn IdentityResolver,
    caller: &CallerContext,
    nicks: &[String],
    description: &str,
) -> AppResult<BulkOutcome> {
    require_actor_permissions(
        pool,
        caller,
        PermissionAction::Demote,
        "Você ainda não tem permissão para rebaixar.",
    )
    .await?;

    let targets = load_targets(pool, resolver, nicks).await?;

    let mut planned = Vec::with_capacity(targets.len());
    for target in targets {
        if !demotable(&target, caller) {
            return Err(AppError::unauthorized(format!(
                "Você não pode rebaixar {}.",
                target.member.nick
            )));
        }

        let new_role = role_at(
            pool,
            target.role.hierarchy_kind,
            target.role.hierarchy_position - 1,
        )
        .await?
        .ok_or_else(|| {
            AppError::forbidden(format!("{} não pode ser rebaixado.", target.member.nick))
        })?;

        planned.push(PlannedTarget {
            target,
            mutation: PlannedMutation::Demote {
                new_role: new_role.name,
            },
        });
    }

    execute(pool, caller, planned, description).await
}

pub async fn fire_many(
    pool: &SqlitePool,
    resolver: &dyn IdentityResolver,
    caller: &CallerContext,
    nicks: &[String],
    description: &str,
) -> AppResult<BulkOutcome> {
    require_actor_permissions(
        pool,
        caller,
        PermissionAction::Fire,
        "Você ainda não tem permissão para demitir.",
    )
    .await?;

    let targets = load_targets(pool, resolver, nicks).await?;

    let mut planned = Vec::with_capacity(targets.len());
    for target in targets {
        if target.role.hierarchy_position > caller.role.fire_until_role_position {
            return Err(AppError::unauthorized(format!(
                "Você não pode demitir {}.",
                target.member.nick
            )));
        }

        planned.push(PlannedTarget {
            target,
            mutation: PlannedMutation::Fire,
        });
    }

    execute(pool, caller, planned, description).await
}

pub async fn warn_many(
    pool: &SqlitePool,
    resolver: &dyn IdentityResolver,
    caller: &CallerContext,
    nicks: &[String],
    description: &str,
) -> AppResult<BulkOutcome> {
    require_actor_permissions(
        pool,
        caller,
        PermissionAction::Warn,
        "Você ainda não tem permissão para advertir.",
    )
    .await?;

    let targets = load_targets(pool, resolver, nicks).await?;

    let mut planned = Vec::with_capacity(targets.len());
    for target in targets {
        if !warnable(&target, caller) {
            return Err(AppError::unauthorized(format!(
                "Você não pode advertir {}.",
                target.member.nick
            )));
        }

        // Cascade destinations resolve during validation so a catalog gap
        // cannot surface halfway through the batch.
        let cascade = if target.member.warnings == 2 {
            Some(cascade_outcome(pool, &target).await?)
        } else {
            None
        };

        planned.push(PlannedTarget {
            target,
            mutation: PlannedMutation::Warn { cascade },
        });
    }

    execute(pool, caller, planned, description).await
}

async fn insert_snapshot(
    tx: &mut Transaction<'_, Sqlite>,
    multiple_id: Uuid,
    target: &MemberWithRole,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO bulk_snapshots \
         (multiple_id, member_id, role_name, last_promoted, bonus_in_role, total_bonus, warnings) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(multiple_id)
    .bind(target.member.id)
    .bind(&target.member.role_name)
    .bind(target.member.last_promoted)
    .bind(target.member.bonus_in_role)
    .bind(target.member.total_bonus)
    .bind(target.member.warnings)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn execute(
    pool: &SqlitePool,
    caller: &CallerContext,
    planned: Vec<PlannedTarget>,
    description: &str,
) -> AppResult<BulkOutcome> {
    let multiple_id = Uuid::new_v4();
    let mut set = JoinSet::new();

    for entry in planned {
        let pool = pool.clone();
        let author = caller.nick.clone();
        let description = description.to_string();

        set.spawn(async move {
            let nick = entry.target.member.nick.clone();
            let result = apply_one(&pool, multiple_id, entry, &author, &description).await;
            (nick, result)
        });
    }

    let mut applied = 0;
    let mut failed = 0;

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Ok(()))) => applied += 1,
            Ok((nick, Err(err))) => {
                tracing::error!(%nick, %multiple_id, error = %err, "bulk mutation failed");
                failed += 1;
            }
            Err(err) => {
                tracing::error!(%multiple_id, error = %err, "bulk task aborted");
                failed += 1;
            }
        }
    }

    Ok(BulkOutcome {
        multiple_id,
        applied,
        failed,
    })
}

async fn apply_one(
    pool: &SqlitePool,
    multiple_id: Uuid,
    entry: PlannedTarget,
    author: &str,
    description: &str,
) -> AppResult<()> {
    let mut tx = pool.begin().await?;

    insert_snapshot(&mut tx, multiple_id, &entry.target).await?;

    match entry.mutation {
        PlannedMutation::Demote { new_role } => {
            apply_demotion(
                &mut tx,
                &entry.target,
                &new_role,
                author,
                description,
                Some(multiple_id),
            )
            .await?;
        }
        PlannedMutation::Fire => {
            apply_fire(&mut tx, &entry.target, author, description, Some(multiple_id)).await?;
        }
        PlannedMutation::Warn { cascade } => {
            apply_warn(
                &mut tx,
                &entry.target,
                cascade,
                author,
                description,
                Some(multiple_id),
            )
            .await?;
        }
    }

    tx.commit().await?;

    Ok(())
}

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use pme_system::authz::CallerContext;
use pme_system::errors::AppResult;
use pme_system::habbo::{HabboProfile, IdentityResolver};
use pme_system::jwt::JwtConfig;

pub const MILITARY: [&str; 15] = [
    "Recruta",
    "Soldado",
    "Cabo",
    "Sargento",
    "Subtenente",
    "Aspirante a Oficial",
    "Tenente",
    "Capitão",
    "Major",
    "Coronel",
    "General",
    "Comandante",
    "Comandante-Geral",
    "Conselheiro",
    "Supremo",
];

pub const EXECUTIVE: [&str; 11] = [
    "Estagiário",
    "Analista",
    "Agente",
    "Inspetor",
    "Perito",
    "Escrivão",
    "Investigador",
    "Delegado",
    "Comissário",
    "Diretor",
    "Chanceler",
];

const PROMOTION_RANGE: [i64; 15] = [0, 0, 0, 0, 1, 2, 4, 4, 5, 6, 7, 8, 9, 11, 12];
const DAYS_TO_BE_PROMOTED: [i64; 15] = [0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0];

/// Temp-file SQLite pool with migrations applied. The returned directory must
/// stay alive for the duration of the test.
pub async fn setup_pool() -> anyhow::Result<(SqlitePool, TempDir)> {
    let dir = tempfile::tempdir()?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
            .await?;
    migrator.run(&pool).await?;

    Ok((pool, dir))
}

/// Both rank ladders with the production threshold formulas.
pub async fn seed_roles(pool: &SqlitePool) -> anyhow::Result<()> {
    for (index, name) in MILITARY.iter().enumerate() {
        insert_role(pool, name, "MILITARY", index as i64).await?;
    }
    for (index, name) in EXECUTIVE.iter().enumerate() {
        insert_role(pool, name, "EXECUTIVE", index as i64 + 2).await?;
    }

    Ok(())
}

async fn insert_role(pool: &SqlitePool, name: &str, kind: &str, position: i64) -> anyhow::Result<()> {
    let demote = if position <= 4 { 0 } else { position - 1 };
    let fire = if position <= 5 { 0 } else { position - 1 };

    sqlx::query(
        "INSERT INTO roles (name, hierarchy_kind, hierarchy_position, \
         promotes_until_role_position, demote_until_role_position, fire_until_role_position, \
         gratify_until_role_position, days_to_be_promoted) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(kind)
    .bind(position)
    .bind(PROMOTION_RANGE[position as usize])
    .bind(demote)
    .bind(fire)
    .bind(demote)
    .bind(DAYS_TO_BE_PROMOTED[position as usize])
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn insert_member(pool: &SqlitePool, nick: &str, role: &str) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query("INSERT INTO members (id, nick, is_account_active, role_name) VALUES (?, ?, 1, ?)")
        .bind(id)
        .bind(nick)
        .bind(role)
        .execute(pool)
        .await?;

    Ok(id)
}

pub async fn deactivate(pool: &SqlitePool, nick: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE members SET is_account_active = 0 WHERE nick = ?")
        .bind(nick)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn set_warnings(pool: &SqlitePool, nick: &str, warnings: i64) -> anyhow::Result<()> {
    sqlx::query("UPDATE members SET warnings = ? WHERE nick = ?")
        .bind(warnings)
        .bind(nick)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn set_admin(pool: &SqlitePool, nick: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE members SET is_admin = 1 WHERE nick = ?")
        .bind(nick)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn grant_course(pool: &SqlitePool, member_id: Uuid, name: &str) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO permissions_obtained (member_id, name, full_name, kind) \
         VALUES (?, ?, ?, 'COURSE')",
    )
    .bind(member_id)
    .bind(name)
    .bind(name)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn grant_other(pool: &SqlitePool, member_id: Uuid, name: &str) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO permissions_obtained (member_id, name, full_name, kind) \
         VALUES (?, ?, ?, 'OTHER')",
    )
    .bind(member_id)
    .bind(name)
    .bind(name)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn add_rule(
    pool: &SqlitePool,
    action: &str,
    name: &str,
    kind: &str,
    role_name: Option<&str>,
    hierarchy_kind: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO permissions_required (action, name, kind, role_name, hierarchy_kind) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(action)
    .bind(name)
    .bind(kind)
    .bind(role_name)
    .bind(hierarchy_kind)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn add_department_role(
    pool: &SqlitePool,
    acronym: &str,
    name: &str,
    department: &str,
    power_level: i64,
) -> anyhow::Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO department_roles (acronym, name, department, power_level) \
         VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(acronym)
    .bind(name)
    .bind(department)
    .bind(power_level)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

pub async fn assign_department_role(
    pool: &SqlitePool,
    member_id: Uuid,
    department_role_id: i64,
    department: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO member_department_roles (member_id, department_role_id, department) \
         VALUES (?, ?, ?)",
    )
    .bind(member_id)
    .bind(department_role_id)
    .bind(department)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn add_course(
    pool: &SqlitePool,
    acronym: &str,
    name: &str,
    department: &str,
    power_needed: i64,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO courses (acronym, name, department, power_needed) VALUES (?, ?, ?, ?)",
    )
    .bind(acronym)
    .bind(name)
    .bind(department)
    .bind(power_needed)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn caller(pool: &SqlitePool, nick: &str) -> anyhow::Result<CallerContext> {
    Ok(CallerContext::load(pool, nick).await?)
}

/// Identity resolver that answers every nick as-is, with a fixed motto.
#[derive(Default)]
pub struct StubResolver {
    pub motto: String,
}

impl StubResolver {
    pub fn with_motto(motto: &str) -> Self {
        Self {
            motto: motto.to_string(),
        }
    }
}

#[async_trait]
impl IdentityResolver for StubResolver {
    async fn resolve(&self, nick: &str) -> AppResult<HabboProfile> {
        Ok(HabboProfile {
            name: nick.to_string(),
            motto: self.motto.clone(),
            unique_id: format!("hh-{nick}"),
        })
    }
}

pub async fn test_app(pool: SqlitePool, resolver: Arc<dyn IdentityResolver>) -> anyhow::Result<Router> {
    std::env::set_var("JWT_SECRET", "test-secret");

    Ok(pme_system::create_app_with_resolver(pool, resolver).await?)
}

pub fn bearer(member_id: Uuid, nick: &str) -> anyhow::Result<String> {
    std::env::set_var("JWT_SECRET", "test-secret");
    let token = JwtConfig::from_env()?.encode(member_id, nick)?;

    Ok(format!("Bearer {token}"))
}

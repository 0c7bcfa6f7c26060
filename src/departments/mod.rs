//! Department role engine: department-scoped titles, power-level gating and
//! course/class posting.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use utoipa::{IntoParams, ToSchema};

use crate::actions::query::QueryScope;
use crate::authz::{CallerContext, ENTRY_ROLE, SPECIALIZATION_DEPARTMENT};
use crate::errors::{AppError, AppResult};
use crate::habbo::IdentityResolver;
use crate::models::activity::ActionType;
use crate::models::department::{
    Class, Course, DepartmentMember, DepartmentRole, PostClassRequest, RemoveRoleRequest,
    SetRoleRequest,
};
use crate::models::member::Member;
use crate::utils;

/// Departments whose roles may post classes at face-value power.
const POSTING_DEPARTMENTS: [&str; 3] = ["INS", "EFEX", "CDO"];

/// Power required to list every class in a department instead of one's own.
const COORD_POWER: i64 = 10;

/// Entry-level course: approval turns a brand-new nickname into a member.
const ENTRY_COURSE: &str = "CFPM";
const ENTRY_COURSE_ROLE: &str = "Soldado";

/// Courses that grant a persistent OTHER permission besides the COURSE one.
const PRIVILEGE_COURSES: [&str; 3] = ["CDO", "ESbt", "CApEx"];

const PAGE_SIZE: i64 = 10;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ClassQuery {
    pub department: String,
    #[serde(default)]
    pub scope: QueryScope,
    pub search: Option<String>,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClassesPage {
    pub total: i64,
    pub rows: Vec<Class>,
}

/// Grant a department role, replacing whatever the member held in that
/// department. The granter's power must strictly exceed the role's.
pub async fn set_member_role(
    pool: &SqlitePool,
    caller: &CallerContext,
    req: &SetRoleRequest,
) -> AppResult<()> {
    let role = sqlx::query_as::<_, DepartmentRole>(
        "SELECT id, acronym, name, department, power_level FROM department_roles WHERE name = ?",
    )
    .bind(&req.role_name)
    .fetch_optional(pool)
    .await?;

    let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE nick = ?")
        .bind(&req.nick)
        .fetch_optional(pool)
        .await?;

    let (Some(role), Some(member)) = (role, member) else {
        return Err(AppError::not_found("Cargo e/ou usuário não encontrado."));
    };

    if member.role_name == ENTRY_ROLE {
        return Err(AppError::unauthorized(
            "Você não pode dar um cargo para esse usuário...",
        ));
    }

    let power = caller.department_power(&role.department);
    if !power.is_some_and(|power| power > role.power_level) {
        return Err(AppError::unauthorized(
            "Você não tem permissão para distribuir esse cargo.",
        ));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM member_department_roles WHERE member_id = ? AND department = ?")
        .bind(member.id)
        .bind(&role.department)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO member_department_roles (member_id, department_role_id, department) \
         VALUES (?, ?, ?)",
    )
    .bind(member.id)
    .bind(role.id)
    .bind(&role.department)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}

pub async fn remove_member_role(
    pool: &SqlitePool,
    caller: &CallerContext,
    req: &RemoveRoleRequest,
) -> AppResult<()> {
    let held: Option<(i64, i64)> = sqlx::query_as(
        "SELECT dr.id, dr.power_level \
         FROM member_department_roles mdr \
         JOIN department_roles dr ON dr.id = mdr.department_role_id \
         JOIN members m ON m.id = mdr.member_id \
         WHERE m.nick = ? AND mdr.department = ?",
    )
    .bind(&req.nick)
    .bind(&req.department)
    .fetch_optional(pool)
    .await?;

    let (role_id, power_level) =
        held.ok_or_else(|| AppError::not_found("Usuário não encontrado."))?;

    let power = caller.department_power(&req.department);
    if !power.is_some_and(|power| power > power_level) {
        return Err(AppError::unauthorized(
            "Você não pode remover esse usuário da função.",
        ));
    }

    sqlx::query(
        "DELETE FROM member_department_roles \
         WHERE department_role_id = ? AND member_id = (SELECT id FROM members WHERE nick = ?)",
    )
    .bind(role_id)
    .bind(&req.nick)
    .execute(pool)
    .await?;

    Ok(())
}

/// Role names in a department the caller may hand out (strictly below its
/// own power), most senior first.
pub async fn changeable_roles(
    pool: &SqlitePool,
    caller: &CallerContext,
    department: &str,
) -> AppResult<Vec<String>> {
    let power = caller
        .department_power(department)
        .ok_or_else(|| AppError::unauthorized("Sem permissão para gerenciar essa função."))?;

    let names = sqlx::query_scalar::<_, String>(
        "SELECT name FROM department_roles WHERE department = ? AND power_level < ? \
         ORDER BY power_level DESC",
    )
    .bind(department)
    .bind(power)
    .fetch_all(pool)
    .await?;

    Ok(names)
}

pub async fn department_members(
    pool: &SqlitePool,
    department: &str,
) -> AppResult<Vec<DepartmentMember>> {
    let rows = sqlx::query_as::<_, DepartmentMember>(
        "SELECT m.nick, dr.name AS role_name, dr.power_level, mdr.created_at \
         FROM member_department_roles mdr \
         JOIN department_roles dr ON dr.id = mdr.department_role_id \
         JOIN members m ON m.id = mdr.member_id \
         WHERE mdr.department = ? ORDER BY dr.power_level DESC",
    )
    .bind(department)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Every course the caller's department standings allow posting classes for.
pub async fn courses_allowed_to_post(
    pool: &SqlitePool,
    caller: &CallerContext,
) -> AppResult<Vec<Course>> {
    if caller.is_top_rank() {
        let all = sqlx::query_as::<_, Course>(
            "SELECT acronym, name, document, department, power_needed FROM courses",
        )
        .fetch_all(pool)
        .await?;

        return Ok(all);
    }

    let mut courses = Vec::new();
    for held in &caller.department_roles {
        let department = held.department.as_str();
        if !POSTING_DEPARTMENTS.contains(&department) && department != SPECIALIZATION_DEPARTMENT {
            continue;
        }

        // department_power folds in the specialization derivation.
        let Some(power) = caller.department_power(department) else {
            continue;
        };

        let mut allowed = sqlx::query_as::<_, Course>(
            "SELECT acronym, name, document, department, power_needed FROM courses \
             WHERE department = ? AND power_needed <= ?",
        )
        .bind(department)
        .bind(power)
        .fetch_all(pool)
        .await?;

        courses.append(&mut allowed);
    }

    Ok(courses)
}

pub async fn course(
    pool: &SqlitePool,
    caller: &CallerContext,
    acronym: &str,
) -> AppResult<Course> {
    let course = sqlx::query_as::<_, Course>(
        "SELECT acronym, name, document, department, power_needed FROM courses WHERE acronym = ?",
    )
    .bind(acronym)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Curso inexistente"))?;

    let power = caller.department_power(&course.department);
    if !power.is_some_and(|power| power >= course.power_needed) {
        return Err(AppError::unauthorized("Sem permissão para acessar o curso."));
    }

    Ok(course)
}

pub async fn department_courses(
    pool: &SqlitePool,
    caller: &CallerContext,
    department: &str,
) -> AppResult<Vec<Course>> {
    let department = department.to_uppercase();

    let power = caller
        .department_power(&department)
        .ok_or_else(|| AppError::unauthorized("Você não tem permissão para ver essa função."))?;

    let courses = sqlx::query_as::<_, Course>(
        "SELECT acronym, name, document, department, power_needed FROM courses \
         WHERE department = ? AND power_needed <= ?",
    )
    .bind(&department)
    .bind(power)
    .fetch_all(pool)
    .await?;

    Ok(courses)
}

fn push_class_filters(qb: &mut QueryBuilder<'_, Sqlite>, caller: &CallerContext, query: &ClassQuery) {
    qb.push(" WHERE department = ").push_bind(query.department.to_uppercase());

    if query.scope == QueryScope::Mine {
        qb.push(" AND author = ").push_bind(caller.nick.clone());
    }

    if let Some(search) = query.search.as_deref().filter(|term| !term.is_empty()) {
        let pattern = format!("%{search}%");

        qb.push(" AND (author LIKE ").push_bind(pattern.clone());
        qb.push(" OR approved LIKE ").push_bind(pattern.clone());
        qb.push(" OR failed LIKE ").push_bind(pattern.clone());
        qb.push(" OR course_acronym LIKE ").push_bind(pattern.clone());
        qb.push(" OR room LIKE ").push_bind(pattern);

        if let Ok(date) = NaiveDate::parse_from_str(search, "%d/%m/%Y") {
            let (begin, end) = utils::local_day_bounds(date);
            qb.push(" OR (applied_at >= ").push_bind(begin);
            qb.push(" AND applied_at < ").push_bind(end);
            qb.push(")");
        }

        if let Ok(id) = search.parse::<i64>() {
            qb.push(" OR id = ").push_bind(id);
        }

        qb.push(")");
    }
}

pub async fn department_classes(
    pool: &SqlitePool,
    caller: &CallerContext,
    query: &ClassQuery,
) -> AppResult<ClassesPage> {
    let power = caller
        .department_power(&query.department.to_uppercase())
        .ok_or_else(|| AppError::unauthorized("Você não tem permissão para ver essa função."))?;

    if query.scope == QueryScope::All && power < COORD_POWER {
        return Err(AppError::unauthorized("Você só pode ver suas próprias aulas."));
    }

    let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM classes");
    push_class_filters(&mut count_qb, caller, query);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb = QueryBuilder::new(
        "SELECT id, course_acronym, author, approved, failed, room, department, applied_at \
         FROM classes",
    );
    push_class_filters(&mut qb, caller, query);
    qb.push(" ORDER BY applied_at DESC LIMIT ").push_bind(PAGE_SIZE);
    qb.push(" OFFSET ").push_bind(query.offset.max(0));

    let rows = qb.build_query_as::<Class>().fetch_all(pool).await?;

    Ok(ClassesPage { total, rows })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Post a class: grant the course to every approved nick, log the approvals
/// and record the class, all in one transaction.
pub async fn post_class(
    pool: &SqlitePool,
    resolver: &dyn IdentityResolver,
    caller: &CallerContext,
    req: &PostClassRequest,
) -> AppResult<()> {
    let course = sqlx::query_as::<_, Course>(
        "SELECT acronym, name, document, department, power_needed FROM courses WHERE acronym = ?",
    )
    .bind(&req.course_acronym)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Curso inexistente"))?;

    let power = caller.department_power(&course.department);
    if !power.is_some_and(|power| power >= course.power_needed) {
        return Err(AppError::unauthorized("Sem autorização."));
    }

    // Single-character entries are treated as blanks and skipped.
    let mut approved = Vec::with_capacity(req.approved.len());
    for nick in &req.approved {
        if nick.trim().len() <= 1 {
            continue;
        }

        let profile = resolver.resolve(nick.trim()).await.map_err(|_| {
            AppError::bad_request(
                "Um dos aprovados não existe no habbo, confirme os nicks antes de tentar novamente.",
            )
        })?;

        approved.push(profile.name);
    }

    if course.acronym == ENTRY_COURSE {
        provision_entry_members(pool, &approved).await?;
    }

    let mut members = Vec::with_capacity(approved.len());
    for nick in &approved {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE nick = ?")
            .bind(nick)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| {
                AppError::bad_request(
                    "Um dos usuários não pode receber o curso por não estar cadastrado no system.",
                )
            })?;

        members.push(member);
    }

    let mut tx = pool.begin().await?;

    for member in &members {
        let grant = sqlx::query(
            "INSERT INTO permissions_obtained (member_id, name, full_name, kind) \
             VALUES (?, ?, ?, 'COURSE')",
        )
        .bind(member.id)
        .bind(&course.acronym)
        .bind(&course.name)
        .execute(&mut *tx)
        .await;

        if let Err(err) = grant {
            if is_unique_violation(&err) {
                return Err(AppError::bad_request("Algum dos usuários já tem esse curso ativo."));
            }
            return Err(err.into());
        }

        if PRIVILEGE_COURSES.contains(&course.acronym.as_str()) {
            sqlx::query(
                "INSERT INTO permissions_obtained (member_id, name, full_name, kind) \
                 VALUES (?, ?, ?, 'OTHER')",
            )
            .bind(member.id)
            .bind(&course.acronym)
            .bind(&course.name)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "INSERT INTO activity_log (author, target_id, action, description, course_acronym) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&caller.nick)
        .bind(member.id)
        .bind(ActionType::Approvation)
        .bind(&req.description)
        .bind(&course.acronym)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "INSERT INTO classes (course_acronym, author, approved, failed, room, department) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&course.acronym)
    .bind(&caller.nick)
    .bind(approved.join(" | "))
    .bind(req.failed.join(" | "))
    .bind(&req.room)
    .bind(&course.department)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}

/// The entry-level course enrolls brand-new nicknames as members at the low
/// rank. Serving members above the entry rank cannot retake it.
async fn provision_entry_members(pool: &SqlitePool, approved: &[String]) -> AppResult<()> {
    for nick in approved {
        let member = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE nick = ?")
            .bind(nick)
            .fetch_optional(pool)
            .await?;

        match member {
            Some(member) if member.role_name != ENTRY_ROLE => {
                return Err(AppError::bad_request(
                    "Um dos aprovados é militar ativo e não pode receber o CFPM.",
                ));
            }
            Some(member) => {
                sqlx::query("UPDATE members SET role_name = ?, updated_at = ? WHERE id = ?")
                    .bind(ENTRY_COURSE_ROLE)
                    .bind(utils::utc_now())
                    .bind(member.id)
                    .execute(pool)
                    .await?;
            }
            None => {
                sqlx::query("INSERT INTO members (id, nick, role_name) VALUES (?, ?, ?)")
                    .bind(uuid::Uuid::new_v4())
                    .bind(nick)
                    .bind(ENTRY_COURSE_ROLE)
                    .execute(pool)
                    .await?;
            }
        }
    }

    Ok(())
}

mod common;

use pme_system::departments::{self, ClassQuery};
use pme_system::errors::AppError;
use pme_system::models::department::{PostClassRequest, RemoveRoleRequest, SetRoleRequest};
use pme_system::actions::query::QueryScope;

use common::StubResolver;

async fn seed_ins(pool: &sqlx::SqlitePool) -> anyhow::Result<(i64, i64)> {
    let base = common::add_department_role(pool, "INS", "Instrutor", "INS", 1).await?;
    let coord =
        common::add_department_role(pool, "C.INS", "Coordenador dos Instrutores", "INS", 10).await?;

    Ok((base, coord))
}

#[tokio::test]
async fn coordinators_hand_out_weaker_roles_only() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    let (base, coord) = seed_ins(&pool).await?;

    let granter_id = common::insert_member(&pool, "Coord", "Tenente").await?;
    common::assign_department_role(&pool, granter_id, coord, "INS").await?;
    let member_id = common::insert_member(&pool, "Membro", "Cabo").await?;

    let caller = common::caller(&pool, "Coord").await?;
    departments::set_member_role(
        &pool,
        &caller,
        &SetRoleRequest {
            nick: "Membro".to_string(),
            role_name: "Instrutor".to_string(),
        },
    )
    .await?;

    let held: i64 = sqlx::query_scalar(
        "SELECT department_role_id FROM member_department_roles WHERE member_id = ?",
    )
    .bind(member_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(held, base);

    // Equal power is not enough to hand out the coordinator role.
    let err = departments::set_member_role(
        &pool,
        &caller,
        &SetRoleRequest {
            nick: "Membro".to_string(),
            role_name: "Coordenador dos Instrutores".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn assignment_replaces_within_the_department() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    let (base, _) = seed_ins(&pool).await?;
    let aux =
        common::add_department_role(&pool, "AL.INS", "Auxiliar dos Instrutores", "INS", 2).await?;

    common::insert_member(&pool, "Chefe", "Supremo").await?;
    let member_id = common::insert_member(&pool, "Membro", "Cabo").await?;
    common::assign_department_role(&pool, member_id, base, "INS").await?;

    let caller = common::caller(&pool, "Chefe").await?;
    departments::set_member_role(
        &pool,
        &caller,
        &SetRoleRequest {
            nick: "Membro".to_string(),
            role_name: "Auxiliar dos Instrutores".to_string(),
        },
    )
    .await?;

    let held: Vec<i64> = sqlx::query_scalar(
        "SELECT department_role_id FROM member_department_roles WHERE member_id = ?",
    )
    .bind(member_id)
    .fetch_all(&pool)
    .await?;
    assert_eq!(held, vec![aux]);

    Ok(())
}

#[tokio::test]
async fn recruits_cannot_hold_department_roles() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    seed_ins(&pool).await?;

    common::insert_member(&pool, "Chefe", "Supremo").await?;
    common::insert_member(&pool, "Cru", "Recruta").await?;

    let caller = common::caller(&pool, "Chefe").await?;
    let err = departments::set_member_role(
        &pool,
        &caller,
        &SetRoleRequest {
            nick: "Cru".to_string(),
            role_name: "Instrutor".to_string(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn removal_requires_more_power_than_the_holder() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    let (base, coord) = seed_ins(&pool).await?;

    let coord_id = common::insert_member(&pool, "Coord", "Tenente").await?;
    common::assign_department_role(&pool, coord_id, coord, "INS").await?;
    let member_id = common::insert_member(&pool, "Membro", "Cabo").await?;
    common::assign_department_role(&pool, member_id, base, "INS").await?;

    let caller = common::caller(&pool, "Coord").await?;
    departments::remove_member_role(
        &pool,
        &caller,
        &RemoveRoleRequest {
            nick: "Membro".to_string(),
            department: "INS".to_string(),
        },
    )
    .await?;

    let held: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM member_department_roles WHERE member_id = ?")
            .bind(member_id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(held, 0);

    // The member cannot strip the coordinator.
    let member = common::caller(&pool, "Membro").await?;
    let err = departments::remove_member_role(
        &pool,
        &member,
        &RemoveRoleRequest {
            nick: "Coord".to_string(),
            department: "INS".to_string(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn changeable_roles_list_strictly_below_own_power() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    let (_, coord) = seed_ins(&pool).await?;
    common::add_department_role(&pool, "AL.INS", "Auxiliar dos Instrutores", "INS", 2).await?;

    let coord_id = common::insert_member(&pool, "Coord", "Tenente").await?;
    common::assign_department_role(&pool, coord_id, coord, "INS").await?;

    let caller = common::caller(&pool, "Coord").await?;
    let names = departments::changeable_roles(&pool, &caller, "INS").await?;
    assert_eq!(
        names,
        vec!["Auxiliar dos Instrutores".to_string(), "Instrutor".to_string()]
    );

    // No standing in the department at all.
    common::insert_member(&pool, "Fora", "Cabo").await?;
    let outsider = common::caller(&pool, "Fora").await?;
    let err = departments::changeable_roles(&pool, &outsider, "INS")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn course_access_is_power_gated() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    let (base, _) = seed_ins(&pool).await?;
    common::add_course(&pool, "COrt", "Curso de Ortografia", "INS", 1).await?;

    let member_id = common::insert_member(&pool, "Instrutor", "Cabo").await?;
    common::assign_department_role(&pool, member_id, base, "INS").await?;
    common::insert_member(&pool, "Fora", "Cabo").await?;

    let insider = common::caller(&pool, "Instrutor").await?;
    let course = departments::course(&pool, &insider, "COrt").await?;
    assert_eq!(course.department, "INS");

    let outsider = common::caller(&pool, "Fora").await?;
    let err = departments::course(&pool, &outsider, "COrt").await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "got {err}");

    let err = departments::course(&pool, &insider, "XXX").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn top_ranks_may_post_everything() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    common::add_course(&pool, "COrt", "Curso de Ortografia", "INS", 1).await?;
    common::add_course(&pool, "CFO", "Curso de Formação de Oficiais", "CDO", 1).await?;

    common::insert_member(&pool, "Chefe", "Supremo").await?;
    let caller = common::caller(&pool, "Chefe").await?;

    let courses = departments::courses_allowed_to_post(&pool, &caller).await?;
    assert_eq!(courses.len(), 2);

    Ok(())
}

#[tokio::test]
async fn posting_a_class_grants_courses_and_logs() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    let (base, _) = seed_ins(&pool).await?;
    common::add_course(&pool, "COrt", "Curso de Ortografia", "INS", 1).await?;

    let author_id = common::insert_member(&pool, "Instrutor", "Tenente").await?;
    common::assign_department_role(&pool, author_id, base, "INS").await?;
    let student_id = common::insert_member(&pool, "Aluno", "Soldado").await?;

    let caller = common::caller(&pool, "Instrutor").await?;
    departments::post_class(
        &pool,
        &StubResolver::default(),
        &caller,
        &PostClassRequest {
            course_acronym: "COrt".to_string(),
            approved: vec!["Aluno".to_string(), "x".to_string()],
            failed: vec!["Reprovado".to_string()],
            room: "Base INS".to_string(),
            description: "Aula teórica".to_string(),
        },
    )
    .await?;

    let grant: (String, String) = sqlx::query_as(
        "SELECT name, kind FROM permissions_obtained WHERE member_id = ?",
    )
    .bind(student_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(grant, ("COrt".to_string(), "COURSE".to_string()));

    let (approved, failed, course): (String, String, String) = sqlx::query_as(
        "SELECT approved, failed, course_acronym FROM classes",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(approved, "Aluno");
    assert_eq!(failed, "Reprovado");
    assert_eq!(course, "COrt");

    let logged: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM activity_log WHERE target_id = ? AND action = 'APPROVATION'",
    )
    .bind(student_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(logged, 1);

    // A second pass trips the duplicate-grant guard.
    let err = departments::post_class(
        &pool,
        &StubResolver::default(),
        &caller,
        &PostClassRequest {
            course_acronym: "COrt".to_string(),
            approved: vec!["Aluno".to_string()],
            failed: vec![],
            room: String::new(),
            description: String::new(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn privilege_courses_grant_a_persistent_permission() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    let cdo = common::add_department_role(&pool, "CDO", "Professor do CDO", "CDO", 1).await?;
    common::add_course(&pool, "CFO", "Curso de Formação de Oficiais", "CDO", 1).await?;

    let author_id = common::insert_member(&pool, "Professor", "Capitão").await?;
    common::assign_department_role(&pool, author_id, cdo, "CDO").await?;
    let student_id = common::insert_member(&pool, "Aluno", "Subtenente").await?;

    let caller = common::caller(&pool, "Professor").await?;
    departments::post_class(
        &pool,
        &StubResolver::default(),
        &caller,
        &PostClassRequest {
            course_acronym: "CFO".to_string(),
            approved: vec!["Aluno".to_string()],
            failed: vec![],
            room: String::new(),
            description: String::new(),
        },
    )
    .await?;

    let kinds: Vec<String> = sqlx::query_scalar(
        "SELECT kind FROM permissions_obtained WHERE member_id = ? ORDER BY kind",
    )
    .bind(student_id)
    .fetch_all(&pool)
    .await?;
    assert_eq!(kinds, vec!["COURSE".to_string(), "OTHER".to_string()]);

    Ok(())
}

#[tokio::test]
async fn entry_course_enrolls_new_nicks() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    let (base, _) = seed_ins(&pool).await?;
    common::add_course(&pool, "CFPM", "Curso de Formação Policial Militar", "INS", 1).await?;

    let author_id = common::insert_member(&pool, "Instrutor", "Tenente").await?;
    common::assign_department_role(&pool, author_id, base, "INS").await?;

    let caller = common::caller(&pool, "Instrutor").await?;
    departments::post_class(
        &pool,
        &StubResolver::default(),
        &caller,
        &PostClassRequest {
            course_acronym: "CFPM".to_string(),
            approved: vec!["Novato".to_string()],
            failed: vec![],
            room: String::new(),
            description: String::new(),
        },
    )
    .await?;

    let role: String = sqlx::query_scalar("SELECT role_name FROM members WHERE nick = 'Novato'")
        .fetch_one(&pool)
        .await?;
    assert_eq!(role, "Soldado");

    // Serving members above the entry rank cannot retake it.
    common::insert_member(&pool, "Militar", "Cabo").await?;
    let err = departments::post_class(
        &pool,
        &StubResolver::default(),
        &caller,
        &PostClassRequest {
            course_acronym: "CFPM".to_string(),
            approved: vec!["Militar".to_string()],
            failed: vec![],
            room: String::new(),
            description: String::new(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn class_listing_gates_the_all_scope_by_power() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    let (base, coord) = seed_ins(&pool).await?;

    let member_id = common::insert_member(&pool, "Instrutor", "Cabo").await?;
    common::assign_department_role(&pool, member_id, base, "INS").await?;
    let coord_id = common::insert_member(&pool, "Coord", "Tenente").await?;
    common::assign_department_role(&pool, coord_id, coord, "INS").await?;

    sqlx::query(
        "INSERT INTO classes (course_acronym, author, approved, failed, room, department) \
         VALUES ('COrt', 'Instrutor', 'Aluno', '', 'Base', 'INS')",
    )
    .execute(&pool)
    .await?;

    let member = common::caller(&pool, "Instrutor").await?;
    let err = departments::department_classes(
        &pool,
        &member,
        &ClassQuery {
            department: "ins".to_string(),
            scope: QueryScope::All,
            search: None,
            offset: 0,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "got {err}");

    let coord = common::caller(&pool, "Coord").await?;
    let page = departments::department_classes(
        &pool,
        &coord,
        &ClassQuery {
            department: "ins".to_string(),
            scope: QueryScope::All,
            search: None,
            offset: 0,
        },
    )
    .await?;
    assert_eq!(page.total, 1);
    assert_eq!(page.rows[0].author, "Instrutor");

    Ok(())
}

#[tokio::test]
async fn specialization_power_is_derived_from_rank_and_courses() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    let esp = common::add_department_role(&pool, "ESP", "Especializador", "ESP", 1).await?;
    common::add_department_role(&pool, "AL.ESP", "Auxiliar dos Especializadores", "ESP", 2).await?;

    let member_id = common::insert_member(&pool, "Espec", "Subtenente").await?;
    common::assign_department_role(&pool, member_id, esp, "ESP").await?;
    common::grant_course(&pool, member_id, "ESbt").await?;

    // Subtenente with ESbt reaches power 3; both weaker roles are in range.
    let caller = common::caller(&pool, "Espec").await?;
    let names = departments::changeable_roles(&pool, &caller, "ESP").await?;
    assert_eq!(
        names,
        vec![
            "Auxiliar dos Especializadores".to_string(),
            "Especializador".to_string()
        ]
    );

    Ok(())
}

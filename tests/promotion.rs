mod common;

use pme_system::actions;
use pme_system::errors::AppError;

use common::StubResolver;

#[tokio::test]
async fn promotes_one_step_and_clears_courses() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;

    common::insert_member(&pool, "Chefe", "General").await?;
    let target_id = common::insert_member(&pool, "Novato", "Soldado").await?;
    common::grant_course(&pool, target_id, "COrt").await?;
    sqlx::query("UPDATE members SET bonus_in_role = 7 WHERE id = ?")
        .bind(target_id)
        .execute(&pool)
        .await?;

    let caller = common::caller(&pool, "Chefe").await?;
    let resolver = StubResolver::default();

    let outcome = actions::promote(&pool, &resolver, &caller, "Novato", "Bom desempenho").await?;
    assert_eq!(outcome.new_role.as_deref(), Some("Cabo"));

    let (role, bonus): (String, i64) =
        sqlx::query_as("SELECT role_name, bonus_in_role FROM members WHERE id = ?")
            .bind(target_id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(role, "Cabo");
    assert_eq!(bonus, 0);

    let courses: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM permissions_obtained WHERE member_id = ?")
            .bind(target_id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(courses, 0);

    // The log entry carries the bonus earned in the old role.
    let (author, new_role, bonus_in_role): (String, Option<String>, Option<i64>) = sqlx::query_as(
        "SELECT author, new_role, bonus_in_role FROM activity_log \
         WHERE target_id = ? AND action = 'PROMOTION'",
    )
    .bind(target_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(author, "Chefe");
    assert_eq!(new_role.as_deref(), Some("Cabo"));
    assert_eq!(bonus_in_role, Some(7));

    Ok(())
}

#[tokio::test]
async fn milestone_promotion_revokes_only_its_course() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;

    common::insert_member(&pool, "Chefe", "General").await?;
    let target_id = common::insert_member(&pool, "Veterano", "Cabo").await?;
    common::grant_course(&pool, target_id, "ECb").await?;
    common::grant_course(&pool, target_id, "COrt").await?;

    let caller = common::caller(&pool, "Chefe").await?;
    let outcome =
        actions::promote(&pool, &StubResolver::default(), &caller, "Veterano", "").await?;
    assert_eq!(outcome.new_role.as_deref(), Some("Sargento"));

    let remaining: Vec<String> =
        sqlx::query_scalar("SELECT name FROM permissions_obtained WHERE member_id = ?")
            .bind(target_id)
            .fetch_all(&pool)
            .await?;
    assert_eq!(remaining, vec!["COrt".to_string()]);

    Ok(())
}

#[tokio::test]
async fn inactive_target_cannot_be_promoted() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;

    common::insert_member(&pool, "Chefe", "General").await?;
    common::insert_member(&pool, "Novato", "Soldado").await?;
    common::deactivate(&pool, "Novato").await?;

    let caller = common::caller(&pool, "Chefe").await?;
    let err = actions::promote(&pool, &StubResolver::default(), &caller, "Novato", "")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn tenure_gate_blocks_fresh_promotions() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;

    common::insert_member(&pool, "Chefe", "Supremo").await?;
    // Subtenente requires one day in role; last_promoted defaults to now.
    common::insert_member(&pool, "Apressado", "Subtenente").await?;

    let caller = common::caller(&pool, "Chefe").await?;
    let err = actions::promote(&pool, &StubResolver::default(), &caller, "Apressado", "")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn target_missing_required_course_is_rejected() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    common::add_rule(&pool, "BE_PROMOTED", "ECb", "COURSE", Some("Cabo"), None).await?;

    common::insert_member(&pool, "Chefe", "General").await?;
    common::insert_member(&pool, "SemCurso", "Cabo").await?;

    let caller = common::caller(&pool, "Chefe").await?;
    let err = actions::promote(&pool, &StubResolver::default(), &caller, "SemCurso", "")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Forbidden(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn promotion_ceiling_blocks_higher_targets() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;

    // Tenente may promote up to position 4; Aspirante a Oficial sits at 5.
    common::insert_member(&pool, "Chefe", "Tenente").await?;
    common::insert_member(&pool, "Alvo", "Aspirante a Oficial").await?;

    let caller = common::caller(&pool, "Chefe").await?;
    let err = actions::promote(&pool, &StubResolver::default(), &caller, "Alvo", "")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn entry_rank_is_never_promotable() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;

    common::insert_member(&pool, "Chefe", "General").await?;
    common::insert_member(&pool, "Cru", "Recruta").await?;

    let caller = common::caller(&pool, "Chefe").await?;
    let err = actions::promote(&pool, &StubResolver::default(), &caller, "Cru", "")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn officer_cadets_bypass_promote_rules_for_privates() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    common::add_rule(
        &pool,
        "PROMOTE",
        "CFO",
        "OTHER",
        Some("Aspirante a Oficial"),
        None,
    )
    .await?;

    common::insert_member(&pool, "Cadete", "Aspirante a Oficial").await?;
    common::insert_member(&pool, "Novato", "Soldado").await?;
    common::insert_member(&pool, "Cabinho", "Cabo").await?;

    let caller = common::caller(&pool, "Cadete").await?;

    // Soldado targets skip the caller-side rule check.
    let outcome =
        actions::promote(&pool, &StubResolver::default(), &caller, "Novato", "").await?;
    assert_eq!(outcome.new_role.as_deref(), Some("Cabo"));

    // The bypass is keyed on the target's current rank; a Cabo target still
    // requires the CFO grant.
    let err = actions::promote(&pool, &StubResolver::default(), &caller, "Cabinho", "")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)), "got {err}");

    Ok(())
}

#[tokio::test]
async fn capex_holders_bypass_promote_rules_for_privates() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;
    common::add_rule(&pool, "PROMOTE", "ESbt", "COURSE", Some("Tenente"), None).await?;

    let caller_id = common::insert_member(&pool, "Oficial", "Tenente").await?;
    common::grant_other(&pool, caller_id, "CApEx").await?;
    common::insert_member(&pool, "Novato", "Soldado").await?;

    let caller = common::caller(&pool, "Oficial").await?;
    let outcome =
        actions::promote(&pool, &StubResolver::default(), &caller, "Novato", "").await?;
    assert_eq!(outcome.new_role.as_deref(), Some("Cabo"));

    Ok(())
}

#[tokio::test]
async fn promotion_stamps_last_promoted() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;

    common::insert_member(&pool, "Chefe", "General").await?;
    let target_id = common::insert_member(&pool, "Novato", "Soldado").await?;

    let old_stamp = "2020-01-01 00:00:00";
    sqlx::query("UPDATE members SET last_promoted = ? WHERE id = ?")
        .bind(old_stamp)
        .bind(target_id)
        .execute(&pool)
        .await?;

    let caller = common::caller(&pool, "Chefe").await?;
    actions::promote(&pool, &StubResolver::default(), &caller, "Novato", "").await?;

    let last_promoted: chrono::DateTime<chrono::Utc> =
        sqlx::query_scalar("SELECT last_promoted FROM members WHERE id = ?")
            .bind(target_id)
            .fetch_one(&pool)
            .await?;
    assert!(chrono::Utc::now() - last_promoted < chrono::Duration::minutes(1));

    Ok(())
}

#[tokio::test]
async fn unknown_member_is_not_promotable() -> anyhow::Result<()> {
    let (pool, _dir) = common::setup_pool().await?;
    common::seed_roles(&pool).await?;

    common::insert_member(&pool, "Chefe", "General").await?;

    let caller = common::caller(&pool, "Chefe").await?;
    let err = actions::promote(&pool, &StubResolver::default(), &caller, "Fantasma", "")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Unauthorized(_)), "got {err}");

    Ok(())
}

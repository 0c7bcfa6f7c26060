use pme_system::{actions, create_app, db, departments, models, routes};

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::login,
        routes::auth::list_roles,
        routes::auth::create_session,
        routes::auth::create_role,
        routes::auth::create_permission_rule,
        routes::auth::grant_permission,
        routes::users::recent,
        routes::users::by_role,
        routes::users::my_permissions,
        routes::users::profile,
        routes::users::activate,
        routes::users::change_password,
        routes::users::change_discord,
        routes::users::contract,
        routes::actions::promote,
        routes::actions::demote,
        routes::actions::fire,
        routes::actions::warn,
        routes::actions::bonify,
        routes::actions::demote_many,
        routes::actions::fire_many,
        routes::actions::warn_many,
        routes::actions::get_actions,
        routes::actions::get_bonifications,
        routes::actions::weekly_top,
        routes::departments::set_role,
        routes::departments::remove_role,
        routes::departments::changeable_roles,
        routes::departments::members,
        routes::departments::courses_allowed,
        routes::departments::course,
        routes::departments::courses,
        routes::departments::classes,
        routes::departments::post_class,
    ),
    components(schemas(
        models::role::Role,
        models::role::RoleSummary,
        models::role::RoleCreateRequest,
        models::role::HierarchyKind,
        models::member::Member,
        models::member::ContractRequest,
        models::member::ActivateRequest,
        models::member::ChangeDiscordRequest,
        models::permission::PermissionAction,
        models::permission::PermissionKind,
        models::permission::PermissionRequired,
        models::permission::PermissionObtained,
        models::permission::PermissionRuleCreateRequest,
        models::permission::GrantPermissionRequest,
        models::activity::ActionType,
        models::activity::ActivityEntry,
        models::activity::ActivityRow,
        models::activity::BonificationRow,
        models::activity::WeeklyBonified,
        models::activity::SingleActionRequest,
        models::activity::BulkActionRequest,
        models::activity::BonifyRequest,
        models::department::DepartmentRole,
        models::department::HeldDepartmentRole,
        models::department::Course,
        models::department::Class,
        models::department::DepartmentMember,
        models::department::SetRoleRequest,
        models::department::RemoveRoleRequest,
        models::department::PostClassRequest,
        actions::ActionOutcome,
        actions::bulk::BulkOutcome,
        actions::query::QueryScope,
        actions::query::ActionsPage,
        actions::query::BonificationsPage,
        departments::ClassesPage,
        routes::health::HealthResponse,
        routes::auth::LoginRequest,
        routes::auth::LoginResponse,
        routes::auth::SessionResponse,
        routes::users::MemberProfile,
        routes::users::SimilarNick,
        routes::users::ProfileSuggestions,
    )),
    tags(
        (name = "Auth", description = "Authentication and catalog administration"),
        (name = "Users", description = "Member accounts and profiles"),
        (name = "Actions", description = "Personnel actions and activity log"),
        (name = "Departments", description = "Department roles, courses and classes")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    init_tracing();

    let pool = db::init().await?;
    let app = create_app(pool).await?;

    let app = app.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let port = std::env::var("APP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8000);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn load_env() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(crate_env);
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, patch, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::habbo::{HabboClient, IdentityResolver};
use crate::jwt::JwtConfig;
use crate::routes::{actions, auth, departments, health, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub resolver: Arc<dyn IdentityResolver>,
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    create_app_with_resolver(pool, Arc::new(HabboClient::from_env())).await
}

/// Router with an injected identity resolver; tests stub the Habbo lookup
/// through this.
pub async fn create_app_with_resolver(
    pool: SqlitePool,
    resolver: Arc<dyn IdentityResolver>,
) -> Result<Router, AppError> {
    let jwt = JwtConfig::from_env()?;
    let state = AppState {
        pool,
        jwt: Arc::new(jwt),
        resolver,
    };

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/roles", get(auth::list_roles).post(auth::create_role))
        .route("/session", post(auth::create_session))
        .route("/permissions", post(auth::create_permission_rule))
        .route("/permissions/grant", post(auth::grant_permission));

    let user_routes = Router::new()
        .route("/recent", get(users::recent))
        .route("/by-role/:role", get(users::by_role))
        .route("/permissions", get(users::my_permissions))
        .route("/profile/:nick", get(users::profile))
        .route("/activate", post(users::activate))
        .route("/password", post(users::change_password))
        .route("/discord", patch(users::change_discord))
        .route("/contract", post(users::contract));

    let action_routes = Router::new()
        .route("/", get(actions::get_actions))
        .route("/promote", post(actions::promote))
        .route("/demote", post(actions::demote))
        .route("/fire", post(actions::fire))
        .route("/warn", post(actions::warn))
        .route("/bonify", post(actions::bonify))
        .route("/demote-many", post(actions::demote_many))
        .route("/fire-many", post(actions::fire_many))
        .route("/warn-many", post(actions::warn_many))
        .route("/bonifications", get(actions::get_bonifications))
        .route("/bonifications/weekly-top", get(actions::weekly_top));

    let department_routes = Router::new()
        .route(
            "/roles",
            post(departments::set_role).delete(departments::remove_role),
        )
        .route("/courses/allowed", get(departments::courses_allowed))
        .route("/courses/:acronym", get(departments::course))
        .route(
            "/classes",
            get(departments::classes).post(departments::post_class),
        )
        .route("/:department/changeable-roles", get(departments::changeable_roles))
        .route("/:department/members", get(departments::members))
        .route("/:department/courses", get(departments::courses));

    let router = Router::new()
        .route("/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/actions", action_routes)
        .nest("/departments", department_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}

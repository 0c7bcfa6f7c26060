//! Department endpoints: role assignment, course catalog, class posting.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::authz::CallerContext;
use crate::departments::{self, ClassQuery, ClassesPage};
use crate::errors::AppResult;
use crate::models::department::{
    Course, DepartmentMember, PostClassRequest, RemoveRoleRequest, SetRoleRequest,
};

#[utoipa::path(
    post,
    path = "/departments/roles",
    tag = "Departments",
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Role assigned"),
        (status = 401, description = "Caller lacks department power")
    ),
    security(("bearerAuth" = []))
)]
pub async fn set_role(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<SetRoleRequest>,
) -> AppResult<StatusCode> {
    departments::set_member_role(&state.pool, &caller, &req).await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/departments/roles",
    tag = "Departments",
    request_body = RemoveRoleRequest,
    responses(
        (status = 200, description = "Role removed"),
        (status = 401, description = "Caller lacks department power")
    ),
    security(("bearerAuth" = []))
)]
pub async fn remove_role(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<RemoveRoleRequest>,
) -> AppResult<StatusCode> {
    departments::remove_member_role(&state.pool, &caller, &req).await?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/departments/{department}/changeable-roles",
    tag = "Departments",
    params(("department" = String, Path, description = "Department acronym")),
    responses((status = 200, description = "Roles the caller may hand out", body = Vec<String>)),
    security(("bearerAuth" = []))
)]
pub async fn changeable_roles(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(department): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    let names = departments::changeable_roles(&state.pool, &caller, &department).await?;

    Ok(Json(names))
}

#[utoipa::path(
    get,
    path = "/departments/{department}/members",
    tag = "Departments",
    params(("department" = String, Path, description = "Department acronym")),
    responses((status = 200, description = "Members of the department", body = Vec<DepartmentMember>)),
    security(("bearerAuth" = []))
)]
pub async fn members(
    State(state): State<AppState>,
    _caller: CallerContext,
    Path(department): Path<String>,
) -> AppResult<Json<Vec<DepartmentMember>>> {
    let members = departments::department_members(&state.pool, &department).await?;

    Ok(Json(members))
}

#[utoipa::path(
    get,
    path = "/departments/courses/allowed",
    tag = "Departments",
    responses((status = 200, description = "Courses the caller may post classes for", body = Vec<Course>)),
    security(("bearerAuth" = []))
)]
pub async fn courses_allowed(
    State(state): State<AppState>,
    caller: CallerContext,
) -> AppResult<Json<Vec<Course>>> {
    let courses = departments::courses_allowed_to_post(&state.pool, &caller).await?;

    Ok(Json(courses))
}

#[utoipa::path(
    get,
    path = "/departments/courses/{acronym}",
    tag = "Departments",
    params(("acronym" = String, Path, description = "Course acronym")),
    responses(
        (status = 200, description = "Course", body = Course),
        (status = 401, description = "Caller lacks department power"),
        (status = 404, description = "Unknown course")
    ),
    security(("bearerAuth" = []))
)]
pub async fn course(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(acronym): Path<String>,
) -> AppResult<Json<Course>> {
    let course = departments::course(&state.pool, &caller, &acronym).await?;

    Ok(Json(course))
}

#[utoipa::path(
    get,
    path = "/departments/{department}/courses",
    tag = "Departments",
    params(("department" = String, Path, description = "Department acronym")),
    responses((status = 200, description = "Courses visible to the caller", body = Vec<Course>)),
    security(("bearerAuth" = []))
)]
pub async fn courses(
    State(state): State<AppState>,
    caller: CallerContext,
    Path(department): Path<String>,
) -> AppResult<Json<Vec<Course>>> {
    let courses = departments::department_courses(&state.pool, &caller, &department).await?;

    Ok(Json(courses))
}

#[utoipa::path(
    get,
    path = "/departments/classes",
    tag = "Departments",
    params(ClassQuery),
    responses(
        (status = 200, description = "Classes", body = ClassesPage),
        (status = 401, description = "Scope not allowed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn classes(
    State(state): State<AppState>,
    caller: CallerContext,
    Query(q): Query<ClassQuery>,
) -> AppResult<Json<ClassesPage>> {
    let page = departments::department_classes(&state.pool, &caller, &q).await?;

    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/departments/classes",
    tag = "Departments",
    request_body = PostClassRequest,
    responses(
        (status = 201, description = "Class recorded"),
        (status = 400, description = "Approved nick invalid or course already held"),
        (status = 401, description = "Caller lacks department power")
    ),
    security(("bearerAuth" = []))
)]
pub async fn post_class(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(req): Json<PostClassRequest>,
) -> AppResult<StatusCode> {
    departments::post_class(&state.pool, state.resolver.as_ref(), &caller, &req).await?;

    Ok(StatusCode::CREATED)
}

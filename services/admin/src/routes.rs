//! Admin service routes

use std::net::SocketAddr;

use axum::{
    Extension, Json, Router,
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode, header::USER_AGENT},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::AppResult,
    jwt::UserClaims,
    middleware::{RequestToken, auth_middleware},
    models::{
        Id, NewButton, NewMenu, NewPermission, NewRole, NewUser, PageQuery, UpdateButton,
        UpdateMenu, UpdatePermission, UpdateRole, UpdateUser,
    },
    state::AppState,
    usecases::LoginAttempt,
};

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request for token refresh
#[derive(Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Request for a password change by the caller
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Create the router for the admin service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/v1/permissions",
            get(list_permissions).post(create_permission),
        )
        .route(
            "/api/v1/permissions/:id",
            get(get_permission)
                .put(update_permission)
                .delete(delete_permission),
        )
        .route("/api/v1/menus", get(list_menus).post(create_menu))
        .route(
            "/api/v1/menus/:id",
            get(get_menu).put(update_menu).delete(delete_menu),
        )
        .route("/api/v1/buttons", get(list_buttons).post(create_button))
        .route(
            "/api/v1/buttons/:id",
            get(get_button).put(update_button).delete(delete_button),
        )
        .route("/api/v1/roles", get(list_roles).post(create_role))
        .route(
            "/api/v1/roles/:id",
            get(get_role).put(update_role).delete(delete_role),
        )
        .route("/api/v1/roles/:id/menu/tree", get(role_menu_tree))
        .route("/api/v1/users", get(list_users).post(create_user))
        .route(
            "/api/v1/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/api/v1/login-records", get(list_login_records))
        .route("/api/v1/me/menu/tree", get(my_menu_tree))
        .route("/api/v1/me/password", patch(change_my_password))
        .route("/api/v1/me/login-records", get(my_login_records))
        .route("/api/v1/policies/reload", post(reload_policies))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/login", post(login))
        .route("/api/v1/refresh", post(refresh_token))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "rbac-admin"
    }))
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    info!(%ip, "Login attempt for user: {}", payload.username);

    let attempt = LoginAttempt {
        username: payload.username,
        password: payload.password,
        ip,
        user_agent,
    };
    let tokens = state.users.login(&cancel, &attempt).await?;
    Ok((StatusCode::OK, Json(tokens)))
}

/// Refresh token endpoint
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshTokenRequest>,
) -> AppResult<impl IntoResponse> {
    let tokens = state.users.refresh(&payload.refresh_token).await?;
    Ok(Json(tokens))
}

pub async fn list_permissions(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.permissions.list(page).await?))
}

pub async fn create_permission(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Json(payload): Json<NewPermission>,
) -> AppResult<impl IntoResponse> {
    let permission = state.permissions.create(&cancel, payload).await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

pub async fn get_permission(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.permissions.find(id).await?))
}

pub async fn update_permission(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Path(id): Path<Id>,
    Json(payload): Json<UpdatePermission>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.permissions.update(&cancel, id, payload).await?))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Path(id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    state.permissions.delete(&cancel, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_menus(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.menus.list(page).await?))
}

pub async fn create_menu(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Json(payload): Json<NewMenu>,
) -> AppResult<impl IntoResponse> {
    let menu = state.menus.create(&cancel, payload).await?;
    Ok((StatusCode::CREATED, Json(menu)))
}

pub async fn get_menu(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.menus.find(id).await?))
}

pub async fn update_menu(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Path(id): Path<Id>,
    Json(payload): Json<UpdateMenu>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.menus.update(&cancel, id, payload).await?))
}

pub async fn delete_menu(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Path(id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    state.menus.delete(&cancel, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_buttons(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.buttons.list(page).await?))
}

pub async fn create_button(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Json(payload): Json<NewButton>,
) -> AppResult<impl IntoResponse> {
    let button = state.buttons.create(&cancel, payload).await?;
    Ok((StatusCode::CREATED, Json(button)))
}

pub async fn get_button(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.buttons.find(id).await?))
}

pub async fn update_button(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Path(id): Path<Id>,
    Json(payload): Json<UpdateButton>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.buttons.update(&cancel, id, payload).await?))
}

pub async fn delete_button(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Path(id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    state.buttons.delete(&cancel, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_roles(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.roles.list(page).await?))
}

pub async fn create_role(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Json(payload): Json<NewRole>,
) -> AppResult<impl IntoResponse> {
    let role = state.roles.create(&cancel, payload).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.roles.find(id).await?))
}

pub async fn update_role(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Path(id): Path<Id>,
    Json(payload): Json<UpdateRole>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.roles.update(&cancel, id, payload).await?))
}

pub async fn delete_role(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
    Path(id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    state.roles.delete(&cancel, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn role_menu_tree(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.roles.menu_tree(id).await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.users.list(page).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> AppResult<impl IntoResponse> {
    let user = state.users.create(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.users.find(id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(payload): Json<UpdateUser>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.users.update(id, payload).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Id>,
) -> AppResult<impl IntoResponse> {
    state.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_login_records(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.users.login_records(page).await?))
}

/// Login history of the caller
pub async fn my_login_records(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Query(page): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.users.my_login_records(&claims.sub, page).await?))
}

/// Navigation tree of the caller's role
pub async fn my_menu_tree(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.roles.menu_tree(claims.rid).await?))
}

pub async fn change_my_password(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .users
        .change_password(claims.uid, &payload.old_password, &payload.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rebuild the policy graph from the database
pub async fn reload_policies(
    State(state): State<AppState>,
    RequestToken(cancel): RequestToken,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.reloader.reload_all(&cancel).await?))
}

use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::auth::{
        AdminRegisterRequest, LoginRequest, LoginResponse, OtpSendRequest, OtpSendResponse,
        OtpVerifyRequest, RegisterRequest,
    },
    error::AppResult,
    models::{Admin, User},
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/otp/send", post(otp_send))
        .route("/otp/verify", post(otp_verify))
        .route("/admin/register", post(admin_register))
        .route("/admin/login", post(admin_login))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Register user", body = ApiResponse<User>),
        (status = 409, description = "Email or phone already taken")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = auth_service::register_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login user", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid credentials"),
        (status = 403, description = "User is blocked")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = auth_service::login_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/otp/send",
    request_body = OtpSendRequest,
    responses(
        (status = 200, description = "Send a one-time code by SMS", body = ApiResponse<OtpSendResponse>),
        (status = 400, description = "Phone missing")
    ),
    tag = "Auth"
)]
pub async fn otp_send(
    State(state): State<AppState>,
    Json(payload): Json<OtpSendRequest>,
) -> AppResult<Json<ApiResponse<OtpSendResponse>>> {
    let resp = auth_service::send_otp(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Exchange a one-time code for a token", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid code"),
        (status = 404, description = "No user with this phone")
    ),
    tag = "Auth"
)]
pub async fn otp_verify(
    State(state): State<AppState>,
    Json(payload): Json<OtpVerifyRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = auth_service::verify_otp(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/admin/register",
    request_body = AdminRegisterRequest,
    responses(
        (status = 200, description = "Register admin", body = ApiResponse<Admin>),
        (status = 409, description = "Email already taken")
    ),
    tag = "Auth"
)]
pub async fn admin_register(
    State(state): State<AppState>,
    Json(payload): Json<AdminRegisterRequest>,
) -> AppResult<Json<ApiResponse<Admin>>> {
    let resp = auth_service::register_admin(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login admin", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = auth_service::login_admin(&state, payload).await?;
    Ok(Json(resp))
}

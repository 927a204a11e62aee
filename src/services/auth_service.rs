use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::record,
    config::AppConfig,
    dto::auth::{
        AdminRegisterRequest, Claims, LoginRequest, LoginResponse, OtpSendRequest,
        OtpSendResponse, OtpVerifyRequest, RegisterRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{ROLE_ADMIN, ROLE_USER},
    models::{Admin, User},
    response::{ApiResponse, Meta},
    services::otp_service::{OtpService, normalize_phone},
    state::AppState,
};

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    phone: String,
    password_hash: String,
    is_blocked: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            is_blocked: row.is_blocked,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct AdminRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Sign a bearer token for `subject` with the given role.
pub fn issue_token(config: &AppConfig, subject: Uuid, role: &str) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.token_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: subject.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn require(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        name,
        email,
        phone,
        password,
    } = payload;
    require("name", &name)?;
    require("email", &email)?;
    require("phone", &phone)?;
    require("password", &password)?;
    let phone = normalize_phone(&phone);

    let exist: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM users WHERE email = $1 OR phone = $2")
            .bind(email.as_str())
            .bind(phone.as_str())
            .fetch_optional(&state.pool)
            .await?;

    if exist.is_some() {
        return Err(AppError::Conflict(
            "Email or phone is already taken".to_string(),
        ));
    }

    let password_hash = hash_password(&password)?;

    let row: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, phone, password_hash)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, email, phone, password_hash, is_blocked, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name.trim())
    .bind(email.as_str())
    .bind(phone.as_str())
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await?;

    record(
        &state.pool,
        row.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": row.id }),
    )
    .await;

    Ok(ApiResponse::success("User created", row.into(), None))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user: Option<UserRow> = sqlx::query_as(
        "SELECT id, name, email, phone, password_hash, is_blocked, created_at FROM users WHERE email = $1",
    )
    .bind(email.as_str())
    .fetch_optional(&state.pool)
    .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }
    if user.is_blocked {
        return Err(AppError::Forbidden);
    }

    let token = issue_token(&state.config, user.id, ROLE_USER)?;

    record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {}", token),
        },
        Some(Meta::empty()),
    ))
}

pub async fn register_admin(
    state: &AppState,
    payload: AdminRegisterRequest,
) -> AppResult<ApiResponse<Admin>> {
    let AdminRegisterRequest {
        name,
        email,
        password,
    } = payload;
    require("name", &name)?;
    require("email", &email)?;
    require("password", &password)?;

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM admins WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(&state.pool)
        .await?;
    if exist.is_some() {
        return Err(AppError::Conflict("Email is already taken".to_string()));
    }

    let password_hash = hash_password(&password)?;
    let row: AdminRow = sqlx::query_as(
        r#"
        INSERT INTO admins (id, name, email, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, email, password_hash, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name.trim())
    .bind(email.as_str())
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await?;

    record(
        &state.pool,
        row.id,
        "admin_register",
        "admins",
        serde_json::json!({ "admin_id": row.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Admin created",
        Admin {
            id: row.id,
            name: row.name,
            email: row.email,
            created_at: row.created_at,
        },
        None,
    ))
}

pub async fn login_admin(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let admin: Option<AdminRow> = sqlx::query_as(
        "SELECT id, name, email, password_hash, created_at FROM admins WHERE email = $1",
    )
    .bind(payload.email.as_str())
    .fetch_optional(&state.pool)
    .await?;

    let admin = admin.ok_or_else(|| AppError::BadRequest("Invalid email or password".into()))?;
    if !verify_password(&payload.password, &admin.password_hash)? {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let token = issue_token(&state.config, admin.id, ROLE_ADMIN)?;

    record(
        &state.pool,
        admin.id,
        "admin_login",
        "admins",
        serde_json::json!({ "admin_id": admin.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token: format!("Bearer {}", token),
        },
        Some(Meta::empty()),
    ))
}

fn otp_service(state: &AppState) -> AppResult<&OtpService> {
    state
        .otp
        .as_ref()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("OTP provider is not configured")))
}

pub async fn send_otp(
    state: &AppState,
    payload: OtpSendRequest,
) -> AppResult<ApiResponse<OtpSendResponse>> {
    let status = otp_service(state)?.send(&payload.phone).await?;
    Ok(ApiResponse::success(
        "OTP sent",
        OtpSendResponse { status },
        Some(Meta::empty()),
    ))
}

/// Exchange a verified phone number for a user token.
pub async fn verify_otp(
    state: &AppState,
    payload: OtpVerifyRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let phone = otp_service(state)?
        .verify(&payload.phone, &payload.pin)
        .await?;

    let user: Option<(Uuid, bool)> =
        sqlx::query_as("SELECT id, is_blocked FROM users WHERE phone = $1")
            .bind(phone.as_str())
            .fetch_optional(&state.pool)
            .await?;
    let (user_id, is_blocked) =
        user.ok_or_else(|| AppError::NotFound("No user registered with this phone".into()))?;
    if is_blocked {
        return Err(AppError::Forbidden);
    }

    let token = issue_token(&state.config, user_id, ROLE_USER)?;

    record(
        &state.pool,
        user_id,
        "user_otp_login",
        "users",
        serde_json::json!({ "user_id": user_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "OTP verified",
        LoginResponse {
            token: format!("Bearer {}", token),
        },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_token;

    fn config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/shop".into(),
            host: "127.0.0.1".into(),
            port: 3000,
            jwt_secret: "test-secret".into(),
            token_ttl_hours: 1,
            otp: None,
        }
    }

    #[test]
    fn issued_token_decodes_to_same_subject_and_role() {
        let config = config();
        let id = Uuid::new_v4();

        let token = issue_token(&config, id, ROLE_ADMIN).unwrap();
        let user = decode_token(&token, &config.jwt_secret).unwrap();

        assert_eq!(user.user_id, id);
        assert_eq!(user.role, ROLE_ADMIN);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token(&config(), Uuid::new_v4(), ROLE_USER).unwrap();
        let result = decode_token(&token, "another-secret");
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn password_hash_verifies_only_the_hashed_password() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }
}

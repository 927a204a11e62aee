use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    audit::record,
    dto::coupons::{CouponList, CouponRequest},
    error::AppResult,
    middleware::auth::{AuthUser, ROLE_ADMIN, ensure_admin, ensure_customer},
    models::Coupon,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::coupon_service::AppliedCoupon,
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyCouponRequest {
    pub code: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_coupons).post(create_coupon))
        .route("/apply", post(apply_coupon))
        .route(
            "/{id}",
            get(view_coupon).put(update_coupon).delete(delete_coupon),
        )
}

#[utoipa::path(
    get,
    path = "/api/coupons",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Admins see every coupon, users only those still redeemable", body = ApiResponse<CouponList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn list_coupons(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<CouponList>>> {
    let (page, limit, offset) = pagination.normalize();
    let active_at = (user.role != ROLE_ADMIN).then(Utc::now);

    let (items, total) = state
        .coupons
        .list_coupons(active_at, limit, offset)
        .await?;

    Ok(Json(ApiResponse::success(
        "Coupons",
        CouponList { items },
        Some(Meta::new(page, limit, total)),
    )))
}

#[utoipa::path(
    post,
    path = "/api/coupons",
    request_body = CouponRequest,
    responses(
        (status = 200, description = "Create coupon (admin only)", body = ApiResponse<Coupon>),
        (status = 400, description = "Invalid coupon"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "Code already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn create_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CouponRequest>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    ensure_admin(&user)?;
    let coupon = state.coupons.create_coupon(payload.into()).await?;

    record(
        &state.pool,
        user.user_id,
        "coupon_create",
        "coupons",
        serde_json::json!({ "coupon_id": coupon.id, "code": coupon.code }),
    )
    .await;

    Ok(Json(ApiResponse::success(
        "Coupon created",
        coupon,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    get,
    path = "/api/coupons/{id}",
    params(
        ("id" = Uuid, Path, description = "Coupon ID")
    ),
    responses(
        (status = 200, description = "View coupon (admin only)", body = ApiResponse<Coupon>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Coupon not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn view_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    ensure_admin(&user)?;
    let coupon = state.coupons.view_coupon(id).await?;
    Ok(Json(ApiResponse::success("Coupon", coupon, None)))
}

#[utoipa::path(
    put,
    path = "/api/coupons/{id}",
    params(
        ("id" = Uuid, Path, description = "Coupon ID")
    ),
    request_body = CouponRequest,
    responses(
        (status = 200, description = "Replace coupon (admin only)", body = ApiResponse<Coupon>),
        (status = 400, description = "Invalid coupon"),
        (status = 404, description = "Coupon not found"),
        (status = 409, description = "Code already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn update_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CouponRequest>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    ensure_admin(&user)?;
    let coupon = state.coupons.update_coupon(id, payload.into()).await?;

    record(
        &state.pool,
        user.user_id,
        "coupon_update",
        "coupons",
        serde_json::json!({ "coupon_id": coupon.id }),
    )
    .await;

    Ok(Json(ApiResponse::success(
        "Updated",
        coupon,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/coupons/{id}",
    params(
        ("id" = Uuid, Path, description = "Coupon ID")
    ),
    responses(
        (status = 200, description = "Delete coupon (admin only)", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Coupon not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn delete_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_admin(&user)?;
    state.coupons.delete_coupon(id).await?;

    record(
        &state.pool,
        user.user_id,
        "coupon_delete",
        "coupons",
        serde_json::json!({ "coupon_id": id }),
    )
    .await;

    Ok(Json(ApiResponse::done("Deleted")))
}

#[utoipa::path(
    post,
    path = "/api/coupons/apply",
    request_body = ApplyCouponRequest,
    responses(
        (status = 200, description = "Price a coupon against the current cart", body = ApiResponse<AppliedCoupon>),
        (status = 404, description = "Coupon not found"),
        (status = 422, description = "Coupon expired, used up, or minimum not met"),
    ),
    security(("bearer_auth" = [])),
    tag = "Coupons"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ApplyCouponRequest>,
) -> AppResult<Json<ApiResponse<AppliedCoupon>>> {
    ensure_customer(&user)?;
    let applied = state
        .coupons
        .apply_coupon(user.user_id, &payload.code)
        .await?;

    Ok(Json(ApiResponse::success(
        "Coupon applied",
        applied,
        Some(Meta::empty()),
    )))
}

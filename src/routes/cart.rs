use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    audit::record,
    dto::cart::{AddToCartRequest, AdjustQuantityRequest, CartView},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_customer},
    models::{CartItem, cart_subtotal},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(cart_list).post(add_to_cart).patch(adjust_quantity),
        )
        .route("/{product_id}", delete(remove_from_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart lines and subtotal for current user", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    ensure_customer(&user)?;
    let items = state.carts.list_cart(user.user_id).await?;
    let subtotal = cart_subtotal(&items);

    Ok(Json(ApiResponse::success(
        "OK",
        CartView { items, subtotal },
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add a product with quantity 1", body = ApiResponse<CartItem>),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product already in cart"),
        (status = 422, description = "Product out of stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    ensure_customer(&user)?;
    let item = state
        .carts
        .add_item(user.user_id, payload.product_id)
        .await?;

    record(
        &state.pool,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id }),
    )
    .await;

    Ok(Json(ApiResponse::success("Added to cart", item, None)))
}

#[utoipa::path(
    patch,
    path = "/api/cart",
    request_body = AdjustQuantityRequest,
    responses(
        (status = 200, description = "Set the quantity of a cart line", body = ApiResponse<CartItem>),
        (status = 400, description = "Quantity below 1"),
        (status = 404, description = "Product or cart item not found"),
        (status = 422, description = "Not enough stock"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn adjust_quantity(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AdjustQuantityRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    ensure_customer(&user)?;
    let item = state
        .carts
        .adjust_quantity(user.user_id, payload.product_id, payload.count)
        .await?;

    record(
        &state.pool,
        user.user_id,
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.count }),
    )
    .await;

    Ok(Json(ApiResponse::success("Quantity updated", item, None)))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "OK", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "No cart, or product not in cart"),
        (status = 422, description = "Cart is empty"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_customer(&user)?;
    state.carts.remove_item(user.user_id, product_id).await?;

    record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(Json(ApiResponse::done("Removed from cart")))
}

use uuid::Uuid;

use crate::{
    audit::record,
    dto::wishlist::WishlistProducts,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    models::{Product, WishlistItem},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_wishlist(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<WishlistProducts>> {
    ensure_customer(user)?;
    let (page, limit, offset) = pagination.normalize();
    let products = sqlx::query_as::<_, Product>(
        r#"
        SELECT p.*
        FROM wishlist_items w
        JOIN products p ON p.id = w.product_id
        WHERE w.user_id = $1
        ORDER BY w.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wishlist_items WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "OK",
        WishlistProducts { items: products },
        Some(meta),
    ))
}

/// Adding a product that is already wished for returns the existing entry.
pub async fn add_to_wishlist(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<WishlistItem>> {
    ensure_customer(user)?;
    let product_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&state.pool)
        .await?;
    if product_exists.is_none() {
        return Err(AppError::NotFound("product not found".into()));
    }

    // the no-op update makes RETURNING yield the row on conflict too
    let item = sqlx::query_as::<_, WishlistItem>(
        r#"
        INSERT INTO wishlist_items (id, user_id, product_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id) DO UPDATE SET user_id = EXCLUDED.user_id
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(product_id)
    .fetch_one(&state.pool)
    .await?;

    record(
        &state.pool,
        user.user_id,
        "wishlist_add",
        "wishlist_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to wishlist",
        item,
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_wishlist(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_customer(user)?;
    let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
        .bind(user.user_id)
        .bind(product_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("product is not in your wishlist".into()));
    }

    record(
        &state.pool,
        user.user_id,
        "wishlist_remove",
        "wishlist_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::done("Removed from wishlist"))
}

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::record,
    dto::{
        admin::UserList,
        orders::{OrderList, OrderStatusList, OrderWithItems, UpdateOrderStatusRequest},
    },
    entity::{
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, User},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, Pagination, SortOrder},
    services::order_service::{ORDER_STATUSES, order_from_entity, order_items},
    state::AppState,
};

pub async fn list_users(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Users::find().order_by_desc(UserCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(user_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Users",
        UserList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let found = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(user_from_entity)
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;
    Ok(ApiResponse::success("User", found, None))
}

/// Block or unblock `id`. Blocked users can no longer obtain tokens.
pub async fn set_user_blocked(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    blocked: bool,
) -> AppResult<ApiResponse<User>> {
    ensure_admin(user)?;
    let existing = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("user not found".into()))?;

    if existing.is_blocked == blocked {
        let state_name = if blocked { "blocked" } else { "unblocked" };
        return Err(AppError::Unprocessable(format!("user is already {state_name}")));
    }

    let mut active: UserActive = existing.into();
    active.is_blocked = Set(blocked);
    let updated = active.update(&state.orm).await?;

    record(
        &state.pool,
        user.user_id,
        if blocked { "user_block" } else { "user_unblock" },
        "users",
        serde_json::json!({ "user_id": updated.id }),
    )
    .await;

    let message = if blocked { "User blocked" } else { "User unblocked" };
    Ok(ApiResponse::success(
        message,
        user_from_entity(updated),
        Some(Meta::empty()),
    ))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let mut finder = Orders::find().filter(condition);

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(order_from_entity)
        .ok_or_else(|| AppError::NotFound("order not found".into()))?;

    let items = order_items(&state.orm, order.id).await?;

    Ok(ApiResponse::success(
        "Order found",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let status = validate_order_status(&payload.status)?;

    let existing = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("order not found".into()))?;

    let mut active: OrderActive = existing.into();
    active.status = Set(status.to_string());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&state.orm).await?;

    record(
        &state.pool,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "status": order.status }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Statuses an admin may set through [`update_order_status`].
pub fn list_order_statuses(user: &AuthUser) -> AppResult<ApiResponse<OrderStatusList>> {
    ensure_admin(user)?;
    let items = ORDER_STATUSES.iter().map(|status| status.to_string()).collect();
    Ok(ApiResponse::success(
        "Order statuses",
        OrderStatusList { items },
        None,
    ))
}

fn validate_order_status(status: &str) -> Result<&'static str, AppError> {
    let status = status.trim().to_lowercase();
    ORDER_STATUSES
        .iter()
        .copied()
        .find(|known| *known == status)
        .ok_or_else(|| AppError::BadRequest(format!("invalid order status: {status}")))
}

fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        name: model.name,
        email: model.email,
        phone: model.phone,
        is_blocked: model.is_blocked,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::{ROLE_ADMIN, ROLE_USER};

    #[test]
    fn order_status_is_matched_case_insensitively() {
        assert_eq!(validate_order_status(" Shipped ").unwrap(), "shipped");
        assert!(matches!(
            validate_order_status("lost"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn order_statuses_are_admin_only() {
        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            role: ROLE_ADMIN.into(),
        };
        let statuses = list_order_statuses(&admin).unwrap().data.unwrap();
        assert!(statuses.items.iter().any(|s| s == "returned"));

        let customer = AuthUser {
            user_id: Uuid::new_v4(),
            role: ROLE_USER.into(),
        };
        assert!(matches!(
            list_order_statuses(&customer),
            Err(AppError::Forbidden)
        ));
    }
}
